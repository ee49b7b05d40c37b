//! Segment: the atomic unit of perception.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use super::geometry::{BoundingBox, Point};

/// Semantic label of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    Text,
    Code,
    Link,
    Image,
    Video,
    Audio,
    Button,
    Input,
    Form,
    Quote,
    Custom,
    Icon,
    Header,
    Footer,
    Nav,
    List,
    Select,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Text => "Text",
            Label::Code => "Code",
            Label::Link => "Link",
            Label::Image => "Image",
            Label::Video => "Video",
            Label::Audio => "Audio",
            Label::Button => "Button",
            Label::Input => "Input",
            Label::Form => "Form",
            Label::Quote => "Quote",
            Label::Custom => "Custom",
            Label::Icon => "Icon",
            Label::Header => "Header",
            Label::Footer => "Footer",
            Label::Nav => "Nav",
            Label::List => "List",
            Label::Select => "Select",
        }
    }
}

/// Weak identity of an element inside a captured DOM snapshot.
///
/// Identity only: holding one never keeps the element alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementRef {
    pub document: usize,
    pub node: usize,
}

/// A classified, positioned unit of page content.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Segment {
    /// Emission order.
    pub index: usize,
    /// Normalized (uppercase) tag; `BUTTON` when button heuristics fire.
    pub tag: String,
    /// Semantic label; `None` means the raw tag name stands in.
    pub label: Option<Label>,
    pub bbox: BoundingBox,
    /// Collapsed, trimmed inner text.
    pub text: String,
    /// Accessible name: aria-label, alt, title or role.
    pub description: String,
    pub element_id: String,
    pub class_name: String,
    pub clickable: bool,
    pub triggerable: bool,
    pub input_type: Option<String>,
    pub href: Option<String>,
    pub src: Option<String>,
    pub select_options: Vec<String>,
    pub is_in_iframe: bool,
    pub iframe_offset: Option<Point>,
    pub scroll_container: Option<ElementRef>,
    /// Ancestry-qualified identifier for otherwise identical siblings.
    pub identity_path: Option<String>,
    /// Snapshot element this segment was built from.
    pub element: Option<ElementRef>,
}

impl Segment {
    /// Empty record standing in for a row whose field could not be found.
    pub fn placeholder(index: usize) -> Self {
        Self {
            index,
            ..Default::default()
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.element.is_none() && self.tag.is_empty()
    }

    /// Label name, or the raw tag when no label applies.
    pub fn label_name(&self) -> String {
        match self.label {
            Some(label) => label.as_str().to_string(),
            None => self.tag.to_lowercase(),
        }
    }

    /// Key used to detect content-identical duplicates.
    pub fn duplicate_key(&self) -> (&str, &str, &str, &str, &str, &str) {
        (
            self.element_id.as_str(),
            self.text.as_str(),
            self.src.as_deref().unwrap_or(""),
            self.href.as_deref().unwrap_or(""),
            self.class_name.as_str(),
            self.tag.as_str(),
        )
    }
}

impl Serialize for Segment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("id", &self.element_id)?;
        map.serialize_entry("class", &self.class_name)?;
        map.serialize_entry("index", &self.index)?;
        map.serialize_entry("tagName", &self.tag)?;
        map.serialize_entry("label", &self.label_name())?;
        map.serialize_entry("x", &self.bbox.x)?;
        map.serialize_entry("y", &self.bbox.y)?;
        map.serialize_entry("width", &self.bbox.width)?;
        map.serialize_entry("height", &self.bbox.height)?;
        map.serialize_entry("text", &self.text)?;
        if !self.description.is_empty() {
            map.serialize_entry("description", &self.description)?;
        }
        let interactivity = [
            if self.clickable { "clickable" } else { "non-clickable" },
            if self.triggerable { "trigger" } else { "non-trigger" },
        ];
        map.serialize_entry("interactivity", &interactivity)?;
        if let Some(ref input_type) = self.input_type {
            map.serialize_entry("inputType", input_type)?;
        }
        map.serialize_entry("isIframe", &self.is_in_iframe)?;
        map.serialize_entry("iframePosition", &self.iframe_offset)?;
        if let Some(ref href) = self.href {
            map.serialize_entry("href", href)?;
        }
        if let Some(ref src) = self.src {
            map.serialize_entry("src", src)?;
        }
        if !self.select_options.is_empty() {
            map.serialize_entry("options", &self.select_options)?;
        }
        if let Some(ref path) = self.identity_path {
            map.serialize_entry("identityPath", path)?;
        }
        map.end()
    }
}

#[cfg(test)]
#[path = "segment_tests.rs"]
mod tests;
