//! Checkable element properties and the narrowed selector used by the
//! attribute strategy.

use std::fmt;
use std::str::FromStr;

use pagesense_protocols::PerceptionError;
use serde::{Deserialize, Serialize};

use crate::dom::{DocumentSnapshot, DomNode};

/// An element property two examples can share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Property {
    Tag,
    Parent,
    Class,
    Color,
    BackgroundColor,
    X,
    Y,
    Width,
    Height,
    Src,
    Href,
    FontSize,
    FontWeight,
    FontFamily,
}

impl Property {
    pub const ALL: [Property; 14] = [
        Property::Tag,
        Property::Parent,
        Property::Class,
        Property::Color,
        Property::BackgroundColor,
        Property::X,
        Property::Y,
        Property::Width,
        Property::Height,
        Property::Src,
        Property::Href,
        Property::FontSize,
        Property::FontWeight,
        Property::FontFamily,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Property::Tag => "tag",
            Property::Parent => "parent",
            Property::Class => "class",
            Property::Color => "color",
            Property::BackgroundColor => "background_color",
            Property::X => "x",
            Property::Y => "y",
            Property::Width => "width",
            Property::Height => "height",
            Property::Src => "src",
            Property::Href => "href",
            Property::FontSize => "font_size",
            Property::FontWeight => "font_weight",
            Property::FontFamily => "font_family",
        }
    }

    /// Comparable value of this property on `index`. Geometry is rounded
    /// to whole pixels.
    pub(crate) fn value(&self, doc: &DocumentSnapshot, index: usize) -> String {
        let Some(node) = doc.node(index) else {
            return String::new();
        };
        let style = &node.style;
        match self {
            Property::Tag => node.tag.clone(),
            Property::Parent => node
                .parent
                .and_then(|p| doc.node(p))
                .map(|p| p.signature())
                .unwrap_or_default(),
            Property::Class => node.class_name().to_string(),
            Property::Color => style.color.clone(),
            Property::BackgroundColor => style.background_color.clone(),
            Property::X => format!("{:.0}", node.rect.x),
            Property::Y => format!("{:.0}", node.rect.y),
            Property::Width => format!("{:.0}", node.rect.width),
            Property::Height => format!("{:.0}", node.rect.height),
            Property::Src => source(node).unwrap_or_default().to_string(),
            Property::Href => node.attr("href").unwrap_or_default().to_string(),
            Property::FontSize => style.font_size.clone(),
            Property::FontWeight => style.font_weight.clone(),
            Property::FontFamily => style.font_family.clone(),
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Property {
    type Err = PerceptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Property::ALL
            .into_iter()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| PerceptionError::InvalidInput(format!("unknown property '{}'", s)))
    }
}

/// Properties in `candidates` with equal values on both elements.
pub(crate) fn common_properties(
    doc: &DocumentSnapshot,
    a: usize,
    b: usize,
    candidates: &[Property],
) -> Vec<Property> {
    let mut common: Vec<Property> = candidates
        .iter()
        .copied()
        .filter(|p| p.value(doc, a) == p.value(doc, b))
        .collect();
    common.dedup();
    common
}

/// Minimal CSS-like selector from the tag, class, src and href the
/// examples share.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Selector {
    tag: Option<String>,
    classes: Vec<String>,
    src: Option<String>,
    href: Option<String>,
}

impl Selector {
    pub(crate) fn narrowed(node: &DomNode, shared: &[Property]) -> Self {
        let has = |p: Property| shared.contains(&p);
        Self {
            tag: has(Property::Tag).then(|| node.tag.clone()),
            classes: if has(Property::Class) {
                node.classes().map(str::to_string).collect()
            } else {
                Vec::new()
            },
            src: source(node).filter(|_| has(Property::Src)).map(str::to_string),
            href: node
                .attr("href")
                .filter(|_| has(Property::Href))
                .map(str::to_string),
        }
    }

    pub(crate) fn matches(&self, node: &DomNode) -> bool {
        node.is_element()
            && self.tag.as_ref().is_none_or(|t| *t == node.tag)
            && self.classes.iter().all(|c| node.classes().any(|n| n == c))
            && self.src.as_deref().is_none_or(|s| source(node) == Some(s))
            && self.href.as_deref().is_none_or(|h| node.attr("href") == Some(h))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag.as_deref().unwrap_or("*"))?;
        for class in &self.classes {
            write!(f, ".{}", class)?;
        }
        if let Some(src) = &self.src {
            write!(f, "[src=\"{}\"]", src)?;
        }
        if let Some(href) = &self.href {
            write!(f, "[href=\"{}\"]", href)?;
        }
        Ok(())
    }
}

fn source(node: &DomNode) -> Option<&str> {
    node.attr("src").or_else(|| node.style.background_url())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::DomBuilder;

    #[test]
    fn test_parse_property_names() {
        assert_eq!("font-size".parse::<Property>().unwrap(), Property::FontSize);
        assert_eq!(" Href ".parse::<Property>().unwrap(), Property::Href);
        assert!(matches!(
            "shadow".parse::<Property>(),
            Err(PerceptionError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_common_properties_and_selector() {
        let mut b = DomBuilder::new(800.0, 600.0);
        let list = b.el(1, "div", (0.0, 0.0, 400.0, 200.0));
        let first = b.el(list, "a", (0.0, 0.0, 400.0, 20.0));
        b.attr(first, "class", "item link").attr(first, "href", "/a");
        let second = b.el(list, "a", (0.0, 40.0, 400.0, 20.0));
        b.attr(second, "class", "item link").attr(second, "href", "/b");
        let snapshot = b.build();
        let doc = snapshot.main().unwrap();

        let common = common_properties(doc, first, second, &Property::ALL);
        assert!(common.contains(&Property::Tag));
        assert!(common.contains(&Property::Parent));
        assert!(common.contains(&Property::Width));
        assert!(!common.contains(&Property::Y));
        assert!(!common.contains(&Property::Href));

        let selector = Selector::narrowed(doc.node(first).unwrap(), &common);
        assert_eq!(selector.to_string(), "a.item.link");
        assert!(selector.matches(doc.node(second).unwrap()));
        assert!(!selector.matches(doc.node(list).unwrap()));
    }
}
