//! Label classification and interactivity.
//!
//! Labels come from an ordered predicate chain; the first predicate that
//! answers wins. The order decides outcomes for elements that satisfy
//! several predicates, so it must not change silently.

use pagesense_config::SegmenterConfig;
use pagesense_protocols::Label;

use crate::dom::{DocumentSnapshot, DomNode};

const HEADING_TAGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];

const LIST_TAGS: &[&str] = &["table", "ul", "ol", "dl"];

const BUTTON_INPUT_TYPES: &[&str] = &["button", "submit", "reset", "image"];

const INLINE_TAGS: &[&str] = &[
    "span", "b", "strong", "i", "em", "small", "u", "mark", "abbr", "sub", "sup", "font", "img",
    "svg",
];

const FORM_CONTROL_TAGS: &[&str] = &["input", "textarea", "option", "datalist", "output"];

const TEXT_TAGS: &[&str] = &[
    "p", "span", "div", "li", "td", "th", "label", "b", "strong", "em", "i", "small", "u",
    "mark", "dt", "dd", "caption", "figcaption", "summary", "article", "section", "legend",
    "time", "cite", "abbr", "font", "sub", "sup",
];

const INTERACTIVE_TAGS: &[&str] = &["a", "button", "input", "select", "textarea", "label", "summary"];

const CLICKABLE_ROLES: &[&str] = &[
    "button", "link", "menuitem", "tab", "checkbox", "radio", "option", "switch", "treeitem",
];

const HANDLER_ATTRIBUTES: &[&str] = &[
    "onclick",
    "onmousedown",
    "onmouseup",
    "onchange",
    "oninput",
    "onkeydown",
    "onkeyup",
    "onsubmit",
    "ontouchstart",
];

/// Everything a predicate may look at.
pub(crate) struct NodeContext<'a> {
    pub doc: &'a DocumentSnapshot,
    pub index: usize,
    pub node: &'a DomNode,
    /// Collapsed inner text.
    pub text: &'a str,
    /// Emitted as a collapsed pointer-cursor composite.
    pub collapsed: bool,
    pub config: &'a SegmenterConfig,
}

impl NodeContext<'_> {
    fn tag(&self) -> &str {
        self.node.tag.as_str()
    }

    fn parent(&self) -> Option<&DomNode> {
        self.node.parent.and_then(|p| self.doc.node(p))
    }

    fn role(&self) -> &str {
        self.node.attr("role").unwrap_or_default()
    }

    fn size(&self) -> (f64, f64) {
        (self.node.rect.width, self.node.rect.height)
    }
}

type Predicate = fn(&NodeContext<'_>) -> Option<Label>;

/// Evaluated top to bottom.
const LABEL_CHAIN: &[Predicate] = &[
    select, header, code, quote, list, button, link, input, text, image, icon, custom, fixed_tag,
];

/// Label for a node, or `None` when only the raw tag applies.
pub(crate) fn classify(ctx: &NodeContext<'_>) -> Option<Label> {
    LABEL_CHAIN.iter().find_map(|predicate| predicate(ctx))
}

fn select(ctx: &NodeContext<'_>) -> Option<Label> {
    (ctx.tag() == "select").then_some(Label::Select)
}

fn header(ctx: &NodeContext<'_>) -> Option<Label> {
    if HEADING_TAGS.contains(&ctx.tag()) {
        return Some(Label::Header);
    }
    let heading_parent = ctx.parent().is_some_and(|p| HEADING_TAGS.contains(&p.tag.as_str()));
    (heading_parent && !ctx.text.is_empty()).then_some(Label::Header)
}

fn code(ctx: &NodeContext<'_>) -> Option<Label> {
    matches!(ctx.tag(), "pre" | "code").then_some(Label::Code)
}

fn quote(ctx: &NodeContext<'_>) -> Option<Label> {
    matches!(ctx.tag(), "blockquote" | "q").then_some(Label::Quote)
}

fn list(ctx: &NodeContext<'_>) -> Option<Label> {
    LIST_TAGS.contains(&ctx.tag()).then_some(Label::List)
}

fn button(ctx: &NodeContext<'_>) -> Option<Label> {
    let node = ctx.node;
    let is_button = match ctx.tag() {
        "button" => true,
        "input" => node
            .input_type()
            .is_some_and(|t| BUTTON_INPUT_TYPES.contains(&t.as_str())),
        "a" => ctx.role() == "button" || styled_as_button(node),
        _ => ctx.role() == "button" || node.click_handler || ctx.collapsed,
    };
    is_button.then_some(Label::Button)
}

fn styled_as_button(node: &DomNode) -> bool {
    node.classes().any(|c| {
        let c = c.to_ascii_lowercase();
        c == "btn" || c.starts_with("btn-") || c.contains("button")
    })
}

fn link(ctx: &NodeContext<'_>) -> Option<Label> {
    if ctx.tag() == "a" {
        return Some(Label::Link);
    }
    let inline_in_anchor =
        INLINE_TAGS.contains(&ctx.tag()) && ctx.parent().is_some_and(|p| p.tag == "a");
    inline_in_anchor.then_some(Label::Link)
}

fn input(ctx: &NodeContext<'_>) -> Option<Label> {
    let editable = ctx.node.attr("contenteditable").is_some_and(|v| v != "false");
    (FORM_CONTROL_TAGS.contains(&ctx.tag()) || editable).then_some(Label::Input)
}

fn text(ctx: &NodeContext<'_>) -> Option<Label> {
    (TEXT_TAGS.contains(&ctx.tag()) && !ctx.text.is_empty()).then_some(Label::Text)
}

fn image(ctx: &NodeContext<'_>) -> Option<Label> {
    let (w, h) = ctx.size();
    let large = ctx.config.large_svg_size;
    let is_image = match ctx.tag() {
        "img" | "picture" | "canvas" => true,
        "svg" => w >= large && h >= large,
        _ => {
            let icon = ctx.config.icon_max_size;
            ctx.node.style.background_url().is_some() && (w > icon || h > icon)
        }
    };
    is_image.then_some(Label::Image)
}

fn icon(ctx: &NodeContext<'_>) -> Option<Label> {
    let is_icon = match ctx.tag() {
        "svg" | "kbd" => true,
        "i" => ctx.text.is_empty(),
        _ => {
            ctx.node.style.background_url().is_some()
                || ctx.node.classes().any(|c| c.contains("icon"))
        }
    };
    is_icon.then_some(Label::Icon)
}

fn custom(ctx: &NodeContext<'_>) -> Option<Label> {
    ctx.node.custom_element.then_some(Label::Custom)
}

fn fixed_tag(ctx: &NodeContext<'_>) -> Option<Label> {
    match ctx.tag() {
        "video" => Some(Label::Video),
        "audio" => Some(Label::Audio),
        "form" => Some(Label::Form),
        "nav" => Some(Label::Nav),
        "footer" => Some(Label::Footer),
        _ => None,
    }
}

/// Element tags treated as interactive.
pub(crate) fn is_interactive_tag(tag: &str) -> bool {
    INTERACTIVE_TAGS.contains(&tag)
}

/// Has event-handler attributes or a script-attached click handler.
pub(crate) fn is_triggerable(node: &DomNode) -> bool {
    node.click_handler || HANDLER_ATTRIBUTES.iter().any(|a| node.attr(a).is_some())
}

fn is_clickable_self(node: &DomNode) -> bool {
    let input_hidden = node.tag == "input" && node.input_type().as_deref() == Some("hidden");
    (is_interactive_tag(&node.tag) && !input_hidden)
        || node.attr("role").is_some_and(|r| CLICKABLE_ROLES.contains(&r))
        || node.style.cursor == "pointer"
        || is_triggerable(node)
}

/// Clickable by itself or through an ancestor.
pub(crate) fn is_clickable(doc: &DocumentSnapshot, index: usize) -> bool {
    let Some(node) = doc.node(index) else {
        return false;
    };
    is_clickable_self(node)
        || doc
            .ancestors(index)
            .filter_map(|a| doc.node(a))
            .take_while(|a| a.tag != "body")
            .any(is_clickable_self)
}

/// Accessible name: aria-label, alt, title or role.
pub(crate) fn description(node: &DomNode) -> String {
    ["aria-label", "alt", "title", "role"]
        .iter()
        .filter_map(|name| node.attr(name))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// Form control type reported on the segment.
pub(crate) fn input_type(node: &DomNode) -> Option<String> {
    match node.tag.as_str() {
        "input" => Some(node.input_type().unwrap_or_else(|| "text".to_string())),
        "textarea" => Some("textarea".to_string()),
        "select" => Some("select".to_string()),
        _ => None,
    }
}

#[cfg(test)]
#[path = "classify_tests.rs"]
mod tests;
