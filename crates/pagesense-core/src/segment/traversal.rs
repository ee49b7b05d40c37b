//! Breadth-first walk over a snapshot that decides which elements become
//! segments. Iframes join the same worklist with their own coordinate
//! origin, so nesting depth never grows the stack.

use std::collections::{HashSet, VecDeque};

use pagesense_config::SegmenterConfig;
use pagesense_protocols::{BoundingBox, ElementRef, Label, PerceptionError, Point, Segment};
use tracing::{debug, warn};
use url::Url;

use super::classify::{
    NodeContext, classify, description, input_type, is_clickable, is_interactive_tag,
    is_triggerable,
};
use super::urls::compact_url;
use crate::dom::{CURSOR_ELEMENT_ID, DocumentSnapshot, DomNode, DomSnapshot, HitIndex};

const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template", "head", "meta", "link"];

/// Emitted whole when visible at their center; never descended into.
const ATOMIC_TAGS: &[&str] = &[
    "img", "svg", "select", "input", "textarea", "video", "audio", "canvas",
];

/// Emitted and still descended into.
const COMPOSITE_TAGS: &[&str] = &[
    "table", "ul", "ol", "dl", "p", "button", "form", "footer", "nav",
];

const FRAME_TAGS: &[&str] = &["iframe", "frame"];

/// Center sample of [`BoundingBox::sample_points`].
const CENTER: usize = 4;

#[derive(Debug, Clone, Copy)]
struct WorkItem {
    doc: usize,
    node: usize,
    /// Origin of the document in main-page coordinates.
    origin: Point,
    in_iframe: bool,
}

impl WorkItem {
    fn element(&self) -> ElementRef {
        ElementRef {
            document: self.doc,
            node: self.node,
        }
    }

    fn with_node(&self, node: usize) -> Self {
        Self { node, ..*self }
    }
}

pub(crate) struct Traversal<'a> {
    snapshot: &'a DomSnapshot,
    config: &'a SegmenterConfig,
    masks: Vec<Vec<bool>>,
    hits: Vec<HitIndex>,
    base_url: Option<Url>,
    queue: VecDeque<WorkItem>,
    entered_documents: HashSet<usize>,
    emitted: HashSet<ElementRef>,
    segments: Vec<Segment>,
}

impl<'a> Traversal<'a> {
    pub(crate) fn new(snapshot: &'a DomSnapshot, config: &'a SegmenterConfig) -> Self {
        let masks: Vec<Vec<bool>> =
            snapshot.documents.iter().map(|d| d.visibility_mask()).collect();
        let hits = snapshot
            .documents
            .iter()
            .zip(&masks)
            .map(|(d, mask)| d.hit_index(mask))
            .collect();
        Self {
            snapshot,
            config,
            masks,
            hits,
            base_url: Url::parse(&snapshot.url).ok(),
            queue: VecDeque::new(),
            entered_documents: HashSet::new(),
            emitted: HashSet::new(),
            segments: Vec::new(),
        }
    }

    /// Segments in emission order, indices not yet assigned.
    pub(crate) fn run(mut self) -> Vec<Segment> {
        let Some(body) = self.snapshot.main().and_then(|d| d.body) else {
            return Vec::new();
        };
        self.entered_documents.insert(0);
        self.queue.push_back(WorkItem {
            doc: 0,
            node: body,
            origin: Point::default(),
            in_iframe: false,
        });

        while let Some(item) = self.queue.pop_front() {
            self.visit(item);
        }
        self.segments
    }

    fn visit(&mut self, item: WorkItem) {
        let snapshot = self.snapshot;
        let Some(doc) = snapshot.document(item.doc) else {
            return;
        };
        let Some(node) = doc.node(item.node) else {
            return;
        };
        if !self.visible(item) {
            // visibility:hidden still lays out children that may override it.
            if node.is_element()
                && !node.style.is_undisplayed()
                && !SKIPPED_TAGS.contains(&node.tag.as_str())
            {
                self.queue_children(item, node);
            }
            return;
        }

        if node.is_text() {
            self.attribute_text(doc, item, node);
            return;
        }

        let tag = node.tag.as_str();
        if SKIPPED_TAGS.contains(&tag) || node.element_id() == CURSOR_ELEMENT_ID {
            return;
        }
        if doc.body == Some(item.node) {
            self.queue_children(item, node);
            return;
        }
        if FRAME_TAGS.contains(&tag) {
            self.enter_frame(item, node);
            return;
        }

        if is_atomic(node) {
            if self.center_within(doc, item) {
                self.emit(item, false);
            } else {
                debug!(tag, node = item.node, "Skipping obscured element");
            }
            return;
        }

        if COMPOSITE_TAGS.contains(&tag) {
            self.emit(item, false);
            self.queue_children(item, node);
            return;
        }

        if doc.element_children(item.node).next().is_none() {
            let has_text = !doc.inner_text(item.node, self.mask(item)).trim().is_empty();
            if has_text || node.style.background_url().is_some() {
                self.emit(item, false);
            }
            return;
        }

        if self.collapses(doc, item, node) {
            self.emit(item, true);
            return;
        }

        let on_top = self.five_point_hits(doc, item);
        if on_top == 5 || (on_top >= 3 && is_interactive_tag(tag)) {
            self.emit(item, false);
            return;
        }

        self.queue_children(item, node);
    }

    fn mask(&self, item: WorkItem) -> &[bool] {
        self.masks.get(item.doc).map(|m| m.as_slice()).unwrap_or_default()
    }

    fn visible(&self, item: WorkItem) -> bool {
        self.mask(item).get(item.node).copied().unwrap_or(false)
    }

    fn queue_children(&mut self, item: WorkItem, node: &DomNode) {
        self.queue
            .extend(node.children.iter().map(|&child| item.with_node(child)));
    }

    fn enter_frame(&mut self, item: WorkItem, frame: &DomNode) {
        let content = frame
            .content_document
            .filter(|_| !frame.frame_inaccessible)
            .and_then(|d| self.snapshot.document(d).map(|doc| (d, doc)));
        let Some((index, content)) = content else {
            debug!(node = item.node, "Skipping inaccessible iframe");
            return;
        };
        let Some(body) = content.body else {
            return;
        };
        if !self.entered_documents.insert(index) {
            return;
        }

        let origin = Point::new(
            item.origin.x + frame.rect.x - content.scroll_x,
            item.origin.y + frame.rect.y - content.scroll_y,
        );
        self.queue.push_back(WorkItem {
            doc: index,
            node: body,
            origin,
            in_iframe: true,
        });
    }

    /// The element at the center of the box is this one or inside it.
    fn center_within(&self, doc: &DocumentSnapshot, item: WorkItem) -> bool {
        let Some(hits) = self.hits.get(item.doc) else {
            return false;
        };
        doc.resolve_probe(item.node, CENTER, hits)
            .is_some_and(|hit| doc.is_self_or_descendant(hit, item.node))
    }

    /// Sample points that resolve to exactly this element.
    fn five_point_hits(&self, doc: &DocumentSnapshot, item: WorkItem) -> usize {
        let Some(hits) = self.hits.get(item.doc) else {
            return 0;
        };
        (0..5)
            .filter(|&k| doc.resolve_probe(item.node, k, hits) == Some(item.node))
            .count()
    }

    /// Small pointer-cursor composites without nested controls.
    fn collapses(&self, doc: &DocumentSnapshot, item: WorkItem, node: &DomNode) -> bool {
        let limit = self.config.collapse_max_size;
        node.rect.width < limit
            && node.rect.height < limit
            && node.style.cursor == "pointer"
            && !doc.descendants(item.node).into_iter().any(|d| {
                doc.node(d)
                    .is_some_and(|n| n.is_element() && is_nested_control(&n.tag))
            })
    }

    /// Attribute a text leaf to its nearest ancestor that is visible at its
    /// own center.
    fn attribute_text(&mut self, doc: &DocumentSnapshot, item: WorkItem, node: &DomNode) {
        if node.text.trim().is_empty() {
            return;
        }
        let owner = doc
            .ancestors(item.node)
            .take_while(|&a| doc.body != Some(a))
            .filter(|&a| doc.node(a).is_some_and(|n| n.is_element() && n.tag != "html"))
            .find(|&a| self.center_within(doc, item.with_node(a)));
        match owner {
            Some(owner) => self.emit(item.with_node(owner), false),
            // Body is never an owner; a run of text directly under it stands
            // for itself.
            None if node.parent == doc.body => self.emit(item, false),
            None => {}
        }
    }

    /// Segment for one main-document element, outside traversal order.
    pub(crate) fn describe(&self, node: usize) -> Segment {
        let item = WorkItem {
            doc: 0,
            node,
            origin: Point::default(),
            in_iframe: false,
        };
        self.build(item, false).unwrap_or_else(|e| {
            warn!(node, "{}, using defaults", e);
            self.fallback(item)
        })
    }

    fn emit(&mut self, item: WorkItem, collapsed: bool) {
        if !self.emitted.insert(item.element()) {
            return;
        }
        let segment = match self.build(item, collapsed) {
            Ok(segment) => segment,
            Err(e) => {
                warn!(document = item.doc, node = item.node, "{}, using defaults", e);
                self.fallback(item)
            }
        };
        self.segments.push(segment);
    }

    fn build(&self, item: WorkItem, collapsed: bool) -> Result<Segment, PerceptionError> {
        let doc = self.snapshot.document(item.doc).ok_or_else(|| {
            PerceptionError::Classification(format!("document {} missing", item.doc))
        })?;
        let node = doc.node(item.node).ok_or_else(|| {
            PerceptionError::Classification(format!("node {} missing", item.node))
        })?;

        let bbox = self.bbox(doc, item, node);
        if ![bbox.x, bbox.y, bbox.width, bbox.height].iter().all(|v| v.is_finite()) {
            return Err(PerceptionError::Classification(format!(
                "non-finite geometry on <{}>",
                node.tag
            )));
        }

        let text = collapse_text(&doc.inner_text(item.node, self.mask(item)), self.config.max_text_len);
        let label = if node.is_text() {
            Some(Label::Text)
        } else {
            classify(&NodeContext {
                doc,
                index: item.node,
                node,
                text: &text,
                collapsed,
                config: self.config,
            })
        };
        let tag = if label == Some(Label::Button) {
            "BUTTON".to_string()
        } else {
            node.tag.to_ascii_uppercase()
        };

        Ok(Segment {
            index: 0,
            tag,
            label,
            bbox,
            text,
            description: description(node),
            element_id: node.element_id().to_string(),
            class_name: node.class_name().to_string(),
            clickable: is_clickable(doc, item.node),
            triggerable: is_triggerable(node),
            input_type: input_type(node),
            href: self.href(doc, item.node, node, label),
            src: self.src(doc, node),
            select_options: node.options.clone(),
            is_in_iframe: item.in_iframe,
            iframe_offset: item.in_iframe.then_some(item.origin),
            scroll_container: scroll_container(doc, item),
            identity_path: None,
            element: Some(item.element()),
        })
    }

    fn fallback(&self, item: WorkItem) -> Segment {
        let node = self.snapshot.document(item.doc).and_then(|d| d.node(item.node));
        Segment {
            tag: node.map(|n| n.tag.to_ascii_uppercase()).unwrap_or_default(),
            is_in_iframe: item.in_iframe,
            element: Some(item.element()),
            ..Default::default()
        }
    }

    fn bbox(&self, doc: &DocumentSnapshot, item: WorkItem, node: &DomNode) -> BoundingBox {
        let parent = node.parent.and_then(|p| doc.node(p)).map(|p| p.rect);
        node.rect
            .or_parent(parent)
            .offset(item.origin.x, item.origin.y)
    }

    fn href(
        &self,
        doc: &DocumentSnapshot,
        index: usize,
        node: &DomNode,
        label: Option<Label>,
    ) -> Option<String> {
        let raw = node.attr("href").or_else(|| {
            if label != Some(Label::Link) {
                return None;
            }
            doc.ancestors(index)
                .filter_map(|a| doc.node(a))
                .find(|a| a.tag == "a")
                .and_then(|a| a.attr("href"))
        })?;
        Some(compact_url(raw, self.base_url.as_ref())).filter(|u| !u.is_empty())
    }

    fn src(&self, doc: &DocumentSnapshot, node: &DomNode) -> Option<String> {
        let raw = node
            .attr("src")
            .or_else(|| {
                node.children
                    .iter()
                    .filter_map(|&c| doc.node(c))
                    .find(|c| c.tag == "source")
                    .and_then(|c| c.attr("src"))
            })
            .or_else(|| node.style.background_url())?;
        Some(compact_url(raw, self.base_url.as_ref())).filter(|u| !u.is_empty())
    }
}

fn is_atomic(node: &DomNode) -> bool {
    if node.tag == "input" {
        return node.input_type().as_deref() != Some("hidden");
    }
    ATOMIC_TAGS.contains(&node.tag.as_str())
}

fn is_nested_control(tag: &str) -> bool {
    matches!(tag, "a" | "button" | "input" | "select" | "textarea")
}

fn scroll_container(doc: &DocumentSnapshot, item: WorkItem) -> Option<ElementRef> {
    doc.ancestors(item.node)
        .take_while(|&a| doc.body != Some(a))
        .find(|&a| doc.node(a).is_some_and(|n| n.scrollable))
        .map(|a| item.with_node(a).element())
}

/// Collapse whitespace runs and optionally truncate by characters.
fn collapse_text(raw: &str, max_len: usize) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if max_len == 0 || collapsed.chars().count() <= max_len {
        return collapsed;
    }
    collapsed.chars().take(max_len).collect()
}
