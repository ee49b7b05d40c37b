//! Snapshot data model and queries.

use std::collections::{BTreeMap, HashMap};

use pagesense_protocols::{BoundingBox, Point};
use serde::{Deserialize, Serialize};

/// Result of one hit test.
///
/// Serialised as the capture script reports it: a node index, `null` when
/// nothing was hit, or `-1` when the point lay outside the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<i64>", into = "Option<i64>")]
pub enum Probe {
    /// Not measured; resolved geometrically over the snapshot.
    #[default]
    Unknown,
    Miss,
    Hit(usize),
}

impl From<Option<i64>> for Probe {
    fn from(value: Option<i64>) -> Self {
        match value {
            None => Probe::Miss,
            Some(n) if n < 0 => Probe::Unknown,
            Some(n) => Probe::Hit(n as usize),
        }
    }
}

impl From<Probe> for Option<i64> {
    fn from(probe: Probe) -> Self {
        match probe {
            Probe::Unknown => Some(-1),
            Probe::Miss => None,
            Probe::Hit(n) => Some(n as i64),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    #[default]
    Element,
    Text,
}

/// Computed style subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeStyle {
    pub display: String,
    pub visibility: String,
    pub opacity: f64,
    pub cursor: String,
    pub background_image: String,
    pub color: String,
    pub background_color: String,
    pub font_size: String,
    pub font_weight: String,
    pub font_family: String,
}

impl Default for NodeStyle {
    fn default() -> Self {
        Self {
            display: "block".to_string(),
            visibility: "visible".to_string(),
            opacity: 1.0,
            cursor: "auto".to_string(),
            background_image: "none".to_string(),
            color: String::new(),
            background_color: String::new(),
            font_size: String::new(),
            font_weight: String::new(),
            font_family: String::new(),
        }
    }
}

impl NodeStyle {
    /// Hidden by `display` or `visibility`.
    pub fn is_hidden(&self) -> bool {
        self.is_undisplayed() || self.is_invisible()
    }

    /// `display: none` removes the whole subtree from rendering.
    pub fn is_undisplayed(&self) -> bool {
        self.display == "none"
    }

    /// Computed `visibility` applies to this node only; a descendant can
    /// override it with `visible`.
    pub fn is_invisible(&self) -> bool {
        self.visibility == "hidden" || self.visibility == "collapse"
    }

    /// URL of a CSS background image, if one is set.
    pub fn background_url(&self) -> Option<&str> {
        let start = self.background_image.find("url(")? + 4;
        let rest = &self.background_image[start..];
        let end = rest.find(')')?;
        let url = rest[..end].trim().trim_matches(|c| c == '"' || c == '\'');
        (!url.is_empty()).then_some(url)
    }
}

/// One element or text node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DomNode {
    pub kind: NodeKind,
    /// Lowercase tag name; `#text` for text nodes.
    pub tag: String,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub attrs: BTreeMap<String, String>,
    pub style: NodeStyle,
    /// Client rect in the page coordinates of the owning document.
    pub rect: BoundingBox,
    /// Collapsed text; only text nodes carry it.
    pub text: String,
    pub options: Vec<String>,
    pub custom_element: bool,
    pub scrollable: bool,
    pub click_handler: bool,
    /// Top-left, top-right, bottom-left, bottom-right and center hit tests.
    pub probes: Vec<Probe>,
    pub content_document: Option<usize>,
    pub frame_inaccessible: bool,
}

impl DomNode {
    pub fn is_element(&self) -> bool {
        self.kind == NodeKind::Element
    }

    pub fn is_text(&self) -> bool {
        self.kind == NodeKind::Text
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(|s| s.as_str())
    }

    pub fn element_id(&self) -> &str {
        self.attr("id").unwrap_or_default()
    }

    pub fn class_name(&self) -> &str {
        self.attr("class").unwrap_or_default()
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.class_name().split_whitespace()
    }

    /// `tag#id.class1.class2`, used in identity paths and parent matching.
    pub fn signature(&self) -> String {
        let mut sig = self.tag.clone();
        if !self.element_id().is_empty() {
            sig.push('#');
            sig.push_str(self.element_id());
        }
        for class in self.classes() {
            sig.push('.');
            sig.push_str(class);
        }
        sig
    }

    /// Lowercased `type` attribute of form controls.
    pub fn input_type(&self) -> Option<String> {
        self.attr("type").map(|t| t.to_ascii_lowercase())
    }
}

/// One document: the main page or an accessible iframe.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentSnapshot {
    pub nodes: Vec<DomNode>,
    pub body: Option<usize>,
    pub scroll_x: f64,
    pub scroll_y: f64,
    pub viewport_width: f64,
    pub viewport_height: f64,
    pub scroll_height: f64,
}

impl DocumentSnapshot {
    pub fn node(&self, index: usize) -> Option<&DomNode> {
        self.nodes.get(index)
    }

    /// Visible viewport in page coordinates.
    pub fn viewport_box(&self) -> BoundingBox {
        BoundingBox::new(
            self.scroll_x,
            self.scroll_y,
            self.viewport_width,
            self.viewport_height,
        )
    }

    /// Parent chain from `index` upward, excluding `index` itself.
    ///
    /// Bounded by the arena size so malformed parent links cannot loop.
    pub fn ancestors(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        let mut current = self.node(index).and_then(|n| n.parent);
        let mut remaining = self.nodes.len();
        std::iter::from_fn(move || {
            let next = current?;
            if remaining == 0 {
                return None;
            }
            remaining -= 1;
            current = self.node(next).and_then(|n| n.parent);
            Some(next)
        })
    }

    pub fn is_self_or_descendant(&self, candidate: usize, ancestor: usize) -> bool {
        candidate == ancestor || self.ancestors(candidate).any(|a| a == ancestor)
    }

    /// Per-node visibility. `display: none` on any ancestor hides a node;
    /// `visibility` is judged from the node's own computed value, and a
    /// text node takes it from its parent element.
    pub fn visibility_mask(&self) -> Vec<bool> {
        let rendered = self.rendered_mask();
        (0..self.nodes.len())
            .map(|i| {
                if !rendered[i] {
                    return false;
                }
                let node = &self.nodes[i];
                let style = if node.is_text() {
                    match node.parent.and_then(|p| self.node(p)) {
                        Some(parent) => &parent.style,
                        None => &node.style,
                    }
                } else {
                    &node.style
                };
                !style.is_invisible()
            })
            .collect()
    }

    /// Nodes not removed by `display: none` on themselves or an ancestor.
    fn rendered_mask(&self) -> Vec<bool> {
        let mut mask: Vec<Option<bool>> = vec![None; self.nodes.len()];
        for start in 0..self.nodes.len() {
            let mut chain = Vec::new();
            let mut cursor = Some(start);
            let mut inherited = true;
            while let Some(i) = cursor {
                if let Some(known) = mask[i] {
                    inherited = known;
                    break;
                }
                if chain.len() > self.nodes.len() {
                    break;
                }
                chain.push(i);
                cursor = self.nodes[i].parent.filter(|p| *p < self.nodes.len());
            }
            for i in chain.into_iter().rev() {
                inherited = inherited && !self.nodes[i].style.is_undisplayed();
                mask[i] = Some(inherited);
            }
        }
        mask.into_iter().map(|v| v.unwrap_or(false)).collect()
    }

    /// Topmost visible element containing `point`: the last one in document
    /// order, which approximates paint order.
    pub fn hit_test(&self, point: Point, mask: &[bool]) -> Option<usize> {
        self.nodes
            .iter()
            .enumerate()
            .rev()
            .find(|(i, n)| self.hit_candidate(*i, n, mask) && n.rect.contains(point.x, point.y))
            .map(|(i, _)| i)
    }

    fn hit_candidate(&self, index: usize, node: &DomNode, mask: &[bool]) -> bool {
        node.is_element()
            && mask.get(index).copied().unwrap_or(false)
            && node.style.opacity > 0.0
            && !node.rect.is_empty()
    }

    /// Grid over the hit candidates, for answering many hit tests.
    pub fn hit_index(&self, mask: &[bool]) -> HitIndex {
        let mut index = HitIndex::default();
        for (i, node) in self.nodes.iter().enumerate() {
            if self.hit_candidate(i, node, mask) {
                index.insert(i, node.rect);
            }
        }
        index
    }

    /// Resolve sample point `k` (see [`BoundingBox::sample_points`]) of a node.
    pub fn resolve_probe(&self, index: usize, k: usize, hits: &HitIndex) -> Option<usize> {
        let node = self.node(index)?;
        match node.probes.get(k).copied().unwrap_or_default() {
            Probe::Hit(hit) => Some(hit),
            Probe::Miss => None,
            Probe::Unknown => {
                let point = *node.rect.sample_points().get(k)?;
                hits.hit(point)
            }
        }
    }

    /// Collapsed text of every visible descendant text node, in document
    /// order. Mirrors `innerText` closely enough for classification.
    pub fn inner_text(&self, index: usize, mask: &[bool]) -> String {
        let Some(node) = self.node(index) else {
            return String::new();
        };
        if node.is_text() {
            return node.text.clone();
        }

        let mut parts: Vec<&str> = Vec::new();
        let mut stack: Vec<usize> = node.children.iter().rev().copied().collect();
        let mut budget = self.nodes.len();
        while let Some(i) = stack.pop() {
            if budget == 0 {
                break;
            }
            budget -= 1;
            let Some(child) = self.node(i) else { continue };
            if !mask.get(i).copied().unwrap_or(false) {
                continue;
            }
            if child.is_text() {
                parts.push(child.text.as_str());
            } else if !matches!(child.tag.as_str(), "script" | "style" | "noscript" | "template")
            {
                stack.extend(child.children.iter().rev().copied());
            }
        }
        parts.join(" ")
    }

    /// Element children only.
    pub fn element_children(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.node(index)
            .map(|n| n.children.as_slice())
            .unwrap_or_default()
            .iter()
            .copied()
            .filter(|c| self.node(*c).is_some_and(|n| n.is_element()))
    }

    /// All descendants in document order.
    pub fn descendants(&self, index: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack: Vec<usize> = self
            .node(index)
            .map(|n| n.children.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(i) = stack.pop() {
            if out.len() > self.nodes.len() {
                break;
            }
            out.push(i);
            if let Some(n) = self.node(i) {
                stack.extend(n.children.iter().rev().copied());
            }
        }
        out
    }
}

/// A captured page.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DomSnapshot {
    pub url: String,
    /// Index 0 is the main document.
    pub documents: Vec<DocumentSnapshot>,
    /// Hit tests of the requested example points, main document.
    pub points: Vec<Probe>,
}

impl DomSnapshot {
    pub fn main(&self) -> Option<&DocumentSnapshot> {
        self.documents.first()
    }

    pub fn document(&self, index: usize) -> Option<&DocumentSnapshot> {
        self.documents.get(index)
    }

    pub fn node_count(&self) -> usize {
        self.documents.iter().map(|d| d.nodes.len()).sum()
    }

    /// Element at example point `i` of the main document.
    pub fn resolve_point(&self, i: usize, point: Point, mask: &[bool]) -> Option<usize> {
        let main = self.main()?;
        match self.points.get(i).copied().unwrap_or_default() {
            Probe::Hit(hit) => Some(hit),
            Probe::Miss => None,
            Probe::Unknown => main.hit_test(point, mask),
        }
    }
}

/// Uniform grid of element rects. Each cell lists, in document order, the
/// candidates overlapping it, so a hit test only scans one cell.
#[derive(Debug, Default)]
pub struct HitIndex {
    cells: HashMap<(i64, i64), Vec<(usize, BoundingBox)>>,
    /// Rects too large or malformed to bucket; checked on every query.
    spanning: Vec<(usize, BoundingBox)>,
}

impl HitIndex {
    const CELL: f64 = 256.0;
    const MAX_CELLS: i64 = 1024;

    fn cell_of(v: f64) -> i64 {
        (v / Self::CELL).floor() as i64
    }

    fn insert(&mut self, index: usize, rect: BoundingBox) {
        let finite = [rect.x, rect.y, rect.right(), rect.bottom()]
            .iter()
            .all(|v| v.is_finite());
        let (x0, x1) = (Self::cell_of(rect.x), Self::cell_of(rect.right()));
        let (y0, y1) = (Self::cell_of(rect.y), Self::cell_of(rect.bottom()));
        let cols = x1.saturating_sub(x0).saturating_add(1);
        let rows = y1.saturating_sub(y0).saturating_add(1);
        if !finite || cols.saturating_mul(rows) > Self::MAX_CELLS {
            self.spanning.push((index, rect));
            return;
        }
        for cx in x0..=x1 {
            for cy in y0..=y1 {
                self.cells.entry((cx, cy)).or_default().push((index, rect));
            }
        }
    }

    /// Same answer as [`DocumentSnapshot::hit_test`] with the mask the index
    /// was built from.
    pub fn hit(&self, point: Point) -> Option<usize> {
        let topmost = |entries: &[(usize, BoundingBox)]| {
            entries
                .iter()
                .rev()
                .find(|(_, rect)| rect.contains(point.x, point.y))
                .map(|(i, _)| *i)
        };
        let bucketed = self
            .cells
            .get(&(Self::cell_of(point.x), Self::cell_of(point.y)))
            .and_then(|entries| topmost(entries));
        bucketed.max(topmost(&self.spanning))
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
