use pagesense_protocols::BoundingBox;

use crate::dom::{DocumentSnapshot, DomNode, DomSnapshot, NodeKind, NodeStyle};

/// Builds snapshot fixtures by hand.
///
/// Document 0 starts with `html` (node 0) and `body` (node 1) sized to the
/// viewport.
pub(crate) struct DomBuilder {
    documents: Vec<DocumentSnapshot>,
    url: String,
}

impl DomBuilder {
    pub fn new(width: f64, height: f64) -> Self {
        let mut builder = Self {
            documents: Vec::new(),
            url: "https://example.com/".to_string(),
        };
        builder.new_document(width, height);
        builder
    }

    /// Start another document (an iframe's content). Returns its index.
    pub fn new_document(&mut self, width: f64, height: f64) -> usize {
        let rect = BoundingBox::new(0.0, 0.0, width, height);
        let html = DomNode {
            tag: "html".to_string(),
            children: vec![1],
            rect,
            ..Default::default()
        };
        let body = DomNode {
            tag: "body".to_string(),
            parent: Some(0),
            rect,
            ..Default::default()
        };
        self.documents.push(DocumentSnapshot {
            nodes: vec![html, body],
            body: Some(1),
            viewport_width: width,
            viewport_height: height,
            scroll_height: height,
            ..Default::default()
        });
        self.documents.len() - 1
    }

    pub fn url(&mut self, url: &str) -> &mut Self {
        self.url = url.to_string();
        self
    }

    /// Append an element to document 0.
    pub fn el(&mut self, parent: usize, tag: &str, rect: (f64, f64, f64, f64)) -> usize {
        self.el_in(0, parent, tag, rect)
    }

    pub fn el_in(&mut self, doc: usize, parent: usize, tag: &str, rect: (f64, f64, f64, f64)) -> usize {
        let node = DomNode {
            tag: tag.to_string(),
            rect: BoundingBox::new(rect.0, rect.1, rect.2, rect.3),
            ..Default::default()
        };
        self.push(doc, parent, node)
    }

    /// Append a text node under `parent`, sized like its parent.
    pub fn text(&mut self, parent: usize, text: &str) -> usize {
        self.text_in(0, parent, text)
    }

    pub fn text_in(&mut self, doc: usize, parent: usize, text: &str) -> usize {
        let rect = self.documents[doc].nodes[parent].rect;
        let node = DomNode {
            kind: NodeKind::Text,
            tag: "#text".to_string(),
            rect,
            text: text.to_string(),
            ..Default::default()
        };
        self.push(doc, parent, node)
    }

    pub fn attr(&mut self, node: usize, name: &str, value: &str) -> &mut Self {
        self.attr_in(0, node, name, value)
    }

    pub fn attr_in(&mut self, doc: usize, node: usize, name: &str, value: &str) -> &mut Self {
        self.documents[doc].nodes[node]
            .attrs
            .insert(name.to_string(), value.to_string());
        self
    }

    pub fn style(&mut self, node: usize, edit: impl FnOnce(&mut NodeStyle)) -> &mut Self {
        edit(&mut self.documents[0].nodes[node].style);
        self
    }

    pub fn node_mut(&mut self, node: usize) -> &mut DomNode {
        &mut self.documents[0].nodes[node]
    }

    pub fn node_in_mut(&mut self, doc: usize, node: usize) -> &mut DomNode {
        &mut self.documents[doc].nodes[node]
    }

    pub fn scroll(&mut self, scroll_y: f64, scroll_height: f64) -> &mut Self {
        self.documents[0].scroll_y = scroll_y;
        self.documents[0].scroll_height = scroll_height;
        self
    }

    pub fn build(&self) -> DomSnapshot {
        DomSnapshot {
            url: self.url.clone(),
            documents: self.documents.clone(),
            points: Vec::new(),
        }
    }

    fn push(&mut self, doc: usize, parent: usize, mut node: DomNode) -> usize {
        let nodes = &mut self.documents[doc].nodes;
        node.parent = Some(parent);
        nodes.push(node);
        let index = nodes.len() - 1;
        nodes[parent].children.push(index);
        index
    }
}
