//! Absolute and relative element paths over a snapshot document.
//!
//! Step indices are 1-based positions among same-tag element siblings, so
//! rendered paths read like XPath (`/html[1]/body[1]/table[1]/tr[3]`).

use std::fmt;

use crate::dom::DocumentSnapshot;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    tag: String,
    /// `None` is the `[x]` wildcard.
    index: Option<usize>,
}

/// Path from the document root to an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ElementPath {
    steps: Vec<Step>,
}

impl ElementPath {
    pub(crate) fn of(doc: &DocumentSnapshot, node: usize) -> Option<Self> {
        let mut chain = vec![node];
        chain.extend(doc.ancestors(node));
        let mut steps = Vec::with_capacity(chain.len());
        for &i in chain.iter().rev() {
            let n = doc.node(i)?;
            if !n.is_element() {
                return None;
            }
            steps.push(Step {
                tag: n.tag.clone(),
                index: Some(same_tag_index(doc, i)),
            });
        }
        Some(Self { steps })
    }

    /// This path with a wildcard at the first level where `other` takes a
    /// different sibling. `None` when the paths have different shapes or
    /// point at the same element.
    pub(crate) fn template(&self, other: &ElementPath) -> Option<ElementPath> {
        if self.steps.len() != other.steps.len()
            || self.steps.iter().zip(&other.steps).any(|(a, b)| a.tag != b.tag)
        {
            return None;
        }
        let diverge = self
            .steps
            .iter()
            .zip(&other.steps)
            .position(|(a, b)| a.index != b.index)?;
        let mut template = self.clone();
        template.steps[diverge].index = None;
        Some(template)
    }

    pub(crate) fn matches(&self, path: &ElementPath) -> bool {
        self.steps.len() == path.steps.len()
            && self.steps.iter().zip(&path.steps).all(|(t, p)| {
                t.tag == p.tag && (t.index.is_none() || t.index == p.index)
            })
    }
}

impl fmt::Display for ElementPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            match step.index {
                Some(i) => write!(f, "/{}[{}]", step.tag, i)?,
                None => write!(f, "/{}[x]", step.tag)?,
            }
        }
        Ok(())
    }
}

/// Walk from one element to another: up to the common ancestor, then down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RelativePath {
    ups: usize,
    steps: Vec<(String, usize)>,
}

impl RelativePath {
    pub(crate) fn between(doc: &DocumentSnapshot, from: usize, to: usize) -> Option<Self> {
        let mut upward = vec![from];
        upward.extend(doc.ancestors(from));
        let ups = upward
            .iter()
            .position(|&a| doc.is_self_or_descendant(to, a))?;
        let common = upward[ups];

        let mut down = vec![to];
        down.extend(doc.ancestors(to).take_while(|&a| a != common));
        let steps = down
            .iter()
            .rev()
            .filter(|&&i| i != common)
            .map(|&i| {
                let tag = doc.node(i).map(|n| n.tag.clone()).unwrap_or_default();
                (tag, same_tag_index(doc, i))
            })
            .collect();
        Some(Self { ups, steps })
    }

    /// Tree distance covered by the walk.
    pub(crate) fn len(&self) -> usize {
        self.ups + self.steps.len()
    }

    pub(crate) fn apply(&self, doc: &DocumentSnapshot, from: usize) -> Option<usize> {
        let mut current = from;
        for _ in 0..self.ups {
            current = doc.node(current)?.parent?;
        }
        for (tag, index) in &self.steps {
            current = nth_child(doc, current, tag, *index)?;
        }
        Some(current)
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = std::iter::repeat_n("..".to_string(), self.ups)
            .chain(self.steps.iter().map(|(tag, i)| format!("{}[{}]", tag, i)))
            .collect();
        if parts.is_empty() {
            return f.write_str(".");
        }
        f.write_str(&parts.join("/"))
    }
}

fn same_tag_index(doc: &DocumentSnapshot, node: usize) -> usize {
    let Some(n) = doc.node(node) else {
        return 1;
    };
    let Some(parent) = n.parent else {
        return 1;
    };
    doc.element_children(parent)
        .filter(|&c| doc.node(c).is_some_and(|s| s.tag == n.tag))
        .position(|c| c == node)
        .map_or(1, |p| p + 1)
}

fn nth_child(doc: &DocumentSnapshot, parent: usize, tag: &str, index: usize) -> Option<usize> {
    doc.element_children(parent)
        .filter(|&c| doc.node(c).is_some_and(|n| n.tag == tag))
        .nth(index.checked_sub(1)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::DomBuilder;

    fn table() -> (crate::dom::DomSnapshot, Vec<[usize; 2]>) {
        let mut b = DomBuilder::new(800.0, 600.0);
        let table = b.el(1, "table", (0.0, 0.0, 400.0, 90.0));
        let rows = (0..3)
            .map(|r| {
                let y = r as f64 * 30.0;
                let tr = b.el(table, "tr", (0.0, y, 400.0, 30.0));
                [
                    b.el(tr, "td", (0.0, y, 200.0, 30.0)),
                    b.el(tr, "td", (200.0, y, 200.0, 30.0)),
                ]
            })
            .collect();
        (b.build(), rows)
    }

    #[test]
    fn test_absolute_path_and_template() {
        let (snapshot, rows) = table();
        let doc = snapshot.main().unwrap();
        let first = ElementPath::of(doc, rows[0][0]).unwrap();
        let third = ElementPath::of(doc, rows[2][0]).unwrap();
        assert_eq!(first.to_string(), "/html[1]/body[1]/table[1]/tr[1]/td[1]");

        let template = first.template(&third).unwrap();
        assert_eq!(template.to_string(), "/html[1]/body[1]/table[1]/tr[x]/td[1]");
        assert!(template.matches(&ElementPath::of(doc, rows[1][0]).unwrap()));
        assert!(!template.matches(&ElementPath::of(doc, rows[1][1]).unwrap()));
        assert!(first.template(&first).is_none());
    }

    #[test]
    fn test_relative_path_round_trip_across_rows() {
        let (snapshot, rows) = table();
        let doc = snapshot.main().unwrap();
        let rel = RelativePath::between(doc, rows[0][0], rows[0][1]).unwrap();
        assert_eq!(rel.to_string(), "../td[2]");
        assert_eq!(rel.len(), 2);
        assert_eq!(rel.apply(doc, rows[2][0]), Some(rows[2][1]));
        assert_eq!(rel.apply(doc, 0), None);
    }
}
