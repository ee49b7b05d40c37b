//! Identity paths for content-identical segments.

use std::collections::HashMap;

use pagesense_protocols::Segment;

use crate::dom::DomSnapshot;

/// Ancestors contributing to an identity path.
const IDENTITY_DEPTH: usize = 2;

/// Give every segment that shares its duplicate key with another one an
/// identity path built from its two nearest ancestors and itself. Paths
/// that still collide get an occurrence suffix.
pub(crate) fn annotate_duplicates(snapshot: &DomSnapshot, segments: &mut [Segment]) {
    let mut groups: HashMap<_, Vec<usize>> = HashMap::new();
    for (i, segment) in segments.iter().enumerate() {
        groups.entry(segment.duplicate_key()).or_default().push(i);
    }
    let mut duplicated: Vec<usize> = groups
        .into_values()
        .filter(|members| members.len() > 1)
        .flatten()
        .collect();
    duplicated.sort_unstable();

    let paths: Vec<(usize, String)> = duplicated
        .into_iter()
        .map(|i| (i, identity_path(snapshot, &segments[i])))
        .collect();

    let mut seen: HashMap<String, usize> = HashMap::new();
    for (i, path) in paths {
        let occurrence = seen.entry(path.clone()).or_insert(0);
        *occurrence += 1;
        segments[i].identity_path = Some(if *occurrence == 1 {
            path
        } else {
            format!("{}:{}", path, occurrence)
        });
    }
}

fn identity_path(snapshot: &DomSnapshot, segment: &Segment) -> String {
    let fallback = || segment.tag.to_lowercase();
    let Some(element) = segment.element else {
        return fallback();
    };
    let Some(doc) = snapshot.document(element.document) else {
        return fallback();
    };

    let mut parts: Vec<String> = doc
        .ancestors(element.node)
        .take(IDENTITY_DEPTH)
        .filter_map(|a| doc.node(a))
        .map(|n| n.signature())
        .collect();
    parts.reverse();
    parts.push(doc.node(element.node).map_or_else(fallback, |n| n.signature()));
    parts.join(" > ")
}
