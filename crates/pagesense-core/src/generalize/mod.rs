//! Pattern generalization: turns a few example points on repeated rows
//! into a template and extracts every matching record.
//!
//! The structural strategy diffs the tree paths of the first two examples
//! into a path with a wildcard index. When that finds fewer than three
//! rows, or when the caller names properties to compare, the attribute
//! strategy matches every visible element sharing the examples' common
//! properties instead. Further examples become extra columns reached by a
//! relative path from each row.

mod path;
mod properties;

pub use properties::Property;

use std::collections::HashMap;
use std::str::FromStr;

use pagesense_config::{Config, SegmenterConfig};
use pagesense_protocols::{PerceptionError, Point, RemotePage, Segment};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::dom::{DocumentSnapshot, DomSnapshot};
use crate::segment::Traversal;
use path::{ElementPath, RelativePath};
use properties::{Selector, common_properties};

/// Fewest rows a structural template must match to be trusted.
const MIN_STRUCTURAL_MATCHES: usize = 3;

/// A point on the page (page coordinates) on one field of one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamplePoint {
    pub x: f64,
    pub y: f64,
    /// Climb from the hit element to the nearest element with this tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl ExamplePoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, tag: None }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Parses `x,y` or `x,y,tag`.
impl FromStr for ExamplePoint {
    type Err = PerceptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PerceptionError::InvalidInput(format!("expected x,y[,tag], got '{}'", s));
        let mut parts = s.split(',').map(str::trim);
        let x = parts.next().and_then(|v| v.parse().ok()).ok_or_else(invalid)?;
        let y = parts.next().and_then(|v| v.parse().ok()).ok_or_else(invalid)?;
        let tag = parts.next().filter(|t| !t.is_empty()).map(str::to_ascii_lowercase);
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self { x, y, tag })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateStrategy {
    Structural,
    Attribute,
}

/// How the rows were found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatedTemplate {
    pub strategy: TemplateStrategy,
    /// Path with a `[x]` wildcard, structural strategy only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xpath: Option<String>,
    /// Narrowed selector, attribute strategy only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    /// Properties the first two examples share.
    pub properties: Vec<Property>,
    /// Row-relative path to each column after the first.
    pub relative_paths: Vec<String>,
}

/// Extracted records: one column per example field, one entry per row.
/// Rows a column could not be found on hold placeholder segments.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Generalization {
    pub template: Option<RepeatedTemplate>,
    pub columns: Vec<Vec<Segment>>,
}

impl Generalization {
    pub fn is_empty(&self) -> bool {
        self.columns.iter().all(|c| c.is_empty())
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, |c| c.len())
    }
}

#[derive(Debug, Clone, Default)]
pub struct PatternGeneralizer {
    segmenter: SegmenterConfig,
}

impl PatternGeneralizer {
    pub fn new(segmenter: SegmenterConfig) -> Self {
        Self { segmenter }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.segmenter.clone())
    }

    /// Capture the page and generalize from `points`. Non-empty
    /// `properties` force the attribute strategy.
    pub async fn generalize(
        &self,
        page: &dyn RemotePage,
        points: &[ExamplePoint],
        properties: &[Property],
    ) -> Result<Generalization, PerceptionError> {
        check_points(points)?;
        let coords: Vec<Point> = points.iter().map(ExamplePoint::point).collect();
        let snapshot = DomSnapshot::capture(page, &coords).await?;
        self.generalize_snapshot(&snapshot, points, properties)
    }

    /// Generalize over a captured snapshot. Only too few points is an
    /// error; anything else that goes wrong yields an empty result.
    pub fn generalize_snapshot(
        &self,
        snapshot: &DomSnapshot,
        points: &[ExamplePoint],
        properties: &[Property],
    ) -> Result<Generalization, PerceptionError> {
        check_points(points)?;
        let Some(doc) = snapshot.main() else {
            return Ok(Generalization::default());
        };
        let mask = doc.visibility_mask();

        let mut seeds = Vec::with_capacity(points.len());
        for (i, example) in points.iter().enumerate() {
            match resolve_example(snapshot, doc, &mask, i, example) {
                Some(node) => seeds.push(node),
                None => {
                    warn!(
                        x = example.x,
                        y = example.y,
                        "Example point resolves to no element, nothing extracted"
                    );
                    return Ok(Generalization::default());
                }
            }
        }

        match self.extract(snapshot, doc, &mask, &seeds, properties) {
            Ok(generalization) => {
                debug!(
                    rows = generalization.row_count(),
                    columns = generalization.columns.len(),
                    "Generalized repeated records"
                );
                Ok(generalization)
            }
            Err(e) => {
                warn!("{}", e);
                Ok(Generalization::default())
            }
        }
    }

    fn extract(
        &self,
        snapshot: &DomSnapshot,
        doc: &DocumentSnapshot,
        mask: &[bool],
        seeds: &[usize],
        properties: &[Property],
    ) -> Result<Generalization, PerceptionError> {
        let (first, second) = (seeds[0], seeds[1]);
        let (mut template, rows) = if properties.is_empty() {
            match structural(doc, mask, first, second) {
                Some((path, rows)) => {
                    let template = RepeatedTemplate {
                        strategy: TemplateStrategy::Structural,
                        xpath: Some(path.to_string()),
                        selector: None,
                        properties: common_properties(doc, first, second, &Property::ALL),
                        relative_paths: Vec::new(),
                    };
                    (template, rows)
                }
                None => {
                    debug!("Structural template too weak, matching by attributes");
                    by_attributes(doc, mask, first, second, &Property::ALL)?
                }
            }
        } else {
            by_attributes(doc, mask, first, second, properties)?
        };

        let describer = Traversal::new(snapshot, &self.segmenter);
        let describe_rows = |nodes: Vec<Option<usize>>| -> Vec<Segment> {
            nodes
                .into_iter()
                .enumerate()
                .map(|(row, node)| match node {
                    Some(node) => Segment {
                        index: row,
                        ..describer.describe(node)
                    },
                    None => Segment::placeholder(row),
                })
                .collect()
        };

        let mut columns = vec![describe_rows(rows.iter().copied().map(Some).collect())];
        for &extra in &seeds[2..] {
            let relative = nearest_relative_path(doc, &rows, extra).ok_or_else(|| {
                PerceptionError::TemplateGeneralization(
                    "example point is unrelated to every row".to_string(),
                )
            })?;
            let cells: Vec<Option<usize>> = rows.iter().map(|&row| relative.apply(doc, row)).collect();
            let missing = cells.iter().filter(|c| c.is_none()).count();
            if missing > 0 {
                debug!(path = %relative, missing, "Column missing on some rows");
            }
            template.relative_paths.push(relative.to_string());
            columns.push(describe_rows(cells));
        }

        Ok(Generalization {
            template: Some(template),
            columns,
        })
    }
}

fn check_points(points: &[ExamplePoint]) -> Result<(), PerceptionError> {
    if points.len() < 2 {
        return Err(PerceptionError::InvalidInput(format!(
            "at least two example points are required, got {}",
            points.len()
        )));
    }
    Ok(())
}

fn resolve_example(
    snapshot: &DomSnapshot,
    doc: &DocumentSnapshot,
    mask: &[bool],
    i: usize,
    example: &ExamplePoint,
) -> Option<usize> {
    let hit = snapshot.resolve_point(i, example.point(), mask)?;
    let Some(tag) = &example.tag else {
        return Some(hit);
    };
    std::iter::once(hit)
        .chain(doc.ancestors(hit))
        .find(|&n| doc.node(n).is_some_and(|n| n.tag.eq_ignore_ascii_case(tag)))
}

/// Rendered and not pushed off the page.
fn is_visible(doc: &DocumentSnapshot, index: usize, mask: &[bool]) -> bool {
    let Some(node) = doc.node(index) else {
        return false;
    };
    mask.get(index).copied().unwrap_or(false)
        && node.style.opacity > 0.0
        && !node.rect.is_empty()
        && node.rect.right() > 0.0
        && node.rect.bottom() > 0.0
}

fn structural(
    doc: &DocumentSnapshot,
    mask: &[bool],
    first: usize,
    second: usize,
) -> Option<(ElementPath, Vec<usize>)> {
    let template = ElementPath::of(doc, first)?.template(&ElementPath::of(doc, second)?)?;
    let tag = &doc.node(first)?.tag;

    let mut rows: Vec<usize> = doc
        .nodes
        .iter()
        .enumerate()
        .filter(|(i, n)| n.is_element() && n.tag == *tag && is_visible(doc, *i, mask))
        .map(|(i, _)| i)
        .filter(|&i| ElementPath::of(doc, i).is_some_and(|p| template.matches(&p)))
        .collect();
    if rows.len() < MIN_STRUCTURAL_MATCHES {
        debug!(template = %template, rows = rows.len(), "Structural template rejected");
        return None;
    }
    prune_class_outlier(doc, &mut rows, &[first, second]);
    Some((template, rows))
}

/// Drop a lone row whose class appears nowhere else among the rows.
fn prune_class_outlier(doc: &DocumentSnapshot, rows: &mut Vec<usize>, keep: &[usize]) {
    let class_of = |i: usize| doc.node(i).map(|n| n.class_name()).unwrap_or_default();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for &row in rows.iter() {
        *counts.entry(class_of(row)).or_default() += 1;
    }
    let outliers: Vec<usize> = rows
        .iter()
        .copied()
        .filter(|&r| counts.get(class_of(r)) == Some(&1))
        .collect();
    let [outlier] = outliers[..] else {
        return;
    };
    if keep.contains(&outlier) || rows.len() <= MIN_STRUCTURAL_MATCHES {
        return;
    }
    debug!(node = outlier, class = class_of(outlier), "Pruned class outlier");
    rows.retain(|&r| r != outlier);
}

fn by_attributes(
    doc: &DocumentSnapshot,
    mask: &[bool],
    first: usize,
    second: usize,
    properties: &[Property],
) -> Result<(RepeatedTemplate, Vec<usize>), PerceptionError> {
    let shared = common_properties(doc, first, second, properties);
    if shared.is_empty() {
        return Err(PerceptionError::TemplateGeneralization(
            "example points share none of the checked properties".to_string(),
        ));
    }
    let seed = doc.node(first).ok_or_else(|| {
        PerceptionError::TemplateGeneralization(format!("node {} missing", first))
    })?;
    let selector = Selector::narrowed(seed, &shared);
    let expected: Vec<(Property, String)> = shared.iter().map(|p| (*p, p.value(doc, first))).collect();

    let rows: Vec<usize> = doc
        .nodes
        .iter()
        .enumerate()
        .filter(|(i, n)| selector.matches(n) && is_visible(doc, *i, mask))
        .map(|(i, _)| i)
        .filter(|&i| expected.iter().all(|(p, v)| p.value(doc, i) == *v))
        .collect();
    if rows.is_empty() {
        return Err(PerceptionError::TemplateGeneralization(format!(
            "no visible element matches {}",
            selector
        )));
    }

    let template = RepeatedTemplate {
        strategy: TemplateStrategy::Attribute,
        xpath: None,
        selector: Some(selector.to_string()),
        properties: shared,
        relative_paths: Vec::new(),
    };
    Ok((template, rows))
}

/// Relative path from the row closest (in tree distance) to `target`.
fn nearest_relative_path(doc: &DocumentSnapshot, rows: &[usize], target: usize) -> Option<RelativePath> {
    rows.iter()
        .filter_map(|&row| RelativePath::between(doc, row, target))
        .min_by_key(RelativePath::len)
}

#[cfg(test)]
#[path = "generalize_tests.rs"]
mod tests;
