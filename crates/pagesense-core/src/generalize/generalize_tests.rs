use super::*;
use crate::testing::{DomBuilder, FakePage};
use std::collections::HashSet;

/// `rows` x `cols` table, cells 200x30, text `r{row}c{col}`.
fn table(rows: usize, cols: impl Fn(usize) -> usize) -> (DomBuilder, Vec<Vec<usize>>) {
    let mut b = DomBuilder::new(800.0, 600.0);
    let table = b.el(1, "table", (0.0, 0.0, 600.0, rows as f64 * 30.0));
    let cells = (0..rows)
        .map(|r| {
            let y = r as f64 * 30.0;
            let tr = b.el(table, "tr", (0.0, y, 600.0, 30.0));
            (0..cols(r))
                .map(|c| {
                    let td = b.el(tr, "td", (c as f64 * 200.0, y, 200.0, 30.0));
                    b.text(td, &format!("r{}c{}", r, c));
                    td
                })
                .collect()
        })
        .collect();
    (b, cells)
}

fn point(x: f64, y: f64) -> ExamplePoint {
    ExamplePoint::new(x, y)
}

#[test]
fn test_parse_example_point() {
    let p: ExamplePoint = "10, 20.5".parse().unwrap();
    assert_eq!(p, ExamplePoint::new(10.0, 20.5));
    let p: ExamplePoint = "1,2,TD".parse().unwrap();
    assert_eq!(p.tag.as_deref(), Some("td"));
    assert!("1".parse::<ExamplePoint>().is_err());
    assert!("1,2,td,x".parse::<ExamplePoint>().is_err());
}

#[test]
fn test_ten_row_table_yields_ten_records() {
    let (b, cells) = table(10, |_| 3);
    let result = PatternGeneralizer::default()
        .generalize_snapshot(&b.build(), &[point(100.0, 15.0), point(100.0, 75.0)], &[])
        .unwrap();

    let template = result.template.as_ref().unwrap();
    assert_eq!(template.strategy, TemplateStrategy::Structural);
    assert_eq!(
        template.xpath.as_deref(),
        Some("/html[1]/body[1]/table[1]/tr[x]/td[1]")
    );
    assert_eq!(result.columns.len(), 1);

    let column = &result.columns[0];
    assert_eq!(column.len(), 10);
    let boxes: HashSet<String> = column.iter().map(|s| format!("{:?}", s.bbox)).collect();
    assert_eq!(boxes.len(), 10);
    for (row, segment) in column.iter().enumerate() {
        assert_eq!(segment.index, row);
        assert_eq!(segment.text, format!("r{}c0", row));
        assert_eq!(segment.element.map(|e| e.node), Some(cells[row][0]));
    }
}

#[test]
fn test_third_point_adds_column_with_placeholders() {
    let (b, _) = table(10, |r| if r == 4 { 1 } else { 3 });
    let points = [point(100.0, 15.0), point(100.0, 75.0), point(300.0, 15.0)];
    let result = PatternGeneralizer::default()
        .generalize_snapshot(&b.build(), &points, &[])
        .unwrap();

    assert_eq!(result.columns.len(), 2);
    assert_eq!(result.row_count(), 10);
    let template = result.template.unwrap();
    assert_eq!(template.relative_paths, vec!["../td[2]".to_string()]);

    let second = &result.columns[1];
    assert_eq!(second.len(), 10);
    assert!(second[4].is_placeholder());
    assert_eq!(second[4].index, 4);
    assert_eq!(second[3].text, "r3c1");
    assert_eq!(second[9].text, "r9c1");
}

#[test]
fn test_tag_climbs_to_row() {
    let (b, _) = table(10, |_| 2);
    let points = [point(100.0, 15.0).with_tag("tr"), point(300.0, 45.0).with_tag("tr")];
    let result = PatternGeneralizer::default()
        .generalize_snapshot(&b.build(), &points, &[])
        .unwrap();

    assert_eq!(
        result.template.unwrap().xpath.as_deref(),
        Some("/html[1]/body[1]/table[1]/tr[x]")
    );
    assert_eq!(result.columns[0].len(), 10);
    assert_eq!(result.columns[0][0].text, "r0c0 r0c1");
}

#[test]
fn test_single_class_outlier_is_pruned() {
    let (mut b, cells) = table(10, |_| 1);
    b.attr(cells[5][0], "class", "highlight");
    let result = PatternGeneralizer::default()
        .generalize_snapshot(&b.build(), &[point(100.0, 15.0), point(100.0, 75.0)], &[])
        .unwrap();

    let texts: Vec<&str> = result.columns[0].iter().map(|s| s.text.as_str()).collect();
    assert_eq!(texts.len(), 9);
    assert!(!texts.contains(&"r5c0"));
}

#[test]
fn test_outlier_kept_when_pruning_would_leave_too_few_rows() {
    let seeds = [point(100.0, 15.0), point(100.0, 45.0)];

    let (mut b, cells) = table(3, |_| 1);
    b.attr(cells[2][0], "class", "highlight");
    let result = PatternGeneralizer::default()
        .generalize_snapshot(&b.build(), &seeds, &[])
        .unwrap();
    assert_eq!(result.template.unwrap().strategy, TemplateStrategy::Structural);
    let texts: Vec<&str> = result.columns[0].iter().map(|s| s.text.as_str()).collect();
    assert_eq!(texts, vec!["r0c0", "r1c0", "r2c0"]);

    let (mut b, cells) = table(4, |_| 1);
    b.attr(cells[2][0], "class", "highlight");
    let result = PatternGeneralizer::default()
        .generalize_snapshot(&b.build(), &seeds, &[])
        .unwrap();
    let texts: Vec<&str> = result.columns[0].iter().map(|s| s.text.as_str()).collect();
    assert_eq!(texts, vec!["r0c0", "r1c0", "r3c0"]);
}

#[test]
fn test_falls_back_to_attributes() {
    let mut b = DomBuilder::new(800.0, 600.0);
    let section = b.el(1, "section", (0.0, 0.0, 400.0, 100.0));
    let wrap = b.el(1, "div", (0.0, 200.0, 400.0, 200.0));
    b.attr(wrap, "class", "wrap");
    fn price(b: &mut DomBuilder, parent: usize, y: f64, width: f64, class: &str, text: &str) {
        let span = b.el(parent, "span", (0.0, y, width, 20.0));
        b.attr(span, "class", class);
        b.text(span, text);
    }
    price(&mut b, section, 10.0, 100.0, "price", "$1");
    price(&mut b, wrap, 210.0, 100.0, "price", "$2");
    price(&mut b, wrap, 250.0, 100.0, "price", "$3");
    price(&mut b, wrap, 300.0, 100.0, "other", "x");
    price(&mut b, wrap, 350.0, 150.0, "price", "$4");

    let result = PatternGeneralizer::default()
        .generalize_snapshot(&b.build(), &[point(50.0, 20.0), point(50.0, 220.0)], &[])
        .unwrap();

    let template = result.template.as_ref().unwrap();
    assert_eq!(template.strategy, TemplateStrategy::Attribute);
    assert_eq!(template.selector.as_deref(), Some("span.price"));
    assert!(!template.properties.contains(&Property::Parent));
    let texts: Vec<&str> = result.columns[0].iter().map(|s| s.text.as_str()).collect();
    assert_eq!(texts, vec!["$1", "$2", "$3"]);
}

#[test]
fn test_explicit_properties_force_attributes() {
    let (b, _) = table(10, |_| 3);
    let result = PatternGeneralizer::default()
        .generalize_snapshot(
            &b.build(),
            &[point(100.0, 15.0), point(100.0, 75.0)],
            &[Property::Tag, Property::X],
        )
        .unwrap();

    let template = result.template.unwrap();
    assert_eq!(template.strategy, TemplateStrategy::Attribute);
    assert_eq!(template.selector.as_deref(), Some("td"));
    assert_eq!(template.properties, vec![Property::Tag, Property::X]);
    assert_eq!(result.columns[0].len(), 10);
}

#[test]
fn test_unresolved_point_yields_empty_result() {
    let (b, _) = table(3, |_| 1);
    let result = PatternGeneralizer::default()
        .generalize_snapshot(&b.build(), &[point(100.0, 15.0), point(5000.0, 5000.0)], &[])
        .unwrap();
    assert!(result.is_empty());
    assert!(result.template.is_none());
}

#[test]
fn test_needs_two_points() {
    let (b, _) = table(3, |_| 1);
    let err = PatternGeneralizer::default()
        .generalize_snapshot(&b.build(), &[point(100.0, 15.0)], &[])
        .unwrap_err();
    assert!(matches!(err, PerceptionError::InvalidInput(_)));
}

#[tokio::test]
async fn test_generalize_captures_page() {
    let (b, _) = table(5, |_| 2);
    let page = FakePage::new("p").with_snapshot(&b.build());
    let result = PatternGeneralizer::default()
        .generalize(&page, &[point(300.0, 15.0), point(300.0, 45.0)], &[])
        .await
        .unwrap();
    let texts: Vec<&str> = result.columns[0].iter().map(|s| s.text.as_str()).collect();
    assert_eq!(texts, vec!["r0c1", "r1c1", "r2c1", "r3c1", "r4c1"]);
}
