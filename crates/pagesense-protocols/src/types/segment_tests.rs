use super::*;

fn link_segment() -> Segment {
    Segment {
        index: 3,
        tag: "A".to_string(),
        label: Some(Label::Link),
        bbox: BoundingBox::new(10.0, 20.0, 100.0, 18.0),
        text: "Docs".to_string(),
        element_id: "nav-docs".to_string(),
        class_name: "nav-link".to_string(),
        clickable: true,
        href: Some("/docs".to_string()),
        ..Default::default()
    }
}

#[test]
fn test_serialize_produced_interface() {
    let json = serde_json::to_value(link_segment()).unwrap();
    assert_eq!(json["id"], "nav-docs");
    assert_eq!(json["class"], "nav-link");
    assert_eq!(json["index"], 3);
    assert_eq!(json["tagName"], "A");
    assert_eq!(json["label"], "Link");
    assert_eq!(json["x"], 10.0);
    assert_eq!(json["height"], 18.0);
    assert_eq!(json["interactivity"], serde_json::json!(["clickable", "non-trigger"]));
    assert_eq!(json["isIframe"], false);
    assert!(json["iframePosition"].is_null());
    assert_eq!(json["href"], "/docs");
    assert!(json.get("src").is_none());
    assert!(json.get("options").is_none());
    assert!(json.get("inputType").is_none());
}

#[test]
fn test_serialize_select_options_and_iframe() {
    let seg = Segment {
        tag: "SELECT".to_string(),
        label: Some(Label::Select),
        input_type: Some("select".to_string()),
        select_options: vec!["One".to_string(), "Two".to_string()],
        is_in_iframe: true,
        iframe_offset: Some(Point::new(5.0, 40.0)),
        ..Default::default()
    };
    let json = serde_json::to_value(seg).unwrap();
    assert_eq!(json["options"], serde_json::json!(["One", "Two"]));
    assert_eq!(json["inputType"], "select");
    assert_eq!(json["iframePosition"]["y"], 40.0);
}

#[test]
fn test_label_name_falls_back_to_tag() {
    let seg = Segment {
        tag: "SECTION".to_string(),
        ..Default::default()
    };
    assert_eq!(seg.label_name(), "section");
}

#[test]
fn test_placeholder() {
    let seg = Segment::placeholder(7);
    assert!(seg.is_placeholder());
    assert_eq!(seg.index, 7);
    assert!(!link_segment().is_placeholder());
}

#[test]
fn test_duplicate_key_ignores_geometry() {
    let a = link_segment();
    let mut b = link_segment();
    b.bbox = BoundingBox::new(10.0, 60.0, 100.0, 18.0);
    b.index = 4;
    assert_eq!(a.duplicate_key(), b.duplicate_key());
}
