use chrono::NaiveDate;
use common::mapper::{MapperSession, Msg, NoPointResolver, ScreenPoint, Selection};
use common::model::mapping::{InteractionType, TemplateFieldMapping};
use common::populate::{format_date, Populator};
use pretty_assertions::assert_eq;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

const POINT: ScreenPoint = ScreenPoint { x: 0.0, y: 0.0 };

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
}

fn client(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

#[test]
fn greeting_uses_computed_name_and_date() {
    let populated = Populator::default().on(today()).populate(
        "Dear {{full_name}}, today is {{current_date}}.",
        &TemplateFieldMapping::new(),
        &client(json!({"first_name": "Jane", "last_name": "Doe"})),
        &HashMap::new(),
    );
    assert_eq!(
        populated.html,
        format!("Dear Jane Doe, today is {}.", format_date(today()))
    );
    assert_eq!(populated.html, "Dear Jane Doe, today is October 16, 2026.");
    assert!(populated.unresolved.is_empty());
}

#[test]
fn unknown_token_is_marked_missing() {
    let populated = Populator::default().on(today()).populate(
        "<p>Ref: {{missing_token}}</p>",
        &TemplateFieldMapping::new(),
        &client(json!({"first_name": "Jane", "email": "jane@example.com"})),
        &HashMap::new(),
    );
    assert!(populated.html.contains("[MISSING: MISSING_TOKEN]"));
    assert_eq!(populated.unresolved, vec!["missing_token".to_string()]);
}

#[test]
fn mapped_markers_populate_without_leftovers() {
    let mut session = MapperSession::new(
        "<p>Dear CLIENT NAME,</p><p>Trust: {{trust}}</p>",
        TemplateFieldMapping::from([("trust".to_string(), "trust_name".to_string())]),
    );
    session.update(
        Msg::PointerUp {
            selection: Selection::range(5, 16),
            point: POINT,
        },
        &NoPointResolver,
    );
    session.update(Msg::FieldChosen("full_name".into()), &NoPointResolver);
    assert_eq!(session.instances[0].interaction_type, InteractionType::Highlight);

    let (html, mapping) = session.commit();
    let populated = Populator::default().on(today()).populate(
        &html,
        &mapping,
        &client(json!({
            "first_name": "Jane",
            "last_name": "Doe",
            "trust_name": "Doe Family Trust",
        })),
        &HashMap::new(),
    );
    assert_eq!(
        populated.html,
        "<p>Dear Jane Doe,</p><p>Trust: Doe Family Trust</p>"
    );
    assert!(!populated.html.contains("{{"));
    assert!(!populated.html.contains("[MISSING:"));
}

#[test]
fn non_ascii_text_positions_follow_utf16_offsets() {
    // "Señora 😀 NAME": the emoji is two UTF-16 units, four bytes.
    let mut session = MapperSession::new("<p>Señora 😀 NAME</p>", TemplateFieldMapping::new());
    session.update(
        Msg::PointerUp {
            selection: Selection::range(10, 14),
            point: POINT,
        },
        &NoPointResolver,
    );
    session.update(Msg::FieldChosen("last_name".into()), &NoPointResolver);
    assert_eq!(session.document.text(), "Señora 😀 {{last_name}}");
    assert_eq!(session.instances[0].original_text, "NAME");

    // The caret rests right after the marker, in the surface's units.
    let utf16_len = session.document.text().encode_utf16().count();
    assert_eq!(utf16_len, 23);
    assert_eq!(session.caret, Some(utf16_len));
    let layout = session.marker_layout();
    assert_eq!((layout[0].start, layout[0].end), (10, 23));

    // Inside the marker the caret snaps to the nearer edge.
    session.update(Msg::CaretMoved(12), &NoPointResolver);
    assert_eq!(session.caret, Some(10));
    session.update(Msg::CaretMoved(20), &NoPointResolver);
    assert_eq!(session.caret, Some(23));
}

#[test]
fn nested_markers_are_flattened_on_load() {
    let html = concat!(
        r#"<p><span class="field-placeholder" data-field="email" data-instance-id="outer">"#,
        r#"<span class="field-placeholder" data-field="phone" data-instance-id="inner">{{phone}}</span>"#,
        r#"</span> end</p>"#
    );
    let session = MapperSession::new(html, TemplateFieldMapping::new());
    assert_eq!(session.instances.len(), 1);
    assert_eq!(session.instances[0].instance_id, "outer");
    assert_eq!(session.document.text(), "{{email}} end");
}

#[test]
fn saved_markers_round_trip_through_a_new_session() {
    let mut session = MapperSession::new("<p>Hello world</p>", TemplateFieldMapping::new());
    session.update(
        Msg::PointerUp {
            selection: Selection::caret(5),
            point: POINT,
        },
        &NoPointResolver,
    );
    session.update(Msg::FieldChosen("email".into()), &NoPointResolver);
    let (html, _) = session.commit();

    let reloaded = MapperSession::new(&html, TemplateFieldMapping::new());
    assert_eq!(reloaded.instances, session.instances);
    assert_eq!(reloaded.document.to_html(), html);
}
