mod common;

use std::collections::BTreeSet;

use chrono::{TimeZone, Utc};
use common::fixtures::{block, post_schema, span};
use proptest::prelude::*;
use serde_json::{json, Map, Value};
use structdiff::change_list::{build_change_list, revert_all, ChangeNode};
use structdiff::diff::{diff, diff_document, diff_values, Annotation, Diff, DiffAction, DiffOptions, SegmentAction};
use structdiff::mutation::apply_ops;
use structdiff::{Path, PathSegment};

fn field<'a>(d: &'a Diff, name: &str) -> &'a Diff {
    d.as_object().unwrap().fields.get(name).unwrap()
}

// ── Scenarios ─────────────────────────────────────────────────────────────

#[test]
fn title_edit_produces_string_segments() {
    let d = diff_values(&json!({"title": "Hello world"}), &json!({"title": "Hello there"}));
    assert_eq!(d.action(), DiffAction::Changed);
    let title = field(&d, "title").as_string().unwrap();
    assert_eq!(title.from_text(), "Hello world");
    assert_eq!(title.to_text(), "Hello there");
    assert_eq!(title.segments[0].action, SegmentAction::Unchanged);
    assert!(title.segments[0].text.starts_with("Hello "));
    assert!(title.segments.iter().any(|s| s.action == SegmentAction::Added));
    assert!(title.segments.iter().any(|s| s.action == SegmentAction::Removed));
}

#[test]
fn keyed_rotation_is_only_moves() {
    let a = json!({"_key": "a", "n": 1});
    let b = json!({"_key": "b", "n": 2});
    let c = json!({"_key": "c", "n": 3});
    let d = diff_values(&json!([a, b, c]), &json!([c, a, b]));
    let arr = d.as_array().unwrap();
    assert_eq!(arr.items.len(), 3);
    assert!(arr.items.iter().all(|i| i.diff.action() == DiffAction::Unchanged));
    assert!(arr.items.iter().all(|i| i.has_moved));
    assert_eq!(arr.action, DiffAction::Changed);
    assert_eq!(arr.collect_to_values(), vec![c.clone(), a.clone(), b.clone()]);
    assert_eq!(arr.collect_from_values(), vec![a, b, c]);
}

#[test]
fn removed_item_keeps_its_former_index() {
    let d = diff_values(
        &json!([{"_key": "a"}, {"_key": "b"}, {"_key": "c"}]),
        &json!([{"_key": "a"}, {"_key": "c"}]),
    );
    let arr = d.as_array().unwrap();
    let removed = arr.items.iter().find(|i| i.diff.action() == DiffAction::Removed).unwrap();
    assert_eq!(removed.from_index, Some(1));
    assert_eq!(removed.to_index, None);
    assert_eq!(removed.path_segment(), PathSegment::keyed("b"));
    let keys: Vec<_> = arr.items.iter().map(|i| i.path_segment()).collect();
    assert_eq!(
        keys,
        vec![PathSegment::keyed("a"), PathSegment::keyed("b"), PathSegment::keyed("c")]
    );
}

#[test]
fn navigation_by_keyed_path() {
    let from = json!({"body": [block("b1", vec![span("s1", "one", &[])])]});
    let to = json!({"body": [block("b1", vec![span("s1", "one!", &[])])]});
    let d = diff_values(&from, &to);
    let path: Path = r#"body[_key=="b1"].children[_key=="s1"].text"#.parse().unwrap();
    let text = d.get(&path).unwrap().as_string().unwrap();
    assert_eq!(text.to_text(), "one!");
    assert!(d.get(&"body[3]".parse::<Path>().unwrap()).is_none());
}

#[test]
fn added_and_removed_documents() {
    let doc = json!({"title": "x"});
    let options = DiffOptions::new();
    assert_eq!(diff(None, Some(&doc), None, &options).action(), DiffAction::Added);
    assert_eq!(diff(Some(&doc), None, None, &options).action(), DiffAction::Removed);
    let added = diff(None, Some(&doc), None, &options);
    assert_eq!(field(&added, "title").action(), DiffAction::Added);
}

#[test]
fn integer_and_float_forms_are_equal() {
    let d = diff_values(&json!({"n": 1}), &json!({"n": 1.0}));
    assert!(!d.is_changed());
}

#[test]
fn annotation_attributes_changed_nodes() {
    let annotation = Annotation::new("ana", Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()).with_chunk("r7");
    let options = DiffOptions::new().with_annotation(annotation.clone());
    let from = json!({"title": "a", "views": 1});
    let to = json!({"title": "b", "views": 1});
    let d = diff(Some(&from), Some(&to), None, &options);
    assert_eq!(d.annotation(), Some(&annotation));
    assert_eq!(field(&d, "title").annotation(), Some(&annotation));
    assert_eq!(field(&d, "views").annotation(), None);
}

#[test]
fn document_diff_reconciles_body_blocks() {
    let schema = post_schema();
    let from = json!({"_type": "post", "title": "t", "body": [block("b1", vec![span("s1", "plain", &[])])]});
    let to = json!({"_type": "post", "title": "t", "body": [block("b1", vec![span("s1", "plain", &["strong"])])]});
    let doc = diff_document(Some(&from), Some(&to), None, &DiffOptions::new().with_schema(&schema));
    assert!(doc.is_changed());
    let path: Path = r#"body[_key=="b1"]"#.parse().unwrap();
    let block = doc.block(&path).unwrap();
    assert!(block.marks_only);
    assert_eq!(block.changed_runs().count(), 1);
    let out = serde_json::to_value(&doc).unwrap();
    assert_eq!(out["root"]["type"], "object");
    assert_eq!(out["blocks"][0]["path"], json!(["body", {"_key": "b1"}]));
}

#[test]
fn removed_unkeyed_block_is_reconciled_on_its_own() {
    let unkeyed = |text: &str| {
        json!({"_type": "block", "markDefs": [], "children": [
            {"_type": "span", "_key": "s", "text": text, "marks": []}
        ]})
    };
    let divider = json!({"_key": "A", "_type": "divider"});
    let from = json!({"body": [unkeyed("zero"), unkeyed("one"), divider.clone()]});
    let to = json!({"body": [divider, unkeyed("zero!")]});
    let doc = diff_document(Some(&from), Some(&to), None, &DiffOptions::new());
    assert_eq!(doc.blocks.len(), 2);

    let removed = doc
        .blocks
        .iter()
        .find(|b| b.diff.action == DiffAction::Removed)
        .unwrap();
    assert_eq!(removed.diff.diff.from_value.as_ref().unwrap()["children"][0]["text"], "one");
    let changed = doc
        .blocks
        .iter()
        .find(|b| b.diff.action == DiffAction::Changed)
        .unwrap();
    assert_eq!(changed.diff.diff.to_value.as_ref().unwrap()["children"][0]["text"], "zero!");
}

#[test]
fn change_list_reverts_to_the_old_document() {
    let schema = post_schema();
    let post = schema.get("post");
    let from = json!({
        "_type": "post",
        "title": "Old",
        "views": 3,
        "tags": ["a", "b"],
    });
    let to = json!({
        "_type": "post",
        "title": "New",
        "tags": ["a", "b", "c"],
        "extra": true,
    });
    let d = diff(Some(&from), Some(&to), post, &DiffOptions::new());
    let changes = build_change_list(&d, post);
    let titles: BTreeSet<&str> = changes.iter().map(ChangeNode::title).collect();
    assert!(titles.contains("Title"));
    assert!(titles.contains("Views"));
    assert!(titles.contains("Tags"));

    let reverted = apply_ops(&to, &revert_all(&changes)).unwrap();
    assert_eq!(reverted, from);
}

// ── Laws ──────────────────────────────────────────────────────────────────

fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-50i64..50).prop_map(Value::from),
        "[a-d ]{0,6}".prop_map(Value::String),
    ]
}

fn json_value() -> impl Strategy<Value = Value> {
    leaf().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-e]", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

/// Objects whose arrays mix keyed items, duplicate keys and unkeyed items.
fn json_document() -> impl Strategy<Value = Value> {
    let value = leaf().prop_recursive(3, 32, 5, |inner| {
        let keyed = ("[a-c]", inner.clone()).prop_map(|(k, v)| json!({"_key": k, "v": v}));
        prop_oneof![
            prop::collection::vec(prop_oneof![inner.clone(), keyed], 0..5).prop_map(Value::Array),
            prop::collection::btree_map("[a-e]", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<_, _>>())),
        ]
    });
    prop::collection::btree_map("[a-e]", value, 0..5)
        .prop_map(|m| Value::Object(m.into_iter().collect::<Map<_, _>>()))
}

#[derive(Clone, Copy)]
enum Side {
    From,
    To,
}

/// Rebuild one side of a diff from its children alone.
fn rebuild(d: &Diff, side: Side) -> Option<Value> {
    let present = match side {
        Side::From => d.from_value(),
        Side::To => d.to_value(),
    }?;
    Some(match d {
        Diff::Object(obj) => Value::Object(
            obj.fields
                .iter()
                .filter_map(|(name, field)| Some((name.clone(), rebuild(field, side)?)))
                .collect(),
        ),
        Diff::Array(arr) => {
            let mut items: Vec<(usize, Value)> = arr
                .items
                .iter()
                .filter_map(|item| {
                    let index = match side {
                        Side::From => item.from_index,
                        Side::To => item.to_index,
                    }?;
                    Some((index, rebuild(&item.diff, side)?))
                })
                .collect();
            items.sort_by_key(|(index, _)| *index);
            Value::Array(items.into_iter().map(|(_, v)| v).collect())
        }
        Diff::String(s) => Value::String(match side {
            Side::From => s.from_text(),
            Side::To => s.to_text(),
        }),
        _ => present.clone(),
    })
}

fn keyed_items() -> impl Strategy<Value = Vec<Value>> {
    prop::collection::btree_map("[a-h]", 0i64..3, 0..6).prop_flat_map(|m| {
        let items: Vec<Value> = m.into_iter().map(|(k, n)| json!({"_key": k, "n": n})).collect();
        Just(items).prop_shuffle()
    })
}

proptest! {
    #[test]
    fn identical_values_are_unchanged(v in json_value()) {
        let d = diff_values(&v, &v);
        prop_assert!(!d.is_changed());
        prop_assert_eq!(d.action(), DiffAction::Unchanged);
    }

    #[test]
    fn string_segments_rebuild_both_sides(a in "[a-c]{0,12}", b in "[a-c]{0,12}") {
        let d = diff_values(&json!(a), &json!(b));
        let s = d.as_string().unwrap();
        prop_assert_eq!(s.from_text(), a.clone());
        prop_assert_eq!(s.to_text(), b.clone());
        prop_assert_eq!(s.is_changed, a != b);
    }

    #[test]
    fn keyed_items_rebuild_both_sides(from in keyed_items(), to in keyed_items()) {
        let d = diff_values(&Value::Array(from.clone()), &Value::Array(to.clone()));
        let arr = d.as_array().unwrap();
        prop_assert_eq!(arr.collect_from_values(), from.clone());
        prop_assert_eq!(arr.collect_to_values(), to.clone());
        for item in &arr.items {
            prop_assert_eq!(item.has_moved, matches!((item.from_index, item.to_index), (Some(i), Some(j)) if i != j));
        }
    }

    #[test]
    fn both_sides_rebuild_from_the_tree(a in json_document(), b in json_document()) {
        let d = diff_values(&a, &b);
        prop_assert_eq!(rebuild(&d, Side::From), Some(a.clone()));
        prop_assert_eq!(rebuild(&d, Side::To), Some(b.clone()));
    }

    #[test]
    fn object_fields_cover_both_key_sets(a in json_value(), b in json_value()) {
        let from = json!({"x": a});
        let to = json!({"y": b});
        let d = diff_values(&from, &to);
        let fields = &d.as_object().unwrap().fields;
        prop_assert_eq!(fields.len(), 2);
        prop_assert_eq!(fields["x"].action(), DiffAction::Removed);
        prop_assert_eq!(fields["y"].action(), DiffAction::Added);
    }
}
