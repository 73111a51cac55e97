use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};
use structdiff::mutation::{Mutation, PatchOp};
use structdiff::schema::{Field, Schema, SchemaType};
use structdiff::timeline::Transaction;

pub const DOC_ID: &str = "post-1";
pub const DRAFT_ID: &str = "drafts.post-1";

/// Fixed origin so chunk grouping is deterministic.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

pub fn minutes(n: i64) -> DateTime<Utc> {
    t0() + Duration::minutes(n)
}

// ── Portable text ─────────────────────────────────────────────────────────

pub fn span(key: &str, text: &str, marks: &[&str]) -> Value {
    json!({"_type": "span", "_key": key, "text": text, "marks": marks})
}

pub fn block(key: &str, children: Vec<Value>) -> Value {
    block_with_defs(key, children, vec![])
}

pub fn block_with_defs(key: &str, children: Vec<Value>, mark_defs: Vec<Value>) -> Value {
    json!({
        "_type": "block",
        "_key": key,
        "style": "normal",
        "markDefs": mark_defs,
        "children": children,
    })
}

pub fn link(key: &str, href: &str) -> Value {
    json!({"_type": "link", "_key": key, "href": href})
}

/// `post` with a title, a portable-text body and a tag list.
pub fn post_schema() -> Schema {
    let body = SchemaType::array(vec![SchemaType::block(
        vec!["strong".to_string(), "em".to_string()],
        vec![SchemaType::object("link", vec![Field::new("href", SchemaType::string())])],
        vec![SchemaType::object("mention", vec![Field::new("user", SchemaType::string())])],
    )]);
    let post = SchemaType::object(
        "post",
        vec![
            Field::new("title", SchemaType::string()).with_title("Title"),
            Field::new("views", SchemaType::number()).with_title("Views"),
            Field::new("body", body).with_title("Body"),
            Field::new("tags", SchemaType::array(vec![SchemaType::string()])).with_title("Tags"),
        ],
    )
    .with_title("Post");
    let mut schema = Schema::new();
    schema.register(post);
    schema
}

// ── History ───────────────────────────────────────────────────────────────

pub fn create(id: &str, at: DateTime<Utc>, author: &str, title: &str) -> Transaction {
    Transaction::new(
        id,
        at,
        author,
        vec![Mutation::Create(json!({"_id": DRAFT_ID, "_type": "post", "title": title}))],
    )
}

pub fn set_field(id: &str, at: DateTime<Utc>, author: &str, field: &str, value: Value) -> Transaction {
    Transaction::new(
        id,
        at,
        author,
        vec![Mutation::patch(
            DRAFT_ID,
            vec![PatchOp::set(field.parse().unwrap(), value)],
        )],
    )
}

pub fn set_title(id: &str, at: DateTime<Utc>, author: &str, title: &str) -> Transaction {
    set_field(id, at, author, "title", json!(title))
}

/// Publish the draft as it stands after `title` was written to it.
pub fn publish(id: &str, at: DateTime<Utc>, author: &str, title: &str) -> Transaction {
    Transaction::new(
        id,
        at,
        author,
        vec![
            Mutation::CreateOrReplace(json!({"_id": DOC_ID, "_type": "post", "title": title})),
            Mutation::Delete {
                id: DRAFT_ID.to_string(),
            },
        ],
    )
}

/// Start a new draft on top of a published document.
pub fn redraft(id: &str, at: DateTime<Utc>, author: &str, title: &str) -> Transaction {
    Transaction::new(
        id,
        at,
        author,
        vec![Mutation::CreateIfNotExists(
            json!({"_id": DRAFT_ID, "_type": "post", "title": title}),
        )],
    )
}

/// A history of `count` edits, one per author turn so no two merge.
pub fn alternating_edits(count: usize) -> Vec<Transaction> {
    let mut txs = vec![create("r0", minutes(0), "ana", "v0")];
    for i in 1..count {
        let author = if i % 2 == 0 { "ana" } else { "bo" };
        txs.push(set_title(&format!("r{i}"), minutes(i as i64), author, &format!("v{i}")));
    }
    txs
}
