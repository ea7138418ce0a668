use serde_json::{json, Value};
use termspread::config::FieldSpecs;
use termspread::{Analysis, DocumentSource, Fields, MemoryStore, TermPredicate};

const SCOPE: &str = "scenario";

fn fields(v: Value) -> Fields {
    match v {
        Value::Object(m) => m,
        _ => panic!("fields must be an object"),
    }
}

fn specs(v: Value) -> FieldSpecs {
    serde_json::from_value(v).unwrap()
}

fn single_field_store() -> MemoryStore {
    let store = MemoryStore::new();
    store.text_index(SCOPE, &specs(json!({ "title": true })));
    store.insert(SCOPE, "item1", fields(json!({ "title": "n n z c c c d d d dddd" })));
    store.insert(SCOPE, "item2", fields(json!({ "title": "n n m c c d dddd doodle" })));
    store.insert(SCOPE, "item3", fields(json!({ "title": "n n z m m c d d d donkey" })));
    store
}

fn two_field_store() -> MemoryStore {
    let store = MemoryStore::new();
    store.text_index(SCOPE, &specs(json!({ "title": { "weight": 2 }, "text": { "weight": 1 } })));
    store.insert(SCOPE, "item1", fields(json!({ "title": "c d d", "text": "n n z c c c d d d d d dddd" })));
    store.insert(SCOPE, "item2", fields(json!({ "title": "m m z", "text": "n n m c c d dddd doodle" })));
    store.insert(SCOPE, "item3", fields(json!({ "title": "d d d", "text": "n n z m m c d d d donkey" })));
    store
}

fn chain(a: &Analysis, term: &str, count: u32) -> Vec<String> {
    a.entry(term).unwrap().spread.chain(count).map(str::to_string).collect()
}

/// Deterministic filler text over a small vocabulary.
fn filler(seed: usize, words: usize) -> String {
    const VOCAB: &[&str] = &[
        "ophelia", "our", "outrageous", "orisons", "oppressor", "dane", "denmark",
        "dream", "rest", "rub", "rue", "sleep", "slings", "sea", "troubles", "to",
    ];
    (0..words)
        .map(|i| VOCAB[(seed * 7 + i * i * 3 + i) % VOCAB.len()])
        .collect::<Vec<_>>()
        .join(" ")
}

#[test]
fn unconfigured_scope_has_no_analysis() {
    let store = MemoryStore::new();
    store.insert(SCOPE, "item1", fields(json!({ "title": "n n z" })));
    assert!(store.text_analysis(SCOPE).is_none());
    assert!(store.dump_indices(SCOPE).is_none());
}

#[test]
fn single_field_buckets() {
    let a = single_field_store().text_analysis(SCOPE).unwrap();
    assert!(!a.terms().is_empty());
    assert_eq!(chain(&a, "c", 1), vec!["item3"]);
    assert_eq!(chain(&a, "c", 2), vec!["item2"]);
    assert_eq!(chain(&a, "c", 3), vec!["item1"]);
    assert_eq!(chain(&a, "m", 1), vec!["item2"]);
    assert_eq!(chain(&a, "m", 2), vec!["item3"]);
    assert_eq!(chain(&a, "z", 1), vec!["item1", "item3"]);
    assert_eq!(chain(&a, "d", 1), vec!["item2"]);
    assert_eq!(chain(&a, "d", 3), vec!["item1", "item3"]);
    assert_eq!(chain(&a, "n", 2), vec!["item1", "item2", "item3"]);
}

#[test]
fn two_weighted_fields() {
    let a = two_field_store().text_analysis(SCOPE).unwrap();
    assert_eq!(chain(&a, "c", 1), vec!["item3"]);
    assert_eq!(chain(&a, "c", 2), vec!["item2"]);
    assert_eq!(chain(&a, "c", 5), vec!["item1"]);
    assert_eq!(chain(&a, "m", 5), vec!["item2"]);
    assert_eq!(chain(&a, "m", 2), vec!["item3"]);
    assert_eq!(chain(&a, "z", 1), vec!["item1", "item3"]);
    assert_eq!(chain(&a, "z", 2), vec!["item2"]);
    assert_eq!(chain(&a, "d", 9), vec!["item1", "item3"]);
    assert_eq!(chain(&a, "d", 1), vec!["item2"]);
    assert_eq!(chain(&a, "n", 2), vec!["item1", "item2", "item3"]);
}

#[test]
fn scores_top_and_all() {
    let a = single_field_store().text_analysis(SCOPE).unwrap();
    assert_eq!(a.scores("d"), vec![3, 1]);
    assert_eq!(a.top("d"), Some("item1"));
    assert_eq!(a.all("m"), vec!["item2", "item3"]);
    assert_eq!(a.all("d"), vec!["item2", "item1", "item3"]);
    assert_eq!(a.top("asdfasddfasdf"), None);
}

#[test]
fn filter_and_serialize_feed_a_batch_fetch() {
    let store = single_field_store();
    let a = store.text_analysis(SCOPE).unwrap();
    let filtered = a.filter_by(|t| t.starts_with('d'));
    assert_eq!(filtered.keys().copied().collect::<Vec<_>>(), vec!["d", "dddd", "donkey", "doodle"]);
    assert_eq!(filtered["d"].sum, 7);
    assert_eq!(filtered["dddd"].sum, 2);

    let ids = a.serialize(&filtered);
    let pairs: usize = filtered.values().map(|e| e.spread.len()).sum();
    assert!(ids.len() < pairs);
    assert_eq!(ids, vec!["item2", "item1", "item3"]);
    assert_eq!(store.get_many(SCOPE, &ids).len(), 3);
}

#[test]
fn filter_with_bad_expression_is_empty() {
    let a = single_field_store().text_analysis(SCOPE).unwrap();
    assert!(a.filter(&TermPredicate::parse("asdf")).is_empty());
}

#[test]
fn highlight_top_document() {
    let store = single_field_store();
    let a = store.text_analysis(SCOPE).unwrap();
    let top = a.top("d").unwrap();
    let doc = store.get(SCOPE, top).unwrap();
    let out = a.highlight("d", doc.text("title").unwrap(), "<{{_}}>");
    assert_eq!(out, "n n z c c c <d> <d> <d> dddd");
}

#[test]
fn dump_indices_per_scope_and_all() {
    let store = MemoryStore::new();
    store.text_index("one", &specs(json!({ "title": { "weight": 2 }, "text": { "weight": 1 } })));
    store.text_index("two", &specs(json!({ "headings": { "weight": 2 } })));
    let one = serde_json::to_value(store.dump_indices("one")).unwrap();
    assert_eq!(one, json!({ "text": { "weight": 1 }, "title": { "weight": 2 } }));
    // the dump is a valid configuration for another scope
    store.text_index("copy", &specs(one));
    assert_eq!(store.dump_indices("copy"), store.dump_indices("one"));
    let all = store.dump_all_indices();
    assert_eq!(all.len(), 3);
    assert_eq!(all["two"].weight("headings"), Some(2));
    assert!(store.dump_indices("asdfasdf").is_none());
}

#[test]
fn repeated_configuration_merges_fields() {
    let store = MemoryStore::new();
    store.text_index(SCOPE, &specs(json!({ "title": true })));
    store.text_index(SCOPE, &specs(json!({ "text": true })));
    for n in 0..20 {
        store.insert(SCOPE, format!("doc{n}"), fields(json!({
            "title": filler(n, 40),
            "text": filler(n + 100, 40),
            "order": n,
        })));
    }
    let a = store.text_analysis(SCOPE).unwrap();
    let terms = a.terms();
    let sample = terms[0];
    let first = sample.chars().next().unwrap();
    let filtered = a.filter_by(move |t| t.starts_with(first));
    assert!(!filtered.is_empty());
    for term in filtered.keys() {
        assert!(term.starts_with(first));
        assert!(terms.contains(term));
    }
    // 20 documents × 2 fields × 40 tokens, all at weight 1
    let total: u64 = a.dump().values().map(|e| e.sum).sum();
    assert_eq!(total, 1600);
}

#[test]
fn bucket_invariants_hold_for_every_term() {
    let store = two_field_store();
    let a = store.text_analysis(SCOPE).unwrap();
    let docs = store.enumerate(SCOPE);
    let order: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
    for term in a.terms() {
        let entry = a.entry(term).unwrap();
        assert!(entry.sum > 0);
        assert_eq!(entry.spread.weighted_total(), entry.sum);

        let scores = a.scores(term);
        assert!(scores.windows(2).all(|w| w[0] > w[1]));

        for (_, chain) in entry.spread.iter() {
            let pos: Vec<usize> = chain.map(|id| order.iter().position(|o| *o == id).unwrap()).collect();
            assert!(pos.windows(2).all(|w| w[0] < w[1]));
        }

        let mut all = a.all(term);
        assert_eq!(a.top(term), entry.spread.chain(scores[0]).next());
        let last_bucket_len = entry.spread.chain(scores[0]).count();
        let split = all.len() - last_bucket_len;
        assert_eq!(all.split_off(split).first().copied(), a.top(term));
    }
}

#[test]
fn snapshots_are_independent_of_later_writes() {
    let store = single_field_store();
    let before = store.text_analysis(SCOPE).unwrap();
    store.insert(SCOPE, "item4", fields(json!({ "title": "d d d d" })));
    assert_eq!(before.top("d"), Some("item1"));
    let after = store.text_analysis(SCOPE).unwrap();
    assert_eq!(after.top("d"), Some("item4"));
    assert_ne!(before, after);
}
