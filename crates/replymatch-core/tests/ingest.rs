use replymatch_core::config::{EngineConfig, load_config};
use replymatch_core::corpus::load_corpus;
use replymatch_core::model::CorpusEntry;
use replymatch_core::normalize::Normalizer;
use std::fs;

#[test]
fn jsonl_corpus_builds_entries_with_generated_ids() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("pricing.jsonl");
    fs::write(
        &path,
        concat!(
            "{\"category\":\"Cost & Pricing\",\"subtopic\":\"Per m2\",\"keywords\":\"pm2, cost\",\"answer\":\"Contact us for a quote.\"}\n",
            "{\"category\":\"Cost & Pricing\",\"answer\":\"   \"}\n",
            "{\"category\":\"Cost & Pricing\",\"response_text\":\"Pricing depends on thickness.\",\"source\":\"crm-12\"}\n",
        ),
    )
    .expect("write");

    let loaded = load_corpus(&path).expect("load");
    assert_eq!(loaded.report.total, 3);
    assert_eq!(loaded.report.skipped, 1);

    let entries: Vec<CorpusEntry> = loaded
        .drafts
        .into_iter()
        .map(|draft| CorpusEntry::new(draft, 40.0).expect("entry"))
        .collect();
    assert_eq!(entries[0].source_id(), "pricing:0");
    assert_eq!(entries[0].keywords(), ["pm2", "cost"]);
    assert_eq!(entries[1].source_id(), "crm-12");
    assert_eq!(entries[1].answer_text(), "Pricing depends on thickness.");
}

#[test]
fn config_file_can_replace_normalizer_rules() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("replymatch.toml");
    fs::write(
        &path,
        r#"
[[normalizer.rules]]
pattern = '\bpir\b'
expansion = "polyisocyanurate board"
"#,
    )
    .expect("write");

    let config: EngineConfig = load_config(&path).expect("config");
    assert_eq!(config.normalizer.rules.len(), 1);

    let normalizer = Normalizer::new(&config.normalizer).expect("compile");
    assert_eq!(
        normalizer.normalize("PIR panels"),
        "pir panels polyisocyanurate board"
    );
}

#[test]
fn invalid_weights_in_file_fail_validation() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("replymatch.toml");
    fs::write(
        &path,
        "[fusion.short]\ntoken_set = 0.9\npartial = 0.9\ntoken_sort = 0.1\nratio = 0.1\n",
    )
    .expect("write");

    let err = load_config(&path).expect_err("weights do not sum to one");
    assert_eq!(err.error_code().code(), "E1003");
}
