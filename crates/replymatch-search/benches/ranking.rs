use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use replymatch_core::config::EngineConfig;
use replymatch_core::corpus::parse_corpus;
use replymatch_core::model::EntryDraft;
use replymatch_search::{Corpus, QualityScorer, RankOptions, RankingEngine};

const QUERIES: &[&str] = &[
    "fire safety standards",
    "how much pm2",
    "what is the r-value of closed cell spray foam insulation in melbourne",
    "is it safe for my dog",
    "warranty period",
];

/// The fixture corpus repeated `copies` times with distinct ids.
fn synthetic_drafts(copies: usize) -> Vec<EntryDraft> {
    let base = parse_corpus("bench", include_str!("../tests/fixtures/corpus.json"))
        .map(|loaded| loaded.drafts)
        .unwrap_or_default();

    (0..copies)
        .flat_map(|copy| {
            base.iter().cloned().map(move |mut draft| {
                draft.source_id = format!("{}-{copy}", draft.source_id);
                draft.answer_text = format!("{} Reference {copy}.", draft.answer_text);
                draft
            })
        })
        .collect()
}

fn bench_ranking(c: &mut Criterion) {
    let mut group = c.benchmark_group("ranking.rank");
    let quality = QualityScorer::default();

    for copies in [10_usize, 100, 500] {
        let corpus = Corpus::from_drafts(synthetic_drafts(copies), &quality);
        let Ok(engine) = RankingEngine::new(&corpus, EngineConfig::default()) else {
            continue;
        };
        group.throughput(Throughput::Elements(corpus.len() as u64));

        group.bench_with_input(BenchmarkId::new("best", corpus.len()), &engine, |b, engine| {
            b.iter(|| {
                for query in QUERIES {
                    black_box(engine.rank(query));
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("top5", corpus.len()), &engine, |b, engine| {
            b.iter(|| black_box(engine.rank_top(QUERIES[2], &RankOptions::default())));
        });
    }

    group.finish();
}

fn bench_index(c: &mut Criterion) {
    let quality = QualityScorer::default();
    let corpus = Corpus::from_drafts(synthetic_drafts(100), &quality);
    c.bench_function("ranking.index_600", |b| {
        b.iter(|| black_box(RankingEngine::new(&corpus, EngineConfig::default()).is_ok()));
    });
}

criterion_group!(benches, bench_ranking, bench_index);
criterion_main!(benches);
