use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::{json, Value};

// Run with:
//    cargo bench --bench fingerprint_bench

/// A payload shaped like a typical feed source: a few scalars and a list of entries.
fn feed_payload(entries: usize) -> Value {
    let items: Vec<Value> = (0..entries)
        .map(|i| {
            json!({
                "title": format!("Headline number {}", i),
                "url": format!("https://news.example/{}", i),
                "score": i * 7,
                "tags": ["world", "tech"],
            })
        })
        .collect();
    json!({ "source": "news", "updated": "2024-05-01T07:00:00Z", "items": items })
}

fn bench_fingerprint(c: &mut Criterion) {
    let small = json!({ "text": "sunny", "temp": 21, "city": "Oslo" });
    let large = feed_payload(200);

    c.bench_function("fingerprint_small", |b| b.iter(|| inkframe::fingerprint::fingerprint(black_box(&small))));
    c.bench_function("fingerprint_feed_200", |b| b.iter(|| inkframe::fingerprint::fingerprint(black_box(&large))));
}

fn bench_template_render(c: &mut Criterion) {
    use inkframe::{JinjaEngine, TemplateEngine};

    let engine = JinjaEngine::new();
    let template = "<html><body><h1>{{ data.title }}</h1><p>{{ data.body }}</p><footer>{{ source }}</footer></body></html>";
    let ctx = json!({ "data": { "title": "Morning <brief>", "body": "Rain & wind" }, "source": "news" });

    c.bench_function("template_render", |b| b.iter(|| engine.render(black_box(template), &ctx).unwrap()));
}

criterion_group!(benches, bench_fingerprint, bench_template_render);
criterion_main!(benches);
