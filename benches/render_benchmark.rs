use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use blog_bff::render::render_ssr;
use blog_bff::{assemble, scripts, RenderCache, Request};

const SHELL: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>placeholder</title>
<link rel="stylesheet" href="/assets/app.css">
</head>
<body>
<div id="app"></div>
<script type="module" src="/assets/client.js"></script>
</body>
</html>"#;

fn request_at(url: &str) -> Request {
    let raw = format!("GET {} HTTP/1.1\r\nHost: localhost:7878\r\n\r\n", url);
    Request::try_from(&raw.as_bytes().to_vec(), 0).unwrap()
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

fn serialize_benchmark(c: &mut Criterion) {
    let state = json!({
        "site": { "name": "Shaneyale 的博客" },
        "articles": (0..50).map(|i| json!({
            "id": i,
            "title": format!("第{}篇文章", i),
            "description": "一段还算像样的摘要，<em>混入了</em>需要转义的 & 字符",
            "tags": ["rust", "ssr", "cache"],
            "content": "正文".repeat(200),
        })).collect::<Vec<_>>(),
    });

    c.bench_function("scripts_serialize", |b| {
        b.iter(|| scripts::serialize(black_box(&state)));
    });

    let payload = scripts::serialize(&state);
    c.bench_function("scripts_deserialize", |b| {
        b.iter(|| scripts::deserialize(black_box(&payload)).unwrap());
    });
}

fn assemble_benchmark(c: &mut Criterion) {
    let head = "<title>某篇文章</title>\n<meta name=\"keywords\" content=\"rust\">";
    let markup = format!(
        r#"<div class="layout"><article>{}</article></div>"#,
        "正文".repeat(2000)
    );
    let footer = "<script>window.__INIT_STORE__ = {}</script>";

    c.bench_function("assemble_document", |b| {
        b.iter(|| {
            assemble::assemble(
                black_box(SHELL),
                black_box(head),
                black_box(&markup),
                black_box(footer),
            )
        });
    });
}

fn render_cold_benchmark(c: &mut Criterion) {
    let runtime = runtime();

    c.bench_function("render_ssr_cold", |b| {
        b.iter(|| {
            // 每次迭代用全新缓存，度量完整管线
            let cache = Arc::new(Mutex::new(RenderCache::new(64, Duration::from_secs(60))));
            let outcome = runtime
                .block_on(render_ssr(
                    black_box(&request_at("/post/42")),
                    black_box(SHELL),
                    &cache,
                    0,
                ))
                .unwrap();
            black_box(outcome.html);
        });
    });
}

fn render_cached_benchmark(c: &mut Criterion) {
    let runtime = runtime();
    let cache = Arc::new(Mutex::new(RenderCache::new(64, Duration::from_secs(60))));
    runtime
        .block_on(render_ssr(&request_at("/post/42"), SHELL, &cache, 0))
        .unwrap();

    c.bench_function("render_ssr_cache_hit", |b| {
        b.iter(|| {
            let outcome = runtime
                .block_on(render_ssr(
                    black_box(&request_at("/post/42")),
                    black_box(SHELL),
                    &cache,
                    0,
                ))
                .unwrap();
            black_box(outcome.html);
        });
    });
}

fn render_error_page_benchmark(c: &mut Criterion) {
    let runtime = runtime();
    let cache = Arc::new(Mutex::new(RenderCache::new(64, Duration::from_secs(60))));

    c.bench_function("render_ssr_error_page", |b| {
        b.iter(|| {
            let outcome = runtime
                .block_on(render_ssr(
                    black_box(&request_at("/no/such/page")),
                    black_box(SHELL),
                    &cache,
                    0,
                ))
                .unwrap();
            black_box(outcome.status);
        });
    });
}

criterion_group!(
    benches,
    serialize_benchmark,
    assemble_benchmark,
    render_cold_benchmark,
    render_cached_benchmark,
    render_error_page_benchmark
);
criterion_main!(benches);
