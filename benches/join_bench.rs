use criterion::{black_box, criterion_group, criterion_main, Criterion};
use savant_video::{join_plays, pool_size, PlayOfInterest, PlayRecord};
use savant_video::video_source::extract_video_src;

/// A season's worth of pitches for one team, ~300 per game
fn records(games: u64) -> Vec<PlayRecord> {
    (0..games)
        .flat_map(|game| {
            (0..300u32).map(move |i| PlayRecord {
                game_id: 700_000 + game,
                inning: 1 + i / 34,
                at_bat_number: 1 + i / 4,
                pitch_number: 1 + i % 4,
                play_id: format!("{}-{}", game, i),
                sv_id: None,
            })
        })
        .collect()
}

/// Benchmark joining requested pitches against extracted play records
fn bench_join(c: &mut Criterion) {
    let records = records(162);
    let requested: Vec<PlayOfInterest> = records
        .iter()
        .step_by(7)
        .map(|record| record.key())
        .collect();

    c.bench_function("join_plays_season", |b| {
        b.iter(|| black_box(join_plays(black_box(&requested), black_box(&records))))
    });
}

/// Benchmark scraping a video page
fn bench_extract_video_src(c: &mut Criterion) {
    let filler = "<div class=\"nav\"><a href=\"#\">link</a></div>".repeat(200);
    let html = format!(
        "<html><body>{}<div class=\"video-box\"><video><source src=\"https://cdn.test/a.mp4\" type=\"video/mp4\"></video></div></body></html>",
        filler
    );

    c.bench_function("extract_video_src", |b| {
        b.iter(|| black_box(extract_video_src(black_box(&html))))
    });
}

/// Pool sizing across item counts
fn bench_pool_size(c: &mut Criterion) {
    c.bench_function("pool_size", |b| {
        b.iter(|| {
            for items in 0..1000 {
                black_box(pool_size(black_box(items), black_box(8)));
            }
        })
    });
}

// Group all benchmarks
criterion_group!(benches, bench_join, bench_extract_video_src, bench_pool_size);
criterion_main!(benches);
