use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tile_swap::core::{
    find_matches, find_matches_through, resolve, try_swap, FallIds, Grid, Palettes, Session,
    SimpleRng,
};
use tile_swap::types::{Coord, TokenId};

fn bench_populate(c: &mut Criterion) {
    c.bench_function("populate_8x8", |b| {
        b.iter(|| {
            let mut rng = SimpleRng::new(12345);
            Grid::populate(black_box(8), black_box(8), 5, &mut rng)
        })
    });
}

fn bench_full_scan(c: &mut Criterion) {
    let mut rng = SimpleRng::new(12345);
    let grid = Grid::populate(8, 8, 5, &mut rng).unwrap();

    c.bench_function("find_matches_8x8", |b| {
        b.iter(|| find_matches(black_box(&grid)))
    });
}

fn bench_through_scan(c: &mut Criterion) {
    let mut rng = SimpleRng::new(12345);
    let grid = Grid::populate(8, 8, 5, &mut rng).unwrap();

    c.bench_function("find_matches_through", |b| {
        b.iter(|| find_matches_through(&grid, black_box(Coord::new(4, 4)), TokenId(0)))
    });
}

fn bench_rejected_swap(c: &mut Criterion) {
    let mut rng = SimpleRng::new(12345);
    let grid = Grid::populate(8, 8, 5, &mut rng).unwrap();

    c.bench_function("try_swap_scan_row", |b| {
        b.iter(|| {
            for x in 0..7u8 {
                let from = Coord::new(x, 0);
                let to = Coord::new(x + 1, 0);
                let mut scratch = grid.clone();
                let _ = try_swap(&mut scratch, black_box(from), black_box(to));
            }
        })
    });
}

fn bench_cascade(c: &mut Criterion) {
    c.bench_function("resolve_cascade", |b| {
        b.iter(|| {
            let mut grid = Grid::from_letters(&["ABAB", "CCCA", "BABD", "DDDC"]).unwrap();
            let matches = find_matches(&grid);
            resolve(
                &mut grid,
                matches,
                4,
                &mut SimpleRng::new(12),
                &mut FallIds::new(),
            )
        })
    });
}

fn bench_snapshot(c: &mut Criterion) {
    let session = Session::new(8, 8, Palettes::default_names(), 12345).unwrap();

    c.bench_function("snapshot_state_hash", |b| {
        b.iter(|| black_box(session.snapshot()).state_hash())
    });
}

criterion_group!(
    benches,
    bench_populate,
    bench_full_scan,
    bench_through_scan,
    bench_rejected_swap,
    bench_cascade,
    bench_snapshot
);
criterion_main!(benches);
