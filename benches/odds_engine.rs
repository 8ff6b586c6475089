use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use plaza::config::{CrashConfig, PlinkoConfig};
use plaza::games::{
    blackjack::hand_value,
    cards::Deck,
    crash::{sample_crash_point, RiskTier},
    mines::multiplier_for,
    plinko::Board,
    roulette::WheelSpin,
    slots::{draw_grid, evaluate, PaylineMode},
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn mines_multiplier(c: &mut Criterion) {
    let mut group = c.benchmark_group("mines_multiplier");
    for mines in [1u8, 5, 24] {
        group.bench_function(BenchmarkId::new("clear_board", mines), |b| {
            b.iter(|| black_box(multiplier_for(25, black_box(mines), 25 - mines)))
        });
    }
    group.finish();
}

fn simulations(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(42);

    c.bench_function("roulette_spin", |b| {
        b.iter(|| black_box(WheelSpin::launch(0.0, &mut rng)))
    });

    let board = Board::new(PlinkoConfig::default());
    c.bench_function("plinko_ball", |b| {
        b.iter(|| black_box(board.simulate(6.0, &mut rng)))
    });

    c.bench_function("blackjack_deal_and_value", |b| {
        b.iter(|| {
            let mut deck = Deck::shuffled(&mut rng);
            let hand: Vec<_> = (0..3).filter_map(|_| deck.draw()).collect();
            black_box(hand_value(&hand))
        })
    });

    c.bench_function("slots_spin", |b| {
        b.iter(|| {
            let grid = draw_grid(&mut rng);
            black_box(evaluate(&grid, PaylineMode::All, 10))
        })
    });

    let crash = CrashConfig::default();
    c.bench_function("crash_point", |b| {
        b.iter(|| black_box(sample_crash_point(RiskTier::Medium, &crash, &mut rng)))
    });
}

criterion_group!(benches, mines_multiplier, simulations);
criterion_main!(benches);
