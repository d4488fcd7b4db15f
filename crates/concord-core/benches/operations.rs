use criterion::{
    BatchSize, BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main,
};

use concord_core::{CausalTimeline, ManualTimer, State, Universe, VectorClock, WarpClock};

const SIZES: [usize; 3] = [100, 1_000, 10_000];

#[derive(Debug, Clone, Default, PartialEq)]
struct Register {
    value: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Arith {
    seq: u64,
    add: i64,
}

impl State<Arith> for Register {
    fn update(
        &mut self,
        base: Option<&Self>,
        _delta_time: f64,
        action: Option<&Arith>,
        _prev_delta_time: Option<f64>,
        _prev_base: Option<&Self>,
    ) {
        let Some(base) = base else { return };
        self.value = base.value + action.map_or(0, |a| a.add);
    }

    fn copy_from(&mut self, other: &Self) {
        self.value = other.value;
    }
}

fn filled_universe(entries: usize) -> Universe<Register, Arith, ManualTimer> {
    let timer = ManualTimer::new();
    let clock = WarpClock::new(0.0, timer.wall_source(), timer.clone());
    let seed = Arith { seq: 0, add: 0 };
    let mut universe = Universe::new(clock, 1e12, 0.0, seed, Register::default());
    for i in 1..=entries {
        let time = 10.0 * i as f64;
        universe
            .insert(time, Arith { seq: i as u64, add: 1 })
            .expect("within window");
    }
    universe
}

fn bench_universe(c: &mut Criterion) {
    let mut group = c.benchmark_group("universe");

    for entries in SIZES {
        group.throughput(Throughput::Elements(entries as u64));

        group.bench_with_input(
            BenchmarkId::new("insert_in_order", entries),
            &entries,
            |b, &entries| {
                b.iter(|| black_box(filled_universe(entries)));
            },
        );

        // Lands just after the seed: the whole tail is re-derived.
        group.bench_with_input(
            BenchmarkId::new("insert_oldest", entries),
            &entries,
            |b, &entries| {
                b.iter_batched(
                    || filled_universe(entries),
                    |mut universe| {
                        universe
                            .insert(5.0, Arith { seq: u64::MAX, add: 1 })
                            .expect("within window");
                        black_box(universe)
                    },
                    BatchSize::LargeInput,
                );
            },
        );
    }

    group.finish();
}

fn filled_timeline(entries: usize) -> CausalTimeline<i64> {
    let mut timeline = CausalTimeline::new(0, VectorClock::new(), "origin", 0, 0, u64::MAX);
    let mut clock = VectorClock::new();
    for i in 1..=entries {
        clock.increment("alice", 1);
        timeline
            .add(
                clock.clone(),
                "alice",
                i as u64,
                Box::new(|prev| prev + 1),
                i as u64,
            )
            .expect("nothing precedes an unbounded window");
    }
    timeline
}

fn bench_causal(c: &mut Criterion) {
    let mut group = c.benchmark_group("causal");

    for entries in SIZES {
        group.throughput(Throughput::Elements(entries as u64));

        group.bench_with_input(
            BenchmarkId::new("add_in_order", entries),
            &entries,
            |b, &entries| {
                b.iter(|| black_box(filled_timeline(entries)));
            },
        );

        // Concurrent with the whole chain, earliest timestamp: splices at
        // the front and replays every later action.
        group.bench_with_input(
            BenchmarkId::new("add_oldest_concurrent", entries),
            &entries,
            |b, &entries| {
                b.iter_batched(
                    || filled_timeline(entries),
                    |mut timeline| {
                        let mut other = VectorClock::new();
                        other.increment("bob", 1);
                        timeline
                            .add(other, "bob", 0, Box::new(|prev| prev * 2), 0)
                            .expect("nothing precedes an unbounded window");
                        black_box(timeline)
                    },
                    BatchSize::LargeInput,
                );
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_universe, bench_causal);
criterion_main!(benches);
