use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use factlog::core_programs;
use factlog::{
    val, var, Claim, CoreFacts, CornerPoints, FactDb, Placement, Point, Program, Scheduler,
    SchedulerConfig, Viewport,
};

fn family_db(people: u32) -> FactDb {
    let mut db = FactDb::new();
    for i in 1..people {
        db.add_claim(&Claim::fact("@ is father of @", [i / 2, i]));
    }
    db
}

fn bench_join(c: &mut Criterion) {
    let mut group = c.benchmark_group("query/grandparent_join");
    for people in [256u32, 4096] {
        let db = family_db(people);
        let patterns = vec![
            Claim::new("@ is father of @", vec![var("x"), var("y")]),
            Claim::new("@ is father of @", vec![var("y"), var("z")]),
        ];
        group.throughput(Throughput::Elements(u64::from(people)));
        group.bench_with_input(BenchmarkId::from_parameter(people), &patterns, |b, patterns| {
            b.iter_batched(
                || db.clone(),
                |mut db| black_box(db.query(patterns)),
                criterion::BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn papers(count: u32) -> Vec<Program> {
    let mut programs = vec![core_programs::geometry()];
    for i in 0..count {
        let x = f64::from(i % 8) / 8.0;
        let y = f64::from(i / 8) / 8.0;
        let corners = CornerPoints {
            top_left: Point::new(x, y),
            top_right: Point::new(x + 0.1, y),
            bottom_right: Point::new(x + 0.1, y + 0.1),
            bottom_left: Point::new(x, y + 0.1),
        };
        let program = Program::new(i + 100, "paper", |ctx| {
            ctx.when(
                vec![
                    Claim::new("@ is a @", vec![var("p"), val("program")]),
                    Claim::new("@ has center point @", vec![var("p"), var("center")]),
                ],
                |ctx, m| {
                    ctx.wish("@ is labelled", [m.require("p")?.clone()]);
                    Ok(())
                },
            )?;
            Ok(())
        })
        .with_placement(Placement::from_corners(corners));
        programs.push(program);
    }
    programs
}

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler/tick");
    for count in [8u32, 64] {
        let programs = papers(count);
        let mut scheduler = Scheduler::new(SchedulerConfig::default())
            .with_base_facts(CoreFacts::new(Viewport::default()).with_fixed_time(0));
        // first tick registers everything
        scheduler.tick(&programs);

        group.throughput(Throughput::Elements(u64::from(count)));
        group.bench_with_input(BenchmarkId::from_parameter(count), &programs, |b, programs| {
            b.iter(|| black_box(scheduler.tick(programs)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_join, bench_tick);
criterion_main!(benches);
