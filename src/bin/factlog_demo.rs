//! FactLog demo
//!
//! Runs the built-in geometry program plus a few sample programs for a number
//! of ticks and prints each tick's diagnostics as a JSON line.

use std::io;
use std::time::Duration;

use factlog::core_programs;
use factlog::{
    val, var, Claim, CornerPoints, FactLogError, JsonLinesSink, Placement, Point, Program,
    Scheduler, SchedulerConfig, TelemetryPublisher, Viewport,
};
use tracing_subscriber::EnvFilter;

/// Demo configuration
struct Config {
    /// Ticks to run
    ticks: u64,
    /// Milliseconds between ticks
    interval_ms: u64,
    viewport: Viewport,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ticks: 5,
            interval_ms: 100,
            viewport: Viewport::default(),
        }
    }
}

fn parse_value<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> T {
    let Some(raw) = args.get(i + 1) else {
        eprintln!("error: {flag} requires a value");
        std::process::exit(1);
    };
    raw.parse().unwrap_or_else(|_| {
        eprintln!("error: invalid value for {flag}: {raw}");
        std::process::exit(1);
    })
}

fn parse_args() -> Config {
    let args: Vec<String> = std::env::args().collect();
    let mut config = Config::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--ticks" | "-t" => config.ticks = parse_value(&args, i, "--ticks"),
            "--interval-ms" => config.interval_ms = parse_value(&args, i, "--interval-ms"),
            "--width" => config.viewport.width = parse_value(&args, i, "--width"),
            "--height" => config.viewport.height = parse_value(&args, i, "--height"),
            "--help" | "-h" => {
                println!("factlog-demo - run sample programs through the FactLog scheduler");
                println!();
                println!("USAGE:");
                println!("    factlog-demo [OPTIONS]");
                println!();
                println!("OPTIONS:");
                println!("    -t, --ticks <N>           Ticks to run [default: 5]");
                println!("        --interval-ms <MS>    Pause between ticks [default: 100]");
                println!("        --width <PX>          Viewport width [default: 1280]");
                println!("        --height <PX>         Viewport height [default: 720]");
                println!("    -h, --help                Print help information");
                std::process::exit(0);
            }
            other => {
                eprintln!("error: unknown argument: {other}");
                std::process::exit(1);
            }
        }
        i += 2;
    }

    config
}

fn paper(x: f64, y: f64) -> Placement {
    let (w, h) = (0.2, 0.25);
    Placement::from_corners(CornerPoints {
        top_left: Point::new(x, y),
        top_right: Point::new(x + w, y),
        bottom_right: Point::new(x + w, y + h),
        bottom_left: Point::new(x, y + h),
    })
}

fn sample_programs() -> Vec<Program> {
    let highlighter = Program::new("1", "highlight every program", |ctx| {
        ctx.when(vec![Claim::new("@ is a @", vec![var("p"), val("program")])], |ctx, m| {
            ctx.wish("@ is highlighted", [m.require("p")?.clone()]);
            Ok(())
        })?;
        Ok(())
    })
    .with_placement(paper(0.1, 0.1));

    let sizes = Program::new("2", "measure papers in cm", |ctx| {
        // Papers are A4 unless someone knows better.
        ctx.to_know(
            Claim::new("@ has corner points @ in cm", vec![var("p"), var("?points")]),
            |ctx, m| {
                let points = CornerPoints::rect(21.0, 29.7);
                ctx.claim(
                    "@ has corner points @ in cm",
                    [m.require("p")?.clone(), factlog::Value::from_serialize(&points)?],
                );
                Ok(())
            },
        )?;
        ctx.when(
            vec![
                Claim::new("@ is a @", vec![var("p"), val("program")]),
                Claim::new("@ has corner points @ in cm", vec![var("p"), var("points")]),
            ],
            |_, _| Ok(()),
        )?;
        ctx.when_all(
            vec![Claim::new("@ has @ pixels per cm", vec![var("p"), var("ratio")])],
            |ctx, matches| {
                ctx.log(serde_json::json!({ "calibrated": matches.len() }));
                Ok(())
            },
        )?;
        Ok(())
    })
    .with_placement(paper(0.5, 0.4));

    let broken = Program::new("3", "divide by nothing", |ctx| {
        ctx.when(vec![Claim::new("current time is @", vec![var("t")])], |ctx, m| {
            let t = m.require("t")?.as_int().unwrap_or_default();
            if t % 2 == 0 {
                return Err(FactLogError::callback("even timestamps are not supported"));
            }
            ctx.claim("odd time is @", [t]);
            Ok(())
        })?;
        Ok(())
    });

    vec![core_programs::geometry(), highlighter, sizes, broken]
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let config = parse_args();
    let scheduler_config = SchedulerConfig {
        viewport: config.viewport,
        ..SchedulerConfig::default()
    };

    let publisher = match TelemetryPublisher::spawn(scheduler_config.telemetry.clone(), JsonLinesSink::new(io::stdout())) {
        Ok(publisher) => publisher,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };
    let mut scheduler = Scheduler::new(scheduler_config).with_telemetry(publisher);

    let programs = sample_programs();
    for _ in 0..config.ticks {
        let report = scheduler.tick(&programs);
        tracing::info!(
            tick = report.tick,
            iterations = report.iterations,
            settled = report.settled,
            rules_fired = report.rules_fired,
            facts = report.facts,
            errors = report.errors,
            "tick"
        );
        std::thread::sleep(Duration::from_millis(config.interval_ms));
    }

    if let Some(publisher) = scheduler.take_telemetry() {
        publisher.shutdown();
    }
}
