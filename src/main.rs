//! Color Drop entry point
//!
//! Runs a single drop headlessly and prints the resulting palette.
//!
//! Usage: `color-drop [--settings PATH] [--seed N] [--mix]`

use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};

use color_drop::color::FALLBACK_COLORS;
use color_drop::sim::{Board, DropState, Settled, Simulator};
use color_drop::{BucketSet, PaletteMode, Rgb, Settings};

struct Args {
    settings: Option<PathBuf>,
    seed: Option<u64>,
    mode: PaletteMode,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        settings: None,
        seed: None,
        mode: PaletteMode::First,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--settings" => {
                let v = iter.next().ok_or_else(|| anyhow!("missing value for --settings"))?;
                args.settings = Some(PathBuf::from(v));
            }
            "--seed" => {
                let v = iter.next().ok_or_else(|| anyhow!("missing value for --seed"))?;
                args.seed = Some(v.parse().map_err(|_| anyhow!("invalid --seed value: {}", v))?);
            }
            "--mix" => args.mode = PaletteMode::Mix,
            other => bail!("unknown argument: {}", other),
        }
    }
    Ok(args)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = parse_args()?;

    let settings = match &args.settings {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    log::info!(
        "Color Drop: {} containers, {} gravity, physics {}",
        settings.container_count,
        settings.gravity_style.as_str(),
        if settings.physics_enabled { "on" } else { "off" }
    );

    let colors: Vec<Rgb> = (0..settings.container_count)
        .map(|i| FALLBACK_COLORS[i % FALLBACK_COLORS.len()])
        .collect();
    let board = Board::default();
    let mut buckets = BucketSet::from_weights(&settings.weights());
    let config = buckets.apply_to(settings.simulation_config());
    let balls = DropState::spawn(&board, &colors).balls;

    let mut sim = match args.seed {
        Some(seed) => Simulator::with_seed(seed),
        None => Simulator::new(),
    };
    let (settled_tx, settled_rx) = mpsc::channel::<Settled>();
    let on_settled = move |s: Settled| {
        let _ = settled_tx.send(s);
    };

    if settings.physics_enabled {
        sim.start(board, config, balls, on_settled, |contact| {
            log::debug!(
                "spark {} at ({:.0}, {:.0})",
                contact.spark_color(),
                contact.midpoint.x,
                contact.midpoint.y
            );
        })?;
    } else {
        let delay = settings.gravity_style.fallback_delay();
        sim.start_fallback(board, config, balls, delay, on_settled)?;
    }

    for _ in 0..colors.len() {
        let settled = settled_rx
            .recv_timeout(Duration::from_secs(60))
            .context("drop did not settle in time")?;
        if !buckets.accept(&settled) {
            log::info!("ball {} skipped (bucket {} locked)", settled.ball, settled.bucket);
        }
    }
    sim.stop();

    for (i, bucket) in buckets.buckets.iter().enumerate() {
        let hexes: Vec<String> = bucket.colors.iter().map(Rgb::to_hex).collect();
        println!("bucket {}: [{}]", i, hexes.join(", "));
    }
    let palette: Vec<String> = buckets.palette(args.mode).iter().map(Rgb::to_hex).collect();
    println!("palette: {}", palette.join(" "));
    Ok(())
}
