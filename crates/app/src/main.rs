use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use jypad_core::{
    AppConfig, BallId, Pad, PadConfig, SessionState, SourceInfo, TransportFollower,
    TransportSnapshot,
};
use tracing_subscriber::EnvFilter;

fn main() -> jypad_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Demo { output, bpm } => run_demo(&output, bpm, &config.pad),
        Commands::Inspect { input, json } => run_inspect(&input, json, &config.pad),
        Commands::Play {
            input,
            from,
            to,
            step,
            bpm,
        } => run_play(&input, from, to, step, bpm, &config.pad),
        Commands::Tween {
            input,
            ball,
            at,
            bpm,
            output,
        } => run_tween(&input, ball, at, bpm, output.as_deref(), &config.pad),
    }
}

/// Records a circular drag on one ball and a tweened keyframe pair on
/// another, then saves the session.
fn run_demo(output: &Path, bpm: f64, config: &PadConfig) -> jypad_core::Result<()> {
    check_tempo(bpm)?;
    tracing::info!(?output, bpm, "recording demo session");

    let mut pad = Pad::empty_with_config(config.clone());
    pad.add_source(
        1,
        0.0,
        0.0,
        SourceInfo {
            name: "Source 1".to_string(),
            ..SourceInfo::default()
        },
    );
    let number = pad.next_source_number();
    pad.add_source(
        2,
        -0.5,
        -0.5,
        SourceInfo {
            osc_prefix: format!("/track/{number}"),
            name: format!("Source {number}"),
            number,
            ..SourceInfo::default()
        },
    );

    // 20 ms pointer updates over four quarter notes.
    pad.set_recording(1, true);
    let quarter_per_tick = 0.02 * bpm / 60.0;
    let ticks = (4.0 / quarter_per_tick).round() as usize;
    for tick in 0..=ticks {
        let time = tick as f64 * quarter_per_tick;
        let angle = (time / 4.0 * std::f64::consts::TAU) as f32;
        let transport = TransportSnapshot::playing_at(time, bpm);
        pad.drag_ball(1, 0.8 * angle.cos(), 0.8 * angle.sin(), &transport);
    }
    pad.set_recording(1, false);

    // A lone keyframe has no recorded density, so the tween falls back to
    // the nominal sampling interval.
    pad.set_position(2, 0.5, 0.5);
    pad.set_keyframe(2, &TransportSnapshot::stopped_at(4.0, bpm));
    pad.set_position(2, -0.5, -0.5);
    let tweened = pad.tween_to_next(2, 0.0, bpm);
    pad.drain_moves();

    tracing::info!(
        recorded = pad.event_count(1),
        tweened,
        "demo timelines ready"
    );
    SessionState::with_pad(pad).save(output)
}

fn run_inspect(input: &Path, json: bool, config: &PadConfig) -> jypad_core::Result<()> {
    let session = SessionState::load(input, config)?;
    let pad = &session.pad;

    if json {
        let report = serde_json::json!({
            "balls": pad.balls(),
            "event_counts": pad
                .balls()
                .iter()
                .map(|ball| (ball.id().to_string(), pad.event_count(ball.id())))
                .collect::<std::collections::BTreeMap<_, _>>(),
            "table": session.table,
            "osc": session.osc,
            "zoom_scale": session.zoom_scale,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for ball in pad.balls() {
        let source = &ball.source;
        println!(
            "{}  prefix={} name={:?} number={} muted={} soloed={} recording={} events={}",
            ball.output_string(),
            source.osc_prefix,
            source.name,
            source.number,
            ball.is_muted,
            ball.is_soloed,
            ball.is_recording,
            pad.event_count(ball.id()),
        );
    }
    print!("{}", session.table.to_display_string());
    println!(
        "osc {}:{} enabled={}  zoom={}",
        session.osc.ip_address, session.osc.port, session.osc.enabled, session.zoom_scale
    );
    Ok(())
}

/// Drives the saved pad through a transport run and prints every move.
fn run_play(
    input: &Path,
    from: f64,
    to: f64,
    step: f64,
    bpm: f64,
    config: &PadConfig,
) -> jypad_core::Result<()> {
    if !step.is_finite() || step <= 0.0 || !from.is_finite() || !to.is_finite() || to < from {
        return Err(jypad_core::PadError::msg(format!(
            "invalid playback range {from}..{to} with step {step}"
        )));
    }
    tracing::info!(?input, from, to, step, bpm, "simulating transport");

    let mut pad = SessionState::load(input, config)?.pad;
    let mut follower = TransportFollower::new();
    let ticks = ((to - from) / step).floor() as usize;

    for tick in 0..=ticks {
        let time = from + tick as f64 * step;
        follower.tick(&mut pad, &TransportSnapshot::playing_at(time, bpm));
        for moved in pad.drain_moves() {
            println!("{time:.3} {} {:.3} {:.3}", moved.id, moved.x, moved.y);
        }
    }

    follower.tick(&mut pad, &TransportSnapshot::stopped_at(to, bpm));
    for moved in pad.drain_moves() {
        println!("stop {} {:.3} {:.3}", moved.id, moved.x, moved.y);
    }
    Ok(())
}

fn run_tween(
    input: &Path,
    ball: BallId,
    at: f64,
    bpm: f64,
    output: Option<&Path>,
    config: &PadConfig,
) -> jypad_core::Result<()> {
    let mut session = SessionState::load(input, config)?;
    if session.pad.ball(ball).is_none() {
        return Err(jypad_core::PadError::msg(format!("no ball with id {ball}")));
    }

    let added = session.pad.tween_to_next(ball, at, bpm);
    tracing::info!(ball, at, added, "tween complete");
    session.save(output.unwrap_or(input))
}

fn check_tempo(bpm: f64) -> jypad_core::Result<()> {
    if bpm.is_finite() && bpm > 0.0 {
        Ok(())
    } else {
        Err(jypad_core::PadError::msg(format!("invalid tempo {bpm}")))
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Recordable 2D controller pad", long_about = None)]
struct Cli {
    /// Optional JSON config overriding limits, epsilons and tween settings.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Record a short demo session and write it to disk.
    Demo {
        /// Path of the session file to create.
        output: PathBuf,
        #[arg(long, default_value_t = 120.0)]
        bpm: f64,
    },
    /// Print the balls, recordings and settings stored in a session file.
    Inspect {
        input: PathBuf,
        /// Emit JSON instead of plain text.
        #[arg(long)]
        json: bool,
    },
    /// Play a session back against a simulated transport.
    Play {
        input: PathBuf,
        /// Start position in quarter notes.
        #[arg(long, default_value_t = 0.0)]
        from: f64,
        /// End position in quarter notes.
        #[arg(long, default_value_t = 4.0)]
        to: f64,
        /// Transport advance per tick, in quarter notes.
        #[arg(long, default_value_t = 0.25)]
        step: f64,
        #[arg(long, default_value_t = 120.0)]
        bpm: f64,
    },
    /// Fill the gap between a ball's position and its next recorded sample.
    Tween {
        input: PathBuf,
        #[arg(long)]
        ball: BallId,
        /// Transport position to tween from, in quarter notes.
        #[arg(long)]
        at: f64,
        #[arg(long, default_value_t = 120.0)]
        bpm: f64,
        /// Where to write the result. Defaults to overwriting the input.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_rejects_unusable_tempo() {
        let output = std::env::temp_dir().join("jypad-demo-rejected-tempo.bin");
        for bpm in [0.0, -120.0, f64::NAN, f64::INFINITY] {
            assert!(run_demo(&output, bpm, &PadConfig::default()).is_err());
        }
        assert!(!output.exists());
        assert!(check_tempo(120.0).is_ok());
    }
}
