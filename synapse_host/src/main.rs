//! Command-line demo: runs a small two-note sequence through the synapse
//! engine's hosting layer and logs every emitted note event.

use std::time::Duration;

use clap::Parser;
use synapse_engine::{config::EngineConfig, constants, cursor::NodeEvent};

/// Drive the synapse engine's shared-memory graph engine from the command
/// line, logging note-on/note-off events as they're emitted.
#[derive(Parser, Debug)]
#[command(name = "synapse_host", version, about)]
struct Args {
    /// Path to a TOML engine configuration file. Overridden by --bpm/--ppq
    /// if both are given; falls back to engine defaults otherwise.
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Tempo in beats per minute.
    #[arg(long, default_value_t = 120.0)]
    bpm: f64,

    /// Pulses per quarter note.
    #[arg(long, default_value_t = 960)]
    ppq: u32,

    /// How long to run the demo before stopping.
    #[arg(long, default_value_t = 5)]
    duration_secs: u64,

    /// PRNG seed for the traversal cursor's stochastic synapse choices.
    #[arg(long, default_value_t = 1)]
    seed: u32,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EngineConfig::from_file(path).unwrap_or_else(|err| {
            log::error!("failed to load {}: {err}", path.display());
            std::process::exit(1);
        }),
        None => EngineConfig { bpm: args.bpm, ppq: args.ppq, ..EngineConfig::default() },
    };

    let (bridge, handle) = synapse_host::start(config.clone(), args.seed, synapse_host::DEFAULT_BLOCK_SAMPLES, |event| {
        match event {
            NodeEvent::NoteOn { pitch, velocity, tick_offset, .. } => {
                log::info!("note_on  pitch={pitch} velocity={velocity} offset={tick_offset}");
            }
            NodeEvent::NoteOff { pitch, tick_offset, .. } => {
                log::info!("note_off pitch={pitch} offset={tick_offset}");
            }
        }
    });

    bridge
        .insert(constants::OPCODE_NOTE, 60, 100, 480, 0, false, 1, constants::NULL)
        .expect("insert first note");
    bridge
        .insert(constants::OPCODE_NOTE, 64, 100, 480, 480, false, 2, constants::NULL)
        .expect("insert second note");

    log::info!("running for {}s at {} BPM", args.duration_secs, config.bpm);
    std::thread::sleep(Duration::from_secs(args.duration_secs));

    handle.stop();
}
