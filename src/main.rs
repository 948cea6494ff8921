// src/main.rs
//
// `breathwork` command line: live sessions, offline renders, technique list.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use hound::{SampleFormat, WavSpec, WavWriter};
use log::info;

use breathwork::{
    AudioGraphHost, BrainwavePreset, EngineConfig, FileAssets, ManualClock, MonotonicClock,
    NoOutput, OfflineOutput, OutputBackend, SessionCommand, SessionCoordinator, Technique,
    TimerEvent, spawn_session,
};

#[derive(Parser)]
#[command(name = "breathwork")]
#[command(about = "Guided breathing sessions with ambient sound", long_about = None)]
struct Cli {
    /// TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Built-in technique name (overrides the config file)
    #[arg(short, long, global = true)]
    technique: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a session in real time
    Run {
        /// Also play binaural tones with this preset
        #[arg(short, long)]
        binaural: Option<BrainwavePreset>,
    },

    /// Render a whole session to a WAV file
    Render {
        #[arg(short, long, default_value = "session.wav")]
        output: PathBuf,

        #[arg(short, long)]
        binaural: Option<BrainwavePreset>,

        /// Seconds of tail rendered after completion
        #[arg(long, default_value = "3.5")]
        tail: f64,
    },

    /// List the built-in techniques
    Techniques,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Commands::Techniques = cli.command {
        for preset in Technique::presets() {
            let [a, b, c, d] = preset.durations;
            println!(
                "{:<10} {:<24} {}-{}-{}-{} x{}",
                preset.name, preset.label, a, b, c, d, preset.cycles
            );
        }
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let technique = match &cli.technique {
        Some(name) => Technique::preset(name)?,
        None => config.technique()?.map_or_else(|| Technique::preset("box"), Ok)?,
    };

    let runtime = tokio::runtime::Runtime::new()?;
    match cli.command {
        Commands::Run { binaural } => runtime.block_on(run(config, technique, binaural)),
        Commands::Render {
            output,
            binaural,
            tail,
        } => runtime.block_on(render(config, technique, binaural, output, tail)),
        Commands::Techniques => Ok(()),
    }
}

#[cfg(feature = "device")]
fn live_backend(config: &EngineConfig) -> Box<dyn OutputBackend> {
    if config.audio_enabled {
        Box::new(breathwork::DeviceOutput::new())
    } else {
        Box::new(NoOutput)
    }
}

#[cfg(not(feature = "device"))]
fn live_backend(_config: &EngineConfig) -> Box<dyn OutputBackend> {
    log::warn!("built without the `device` feature; running silently");
    Box::new(NoOutput)
}

async fn run(
    config: EngineConfig,
    technique: Technique,
    binaural: Option<BrainwavePreset>,
) -> Result<(), Box<dyn std::error::Error>> {
    let host = AudioGraphHost::new(
        live_backend(&config),
        config.sample_rate as f64,
        config.block_size,
    );
    let assets = FileAssets::new(&config.assets.root, &config.assets.extension);
    let coordinator =
        SessionCoordinator::new(technique, MonotonicClock::new(), host, assets, &config);

    let mut handle = spawn_session(coordinator, config.tick_interval());
    let mut events = handle
        .take_events()
        .ok_or("session event stream unavailable")?;

    if let Some(preset) = binaural {
        handle.send(SessionCommand::SetBinauralPreset(preset));
        handle.send(SessionCommand::StartBinaural);
    }
    handle.start();

    while let Some(event) = events.recv().await {
        match event {
            TimerEvent::PhaseChanged { phase, cycle, .. } => {
                let total = handle.snapshot().session.total_cycles;
                println!("cycle {cycle}/{total}: {phase}");
            }
            TimerEvent::Completed { cycles } => {
                println!("done: {cycles} cycles");
                break;
            }
        }
    }

    // Let the completion fade play out before tearing the context down.
    tokio::time::sleep(config.ambient.completion_fade()).await;
    handle.shutdown().await;
    Ok(())
}

async fn render(
    config: EngineConfig,
    technique: Technique,
    binaural: Option<BrainwavePreset>,
    path: PathBuf,
    tail: f64,
) -> Result<(), Box<dyn std::error::Error>> {
    let sample_rate = config.sample_rate;
    let output = OfflineOutput::new();
    let host = AudioGraphHost::new(
        Box::new(output.clone()),
        sample_rate as f64,
        config.block_size,
    );
    let clock = ManualClock::new();
    let assets = FileAssets::new(&config.assets.root, &config.assets.extension);
    let mut session = SessionCoordinator::new(technique, clock.clone(), host, assets, &config);

    let spec = WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(&path, spec)?;

    if let Some(preset) = binaural {
        session.set_binaural_preset(preset);
        session.start_binaural();
    }
    session.start();
    session.settle_audio().await;

    // Drive the timer from rendered frames so the output is reproducible.
    let block_frames =
        ((sample_rate as u64 * config.tick_interval_ms) / 1_000).max(1) as usize;
    let mut block = vec![0.0f32; block_frames * 2];
    let mut rendered: u64 = 0;
    let mut write_block = |block: &mut [f32], rendered: &mut u64| -> Result<(), hound::Error> {
        output.render_into(block);
        for sample in block.iter() {
            writer.write_sample((sample.clamp(-1.0, 1.0) * 32_767.0) as i16)?;
        }
        *rendered += (block.len() / 2) as u64;
        Ok(())
    };

    while !session.state().is_complete {
        write_block(&mut block, &mut rendered)?;
        clock.set(Duration::from_secs_f64(rendered as f64 / sample_rate as f64));
        session.tick();
    }

    session.fade_out_binaural(config.ambient.completion_fade());
    let tail_frames = (tail.max(0.0) * sample_rate as f64) as u64;
    let end = rendered + tail_frames;
    while rendered < end {
        write_block(&mut block, &mut rendered)?;
    }
    drop(write_block);
    writer.finalize()?;

    info!(
        "wrote {} ({:.1} s)",
        path.display(),
        rendered as f64 / sample_rate as f64
    );
    Ok(())
}
