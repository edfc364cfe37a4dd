// crates/systems/oxid_palm/src/main.rs - Palm OS core, headless
use clap::Parser;
use oxid_palm::gremlins::{
    EventSink, GremlinInfo, Language, ShiftJisText, SingleByteText, TextServices, Tick, UiState, MAX_SEED_VALUE,
};
use oxid_palm::{ConfigError, PalmConfig, Session, SessionError};
use oxide_core::Rom;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless Palm OS core with a Gremlins runner")]
struct Args {
    /// Palm OS ROM image
    rom: PathBuf,

    /// JSON device description
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run Gremlin number <SEED>
    #[arg(long, value_name = "SEED")]
    gremlin: Option<u16>,

    /// Steps in the Gremlin run
    #[arg(long, default_value_t = 1000)]
    steps: u32,

    /// Write the session here at the end (and on Gremlin save points)
    #[arg(long)]
    save: Option<PathBuf>,

    /// Gremlin steps between saves, 0 for none
    #[arg(long, default_value_t = 0)]
    save_every: u32,
}

/// Counts what the Gremlin typed and tapped.
#[derive(Default)]
struct TallySink {
    keys: u32,
    pens: u32,
}

impl EventSink for TallySink {
    fn key_down(&mut self, chr: u16, _key_code: u16, modifiers: u16) {
        debug!("key {chr:#06X} mod {modifiers:#06X}");
        self.keys += 1;
    }

    fn pen(&mut self, x: i16, y: i16, down: bool) {
        debug!("pen {} at ({x}, {y})", if down { "down" } else { "up" });
        self.pens += 1;
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

fn save_to(session: &Session, path: &Path) -> Result<(), SessionError> {
    fs::write(path, session.save())?;
    debug!("session written to {}", path.display());
    Ok(())
}

fn run(args: &Args) -> Result<(), SessionError> {
    let config = match &args.config {
        Some(path) => PalmConfig::from_json_file(path)?,
        None => PalmConfig::default(),
    };
    let rom = Rom::from_file(&args.rom)?;

    println!(
        "ROM: {} bytes | Device: {} | RAM: {}KB",
        rom.len(),
        config.device.name(),
        config.ram_size / 1024
    );

    let mut session = Session::new(config, rom)?;
    let (ssp, pc) = session.reset_vectors()?;
    println!("Reset: SSP={ssp:08X} PC={pc:08X}");

    if let Some(seed) = args.gremlin {
        if seed as u32 > MAX_SEED_VALUE {
            return Err(ConfigError::Invalid(format!("Gremlin seed {seed} is above {MAX_SEED_VALUE}")).into());
        }
        let mut info = GremlinInfo::new(seed, args.steps);
        info.save_frequency = args.save_every;
        session.start_gremlin(info);

        let ui = UiState {
            language: session.config().language,
            ..UiState::default()
        };
        let text: &dyn TextServices = match ui.language {
            Language::Japanese => &ShiftJisText,
            Language::English => &SingleByteText,
        };

        let mut sink = TallySink::default();
        loop {
            match session.gremlin_tick(&ui, text, &mut sink) {
                Tick::Finished | Tick::Inactive => break,
                _ => {}
            }
            if let (true, Some(path)) = (session.gremlin_save_due(), &args.save) {
                save_to(&session, path)?;
            }
        }
        println!(
            "Gremlin #{seed}: {} steps | {} keys | {} pen events",
            session.gremlins().counter(),
            sink.keys,
            sink.pens
        );
    }

    if let Some(path) = &args.save {
        save_to(&session, path)?;
    }
    Ok(())
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    println!("╔══════════════════════════════════════════╗");
    println!("║      Oxide-Palm - Palm OS Core           ║");
    println!("╚══════════════════════════════════════════╝");

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
