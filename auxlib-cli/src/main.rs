//! AUXLib CLI: evaluate a script, then inspect the result, play it or write it.

use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use auxlib::{InfoValue, Paths, Session};
use auxlib_engine::{AuxEngine, EngineConfig};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "auxlib-cli", about = "Evaluate AUX scripts from the command line")]
struct Cli {
    /// Script text to evaluate
    script: Option<String>,
    /// Read the script from a file instead
    #[arg(long, short = 'f', conflicts_with = "script")]
    file: Option<PathBuf>,
    /// Sample rate; 0 or 1 uses the configured default
    #[arg(long, default_value_t = 0)]
    fs: i32,
    /// Directory `wave(..)` resolves against
    #[arg(long)]
    wav_path: Option<String>,
    /// Directory `import` resolves against
    #[arg(long)]
    aux_path: Option<String>,
    /// Directory `data(..)` resolves against
    #[arg(long)]
    data_path: Option<String>,
    /// Play the result; optional output device id (default device if omitted)
    #[arg(long, num_args = 0..=1, default_missing_value = "-1", allow_hyphen_values = true)]
    play: Option<i32>,
    /// Write the result to a 16-bit wave file
    #[arg(long, short = 'o')]
    write: Option<PathBuf>,
    /// List output devices and exit
    #[arg(long)]
    list_devices: bool,
    /// JSON engine configuration
    #[arg(long)]
    config: Option<PathBuf>,
    /// Debug logging (overridden by RUST_LOG)
    #[arg(long, short = 'v')]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, Box<dyn Error>> {
    if cli.list_devices {
        println!("Available output devices:");
        for (id, name) in auxlib_engine::output_devices()?.into_iter().enumerate() {
            println!("{id:>3}  {name}");
        }
        return Ok(ExitCode::SUCCESS);
    }

    let script = match (&cli.script, &cli.file) {
        (Some(s), _) => s.clone(),
        (None, Some(path)) => {
            tracing::debug!(path = %path.display(), "reading script");
            fs::read_to_string(path)?
        }
        (None, None) => return Err("nothing to evaluate: pass a script or --file".into()),
    };

    let config = cli.config.as_ref().map_or_else(EngineConfig::default, EngineConfig::load_from_file);
    let mut session = Session::<AuxEngine>::new(config);
    let paths = Paths {
        wav: cli.wav_path.as_deref(),
        aux: cli.aux_path.as_deref(),
        data: cli.data_path.as_deref(),
    };
    let Ok(handle) = session.create(cli.fs, paths) else {
        eprintln!("{}", session.errors().message());
        return Ok(ExitCode::from(2));
    };
    tracing::debug!(handle, requested_fs = cli.fs, "instance ready");

    let eval = match session.evaluate(handle, &script) {
        Ok(eval) => eval,
        Err(e) => {
            tracing::debug!(code = e.code(), "evaluation failed");
            eprintln!("{}", session.errors().message());
            return Ok(ExitCode::from(u8::try_from(-e.code()).unwrap_or(3)));
        }
    };
    let fs = match session.get_info(handle, "fs")? {
        InfoValue::Rate(r) => r,
        InfoValue::Path(_) => 0,
    };
    match &eval {
        Some(ev) => {
            let samples = session.samples(ev).unwrap_or_default();
            let ms = ev.len as f64 * 1000.0 / f64::from(fs.max(1));
            println!("channels: {}  length: {} samples ({ms:.1} ms @ {fs} Hz)", ev.channels, ev.len);
            for (i, block) in samples.chunks(ev.len.max(1)).enumerate() {
                let peak = block.iter().fold(0.0_f64, |m, s| m.max(s.abs()));
                println!("  ch{i}: peak {peak:.4}");
            }
        }
        None => println!("empty result"),
    }

    if let Some(path) = &cli.write {
        session.persist(handle, path)?;
        println!("wrote {}", path.display());
    }

    if let Some(device) = cli.play {
        session.play(handle, device)?;
        let secs = eval.map_or(0.0, |ev| ev.len as f64 / f64::from(fs.max(1)));
        tracing::info!(device, secs, "playing");
        std::thread::sleep(Duration::from_secs_f64(secs) + Duration::from_millis(250));
    }

    session.destroy(handle);
    Ok(ExitCode::SUCCESS)
}
