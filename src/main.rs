mod cli;
mod sink;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use fp_av::{FfmpegDecoder, FfprobeProbe, StreamProbe, ToolRegistry, ToolSource};
use fp_core::config::Config;
use fp_core::{PlaybackState, Viewport};
use fp_frame::fit_within;
use fp_player::{PlaybackSession, Player};
use sink::StatsSink;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Frames between cadence log lines in `play`.
const REPORT_EVERY: u64 = 100;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            // Verbose mode: trace for framepipe, decoder stderr included
            "framepipe=trace,fp_player=trace,fp_av=debug,fp_frame=debug,fp_core=debug,ffmpeg=debug"
                .to_string()
        } else {
            "framepipe=debug,fp_player=info,fp_av=info,fp_frame=info,fp_core=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(exit_code(&e))
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Play {
            file,
            width,
            height,
            no_resize,
        } => {
            let config = Config::load_or_default(config_path);
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(play(&file, &config, width, height, !no_resize))
        }
        Commands::Probe { file, json } => {
            let config = Config::load_or_default(config_path);
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_file(&file, &config, json))
        }
        Commands::CheckTools => check_tools(&Config::load_or_default(config_path)),
        Commands::Validate {
            config: validate_path,
        } => {
            let path = validate_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("framepipe {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Exit code for a failed command: the error's own code when it comes from
/// the framepipe crates, 1 otherwise.
fn exit_code(err: &anyhow::Error) -> u8 {
    let code = if let Some(e) = err.downcast_ref::<fp_core::Error>() {
        e.exit_code()
    } else if let Some(failure) = err.downcast_ref::<fp_core::Failure>() {
        failure.exit_code()
    } else {
        1
    };
    u8::try_from(code).unwrap_or(1)
}

fn require_file(file: &Path) -> fp_core::Result<()> {
    if file.is_file() {
        Ok(())
    } else {
        Err(fp_core::Error::Validation(format!(
            "File does not exist: {}",
            file.display()
        )))
    }
}

async fn play(
    file: &Path,
    config: &Config,
    width: Option<u32>,
    height: Option<u32>,
    read_resizes: bool,
) -> Result<()> {
    require_file(file)?;

    let viewport = Viewport::new(
        width.unwrap_or(config.playback.viewport.width),
        height.unwrap_or(config.playback.viewport.height),
    );

    let tools = ToolRegistry::discover(&config.tools);
    let probe =
        FfprobeProbe::from_registry(&tools)?.with_timeout(config.playback.probe_timeout());
    let decoder = FfmpegDecoder::from_registry(&tools, &config.playback)?;

    let session = PlaybackSession::new(
        Arc::new(probe),
        Arc::new(decoder),
        StatsSink::new(REPORT_EVERY),
        config.playback.clone(),
    );
    let handle = Player::spawn(session);

    let target = handle.start(file, viewport).await?;
    println!("Playing {} at {} (viewport {})", file.display(), target, viewport);

    let mut states = handle.watch_state();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = read_resizes;

    let final_state = loop {
        let state = states.borrow_and_update().clone();
        if state.is_idle() || matches!(state, PlaybackState::Failed(_)) {
            break state;
        }

        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    break handle.state();
                }
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match line.parse::<Viewport>() {
                        Ok(next) => match handle.resize(next).await {
                            Ok(target) => println!("Resized to {target} (viewport {next})"),
                            Err(e) => tracing::error!("Resize to {next} failed: {e}"),
                        },
                        Err(e) => tracing::warn!("Ignoring resize request: {e}"),
                    }
                }
                Ok(None) => stdin_open = false,
                Err(e) => {
                    tracing::warn!("Stopped reading stdin: {e}");
                    stdin_open = false;
                }
            },
        }
    };

    let session = handle.shutdown().await?;
    let stats = session.stats();
    let summary = session.into_sink().summary();

    println!("Frames: {}", summary.frames);
    println!("Bytes: {}", summary.bytes);
    if stats.trailing_bytes_dropped > 0 {
        println!("Trailing bytes dropped: {}", stats.trailing_bytes_dropped);
    }
    println!(
        "Elapsed: {:.2}s ({:.1} fps)",
        summary.elapsed.as_secs_f64(),
        summary.frames_per_second()
    );

    match final_state {
        PlaybackState::Failed(failure) => Err(failure.into()),
        _ => Ok(()),
    }
}

async fn probe_file(file: &Path, config: &Config, json: bool) -> Result<()> {
    require_file(file)?;

    let tools = ToolRegistry::discover(&config.tools);
    let probe =
        FfprobeProbe::from_registry(&tools)?.with_timeout(config.playback.probe_timeout());
    let info = probe.probe(file).await?;

    if json {
        let json_str = serde_json::to_string_pretty(&info)?;
        println!("{}", json_str);
    } else {
        println!("File: {}", info.file_path.display());
        println!("Video: {}x{}", info.width, info.height);
        match info.frame_rate {
            Some(rate) => println!("Frame rate: {} fps", rate),
            None => println!("Frame rate: unknown"),
        }
        if let Some(packets) = info.packet_count {
            println!("Packets: {}", packets);
        }
        let viewport = config.playback.viewport;
        println!(
            "Fits {} viewport at: {}",
            viewport,
            fit_within(info.width, info.height, viewport)
        );
    }

    Ok(())
}

fn check_tools(config: &Config) -> Result<()> {
    println!("Checking external tools...\n");

    let tools = ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        if tool.source == Some(ToolSource::Config) {
            print!(" [configured]");
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install ffmpeg to enable playback.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {}", p.display());
            let config = Config::load(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    let playback = &config.playback;
    println!("  Viewport: {}", playback.viewport);
    println!("  Read chunk size: {} bytes", playback.read_chunk_size);
    println!(
        "  Max pending chunks: {} (up to {} bytes buffered)",
        playback.max_pending_chunks,
        playback.max_buffered_bytes()
    );
    println!("  Probe timeout: {:?}", playback.probe_timeout());
    println!("  Stop timeout: {:?}", playback.stop_timeout());

    let warnings = config.validate();
    if !warnings.is_empty() {
        println!("\nWarnings:");
        for warning in &warnings {
            println!("  - {}", warning);
        }
    }

    Ok(())
}
