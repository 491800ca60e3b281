use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "framepipe")]
#[command(author, version, about = "Play video files as a stream of raw RGBA frames")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Play a file into a frame statistics sink
    ///
    /// While playing, lines of the form WxH on stdin resize the viewport.
    Play {
        /// File to play
        #[arg(required = true)]
        file: PathBuf,

        /// Viewport width (defaults to the configured viewport)
        #[arg(long)]
        width: Option<u32>,

        /// Viewport height (defaults to the configured viewport)
        #[arg(long)]
        height: Option<u32>,

        /// Ignore stdin instead of reading resize requests from it
        #[arg(long)]
        no_resize: bool,
    },

    /// Probe a media file and display its video stream
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
