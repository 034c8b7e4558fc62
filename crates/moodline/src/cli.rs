//! Command line interface
//!
//! ```text
//! moodline analyze <file> [--json] [--export-segments DIR]
//! moodline classify <file>... [--json] [--workers N]
//! global: --config PATH, --model PATH
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "moodline", version, about = "Classify the emotion of songs from their audio")]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Config file (default: ~/.config/moodline/config.yaml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// ONNX model file (overrides config)
    #[arg(long, global = true, value_name = "PATH")]
    pub model: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Whole-song analysis with a per-chunk emotion timeline
    Analyze {
        file: PathBuf,

        /// Write each emotion segment as a WAV clip into DIR
        #[arg(long, value_name = "DIR")]
        export_segments: Option<PathBuf>,
    },
    /// Library classification grouped by emotion
    Classify {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Worker threads (default: available cores)
        #[arg(long, value_name = "N")]
        workers: Option<usize>,
    },
}
