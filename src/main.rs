//! Stack Heatmap CLI
//!
//! Converts profiling recordings into self-contained heatmap documents.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use env_logger::Env;
use std::path::PathBuf;

use stack_heatmap::commands::{
    display_version, execute_convert, validate_args, validate_recording_file, ConvertArgs,
};
use stack_heatmap::source::EventKind;
use stack_heatmap::utils::config::{DEFAULT_BUCKET_MS, DEFAULT_TITLE};

/// Stack Heatmap - time-bucketed call-stack heatmaps
#[derive(Parser, Debug)]
#[command(name = "stack-heatmap")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Sample family selectable on the command line
#[derive(Debug, Clone, Copy, ValueEnum)]
enum EventArg {
    Cpu,
    Alloc,
    Lock,
}

impl From<EventArg> for EventKind {
    fn from(arg: EventArg) -> Self {
        match arg {
            EventArg::Cpu => EventKind::Cpu,
            EventArg::Alloc => EventKind::Alloc,
            EventArg::Lock => EventKind::Lock,
        }
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert a recording into a heatmap document
    Convert {
        /// Recording JSON file
        #[arg(short, long)]
        input: PathBuf,

        /// Output path for the HTML document
        #[arg(short, long, default_value = "heatmap.html")]
        output: PathBuf,

        /// Document title
        #[arg(long, default_value = DEFAULT_TITLE)]
        title: String,

        /// Which samples to convert
        #[arg(long, value_enum, default_value_t = EventArg::Cpu)]
        event: EventArg,

        /// Width of a finest-level bucket in milliseconds
        #[arg(long, default_value_t = DEFAULT_BUCKET_MS, env = "STACK_HEATMAP_BUCKET_MS")]
        bucket_ms: u64,

        /// Custom template with ${name} placeholders
        #[arg(long)]
        template: Option<PathBuf>,

        /// Write conversion statistics as JSON to this path
        #[arg(long)]
        stats: Option<PathBuf>,
    },

    /// Validate a recording JSON file
    Validate {
        /// Path to recording JSON file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Display version information
    Version,
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    // Execute command
    match cli.command {
        Commands::Convert {
            input,
            output,
            title,
            event,
            bucket_ms,
            template,
            stats,
        } => {
            let args = ConvertArgs {
                input,
                output,
                title,
                event_kind: event.into(),
                bucket_ms,
                template,
                stats,
            };

            // Validate args first
            validate_args(&args)?;

            execute_convert(args)?;
        }

        Commands::Validate { file } => {
            validate_recording_file(&file)?;
        }

        Commands::Version => {
            display_version();
        }
    }

    Ok(())
}
