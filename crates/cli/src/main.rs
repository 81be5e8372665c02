// tvmerge - merge program guides from several sources onto a local lineup

mod exit_codes;
mod fetch;
mod logging;
mod playlist;
mod run;
mod tools;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use exit_codes::{EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "tvmerge")]
#[command(about = "Build an XMLTV guide for a local channel lineup from several EPG sources")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every source and write the lite and full guides
    #[command(after_help = "\
Examples:
  tvmerge run tvmerge.toml
  tvmerge run tvmerge.toml --out-dir /srv/epg --json > report.json
  TVMERGE_LOG=debug tvmerge run tvmerge.toml --lite-only")]
    Run {
        /// Path to the TOML config file
        config: PathBuf,

        /// Directory for guides and reports (default: the config's directory)
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Skip writing the full guide
        #[arg(long)]
        lite_only: bool,

        /// Print the run report as JSON to stdout
        #[arg(long)]
        json: bool,

        /// Run log file (default: output.run_log from the config)
        #[arg(long, env = "TVMERGE_RUN_LOG")]
        log: Option<PathBuf>,

        /// Debug logging
        #[arg(long, short = 'v')]
        verbose: bool,
    },

    /// Check a config file without fetching anything
    #[command(after_help = "\
Examples:
  tvmerge validate tvmerge.toml")]
    Validate {
        /// Path to the TOML config file
        config: PathBuf,
    },

    /// Write an M3U playlist for the lineup without fetching guides
    #[command(after_help = "\
Examples:
  tvmerge m3u tvmerge.toml
  tvmerge m3u tvmerge.toml --out /srv/iptv/playlist.m3u")]
    M3u {
        /// Path to the TOML config file
        config: PathBuf,

        /// Output file (default: m3u.output from the config)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Debug logging
        #[arg(long, short = 'v')]
        verbose: bool,
    },

    /// Show how channel names are normalized before matching
    #[command(after_help = "\
Examples:
  tvmerge normalize 'CCTV-1 综合 4K' '爱上4K'
  tvmerge normalize --config tvmerge.toml 'CCTV5+ 超清'")]
    Normalize {
        /// Channel names
        #[arg(required = true)]
        names: Vec<String>,

        /// Use the matching rules from this config instead of the defaults
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Convert an XMLTV guide (plain or gzipped) to DIYP player JSON
    #[command(after_help = "\
Examples:
  tvmerge diyp epg.xml.gz
  tvmerge diyp epg.xml --ch cctv1")]
    Diyp {
        /// XMLTV file
        xml: PathBuf,

        /// Keep channels whose name or id contains this (case-insensitive)
        #[arg(long)]
        ch: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { config, out_dir, lite_only, json, log, verbose } => {
            run::cmd_run(run::RunOptions { config, out_dir, lite_only, json, log, verbose })
        }
        Commands::Validate { config } => run::cmd_validate(config),
        Commands::M3u { config, out, verbose } => playlist::cmd_m3u(config, out, verbose),
        Commands::Normalize { names, config } => tools::cmd_normalize(names, config),
        Commands::Diyp { xml, ch } => tools::cmd_diyp(xml, ch),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
