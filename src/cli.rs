use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate, generate_to};
use tracing::info;

use crate::formatting::Locale;
use crate::stats::DEFAULT_EXCLUDED_FEE_ID;

pub const DEFAULT_TVL_URL: &str = "https://api.l2beat.com/api/tvl";
pub const DEFAULT_FEES_URL: &str = "https://l2fees.info/api/feeData";
pub const DEFAULT_CSV_PATH: &str = "data/output/l2_stats.csv";
pub const DEFAULT_HTML_PATH: &str = "data/output/l2_stats.html";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 20;

pub const SAVE_CSV_HELP: &str = "Save the derived stats to the given CSV file (defaults to data/output/l2_stats.csv when no path is provided). Use --archive-csv to store a .gz instead.";
pub const SAVE_HTML_HELP: &str = "Save an HTML page with the stat boxes to the given file (defaults to data/output/l2_stats.html when no path is provided).";
pub const ARCHIVE_CSV_HELP: &str = "Archive the saved CSV output into a .gz file.";

#[derive(Debug, Parser)]
#[command(
    name = "l2stats",
    about = "Fetch layer 2 TVL and fee data (L2BEAT, L2Fees) and derive TVL, 30 day TVL change and average transfer fee.",
    version = env!("CARGO_PKG_VERSION")
)]
pub struct Cli {
    #[arg(
        long,
        env = "L2STATS_LOCALE",
        default_value = "en-US",
        help = "Locale used to format currency values (en-US, de-DE, fr-FR, es-ES, ru-RU)."
    )]
    pub locale: Locale,
    #[arg(
        long,
        value_name = "URL",
        env = "L2STATS_TVL_URL",
        default_value = DEFAULT_TVL_URL,
        help = "Endpoint serving the aggregated TVL time series."
    )]
    pub tvl_url: String,
    #[arg(
        long,
        value_name = "URL",
        env = "L2STATS_FEES_URL",
        default_value = DEFAULT_FEES_URL,
        help = "Endpoint serving per-network fee statistics."
    )]
    pub fees_url: String,
    #[arg(
        long,
        value_name = "ID",
        default_value = DEFAULT_EXCLUDED_FEE_ID,
        help = "Network id left out of the average fee."
    )]
    pub exclude_fee_id: String,
    #[arg(
        long,
        value_name = "SECONDS",
        default_value_t = DEFAULT_TIMEOUT_SECONDS,
        help = "Per-request HTTP timeout."
    )]
    pub timeout: u64,
    #[arg(
        long,
        value_name = "FILE",
        num_args = 0..=1,
        default_missing_value = DEFAULT_CSV_PATH,
        help = SAVE_CSV_HELP
    )]
    pub save_csv: Option<PathBuf>,
    #[arg(long, help = ARCHIVE_CSV_HELP)]
    pub archive_csv: bool,
    #[arg(
        long,
        value_name = "FILE",
        num_args = 0..=1,
        default_missing_value = DEFAULT_HTML_PATH,
        help = SAVE_HTML_HELP
    )]
    pub save_html: Option<PathBuf>,
    #[arg(long, help = "Print the stats as JSON instead of the colored summary.")]
    pub json: bool,
    #[arg(long, help = "Disable progress spinner output.")]
    pub no_progress: bool,
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate shell completion scripts, optionally installing them for the current user.
    Completions(CompletionArgs),
    /// Keep the stats on screen and re-fetch whenever a locale code is entered on stdin.
    /// An empty line re-fetches with the current locale, `q` quits.
    Watch,
}

#[derive(Debug, Args)]
pub struct CompletionArgs {
    #[arg(value_enum, help = "Shell to generate completions for.")]
    shell: Shell,
    #[arg(
        long,
        value_name = "DIR",
        help = "Directory to write the completion script to."
    )]
    output_dir: Option<PathBuf>,
    #[arg(
        long,
        help = "Install the completion script into the default location for the selected shell."
    )]
    install: bool,
}

impl CompletionArgs {
    /// `None` means the script goes to stdout.
    fn target_dir(&self) -> Result<Option<PathBuf>> {
        match (&self.output_dir, self.install) {
            (Some(dir), _) => Ok(Some(dir.clone())),
            (None, true) => user_completion_dir(self.shell).map(Some),
            (None, false) => Ok(None),
        }
    }
}

pub fn generate_completions(args: &CompletionArgs) -> Result<()> {
    let mut command = Cli::command();
    let name = command.get_name().to_string();

    let Some(dir) = args.target_dir()? else {
        let mut stdout = io::stdout().lock();
        generate(args.shell, &mut command, name, &mut stdout);
        return stdout.flush().context("failed to flush completion script");
    };

    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    let script = generate_to(args.shell, &mut command, name, &dir)
        .with_context(|| format!("failed to write {:?} completions", args.shell))?;
    info!(shell = ?args.shell, path = %script.display(), "installed shell completions");
    Ok(())
}

/// Per-user completion directory for shells that have a conventional one.
fn user_completion_dir(shell: Shell) -> Result<PathBuf> {
    let relative = match shell {
        Shell::Bash => ".local/share/bash-completion/completions",
        Shell::Fish => ".config/fish/completions",
        Shell::Zsh => ".local/share/zsh/site-functions",
        other => bail!("{other:?} has no per-user completion directory, pass --output-dir"),
    };
    let home = std::env::var_os("HOME").context("HOME is not set, pass --output-dir")?;
    Ok(PathBuf::from(home).join(relative))
}
