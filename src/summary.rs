use crate::board::{DisplayStat, StatKind, StatsSnapshot};
use chrono::{DateTime, Local};
use colored::{ColoredString, Colorize};
use std::path::Path;

pub struct SummaryPaths<'a> {
    pub(crate) csv: Option<&'a Path>,
    pub(crate) html: Option<&'a Path>,
}

pub struct SummaryContext<'a> {
    pub(crate) tvl_url: &'a str,
    pub(crate) fees_url: &'a str,
    pub(crate) excluded_fee_id: &'a str,
    pub(crate) run_started_at: &'a DateTime<Local>,
    pub(crate) paths: SummaryPaths<'a>,
    pub(crate) snapshot: &'a StatsSnapshot,
}

const HEADER: &str = "====================== Layer 2 Stats ======================";

pub fn print_summary(context: &SummaryContext<'_>) {
    println!();
    print_summary_header(context);
    print_summary_paths(&context.paths);
    println!();
    println!("{}", "Stats".bold().bright_magenta());
    for kind in StatKind::ALL {
        println!(
            "{} {}",
            format!("{:<22}", kind.label()).bright_yellow().bold(),
            colored_stat(context.snapshot.get(kind))
        );
    }
    println!("{}", "=".repeat(HEADER.len()).bright_cyan());
}

fn print_summary_header(context: &SummaryContext<'_>) {
    println!("{}", HEADER.bold().bright_cyan());
    println!(
        "{} {}",
        "Run started".bright_yellow().bold(),
        context
            .run_started_at
            .format("%Y-%m-%d %H:%M:%S %Z")
            .to_string()
            .bright_white()
    );
    println!(
        "{} {} | {}",
        "Sources".bright_yellow().bold(),
        format!("TVL: {}", context.tvl_url).bright_white(),
        format!("Fees: {}", context.fees_url).bright_white()
    );
    println!(
        "{} {} | {}",
        "Settings".bright_yellow().bold(),
        format!("Locale: {}", context.snapshot.locale).bright_white(),
        format!("Fee average excludes: {}", context.excluded_fee_id).bright_white()
    );
}

fn print_summary_paths(paths: &SummaryPaths<'_>) {
    print_path_line("Stats CSV", paths.csv, "not saved (use --save-csv)");
    print_path_line("HTML Report", paths.html, "not saved (use --save-html)");
}

fn print_path_line(label: &str, path: Option<&Path>, hint: &str) {
    let label_colored = label.bright_yellow().bold();
    match path {
        Some(path) => println!(
            "{} {}",
            label_colored,
            format!("{}", path.display()).bright_white()
        ),
        None => println!("{} {}", label_colored, hint.bright_black()),
    }
}

/// One line per board change in watch mode.
pub fn print_watch_line(snapshot: &StatsSnapshot) {
    let prefix = format!("[#{} {}]", snapshot.generation, snapshot.locale);
    let stats = StatKind::ALL
        .iter()
        .map(|&kind| format!("{}: {}", kind.label(), colored_stat(snapshot.get(kind))))
        .collect::<Vec<_>>()
        .join(" | ");
    println!("{} {stats}", prefix.bright_cyan().bold());
}

fn colored_stat(stat: &DisplayStat) -> ColoredString {
    let text = stat.to_string();
    match stat {
        DisplayStat::Loading => text.bright_black(),
        DisplayStat::Ready(_) => text.bright_green().bold(),
        DisplayStat::Failed => text.bright_red(),
    }
}
