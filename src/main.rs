use crate::board::{StatKind, StatsBoard, StatsSnapshot};
use crate::cli::{Cli, Commands};
use crate::formatting::Locale;
use crate::progress::{Progress, Stage, track};
use crate::report::{HtmlReportContext, save_html_report};
use crate::sources::{HttpSource, StatsSource};
use crate::summary::{SummaryContext, SummaryPaths, print_summary, print_watch_line};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::Parser;
use csv::Writer;
use flate2::Compression;
use flate2::write::GzEncoder;
use reqwest::Client;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod board;
mod cli;
mod error;
mod formatting;
mod progress;
mod report;
mod sources;
mod stats;
mod summary;

const USER_AGENT: &str = concat!("l2stats/", env!("CARGO_PKG_VERSION"));

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    colored::control::set_override(true);

    let mut cli = Cli::parse();

    let watch = match cli.command.take() {
        Some(Commands::Completions(args)) => return crate::cli::generate_completions(&args),
        Some(Commands::Watch) => true,
        None => false,
    };

    let client = Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(cli.timeout))
        .build()
        .context("failed to build HTTP client")?;
    let source = HttpSource::new(client, cli.tvl_url.clone(), cli.fees_url.clone());
    let board = StatsBoard::new(source, &cli.exclude_fee_id, cli.locale);

    if watch {
        run_watch(board, cli.locale).await
    } else {
        run_once(board, &cli).await
    }
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run_once<S: StatsSource>(mut board: StatsBoard<S>, cli: &Cli) -> Result<()> {
    let run_started_at = Local::now();
    // JSON output stays clean of finished spinner lines.
    let progress = (!cli.no_progress).then(|| Progress::new(cli.json));

    board.refresh(cli.locale);
    let snapshot = track(progress.as_ref(), Stage::Fetch, "L2BEAT + L2Fees", async {
        board.settle().await;
        Ok(board.snapshot())
    })
    .await?;

    let csv_path = cli
        .save_csv
        .as_deref()
        .map(|path| saved_csv_path(path, cli.archive_csv));
    if let Some(path) = csv_path.as_deref() {
        track(
            progress.as_ref(),
            Stage::Save,
            "CSV",
            save_stats_csv(path, &snapshot, &run_started_at, cli.archive_csv),
        )
        .await?;
    }

    if let Some(path) = cli.save_html.as_deref() {
        let context = HtmlReportContext {
            tvl_url: &cli.tvl_url,
            fees_url: &cli.fees_url,
            excluded_fee_id: &cli.exclude_fee_id,
            run_started_at: &run_started_at,
            snapshot: &snapshot,
            csv_path: csv_path.as_deref(),
            output_path: path,
        };
        track(progress.as_ref(), Stage::Save, "HTML", save_html_report(&context)).await?;
    }

    if cli.json {
        let rendered =
            serde_json::to_string_pretty(&snapshot).context("failed to serialize stats")?;
        println!("{rendered}");
    } else {
        print_summary(&SummaryContext {
            tvl_url: &cli.tvl_url,
            fees_url: &cli.fees_url,
            excluded_fee_id: &cli.exclude_fee_id,
            run_started_at: &run_started_at,
            paths: SummaryPaths {
                csv: csv_path.as_deref(),
                html: cli.save_html.as_deref(),
            },
            snapshot: &snapshot,
        });
    }

    Ok(())
}

async fn run_watch<S: StatsSource>(mut board: StatsBoard<S>, mut locale: Locale) -> Result<()> {
    let mut view = board.subscribe();
    let printer = tokio::spawn(async move {
        let mut last_printed: Option<StatsSnapshot> = None;
        while view.changed().await.is_ok() {
            if let Some(snapshot) = view.snapshot()
                && snapshot.is_settled()
                && last_printed.as_ref() != Some(&snapshot)
            {
                print_watch_line(&snapshot);
                last_printed = Some(snapshot);
            }
        }
    });

    info!("enter a locale to re-fetch, an empty line to refresh, `q` to quit");
    board.refresh(locale);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines
        .next_line()
        .await
        .context("failed to read from stdin")?
    {
        let input = line.trim();
        if matches!(input, "q" | "quit" | "exit") {
            break;
        }
        if !input.is_empty() {
            match input.parse::<Locale>() {
                Ok(next) => locale = next,
                Err(err) => {
                    warn!(error = %err, "ignoring input");
                    continue;
                }
            }
        }
        board.refresh(locale);
    }

    board.settle().await;
    drop(board);
    printer.await.context("watch printer task failed")?;
    Ok(())
}

pub(crate) async fn write_output_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    fs::write(path, bytes)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;

    Ok(())
}

#[derive(Debug, Serialize)]
struct CsvRecord<'a> {
    generated_at: &'a str,
    generation: u64,
    locale: Locale,
    stat: &'static str,
    state: &'static str,
    value: String,
}

fn saved_csv_path(path: &Path, archive: bool) -> PathBuf {
    if !archive {
        return path.to_path_buf();
    }
    let mut archived = path.as_os_str().to_owned();
    archived.push(".gz");
    PathBuf::from(archived)
}

async fn save_stats_csv(
    path: &Path,
    snapshot: &StatsSnapshot,
    generated_at: &DateTime<Local>,
    archive: bool,
) -> Result<()> {
    let serialized = serialize_stats(snapshot, generated_at)?;
    let bytes = if archive {
        gzip(&serialized)?
    } else {
        serialized
    };
    write_output_file(path, &bytes).await
}

fn serialize_stats(snapshot: &StatsSnapshot, generated_at: &DateTime<Local>) -> Result<Vec<u8>> {
    let generated_at = generated_at.to_rfc3339();
    let mut writer = Writer::from_writer(Vec::new());
    for kind in StatKind::ALL {
        let stat = snapshot.get(kind);
        writer
            .serialize(CsvRecord {
                generated_at: &generated_at,
                generation: snapshot.generation,
                locale: snapshot.locale,
                stat: kind.key(),
                state: stat.state(),
                value: stat.to_string(),
            })
            .context("failed to serialize stats record")?;
    }
    finalize_writer(writer, "stats CSV writer")
}

fn finalize_writer(mut writer: Writer<Vec<u8>>, label: &str) -> Result<Vec<u8>> {
    writer
        .flush()
        .with_context(|| format!("failed to flush {label}"))?;
    writer
        .into_inner()
        .with_context(|| format!("failed to finalize {label}"))
}

fn gzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(bytes)
        .context("failed to compress CSV output")?;
    encoder.finish().context("failed to finish CSV archive")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::DisplayStat;
    use chrono::TimeZone;
    use flate2::read::GzDecoder;
    use std::io::Read;

    fn snapshot() -> StatsSnapshot {
        StatsSnapshot {
            generation: 3,
            locale: Locale::DeDe,
            tvl: DisplayStat::Ready("12,3\u{a0}Mrd.\u{a0}$".to_string()),
            percent_change: DisplayStat::Ready("+1.50%".to_string()),
            average_fee: DisplayStat::Failed,
        }
    }

    #[test]
    fn stats_csv_has_one_row_per_stat() {
        let generated_at = Local.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let bytes = serialize_stats(&snapshot(), &generated_at).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "generated_at,generation,locale,stat,state,value");
        assert!(lines[1].ends_with(",3,de-DE,tvl,ready,\"12,3\u{a0}Mrd.\u{a0}$\""));
        assert!(lines[2].ends_with(",percent_change,ready,+1.50%"));
        assert!(lines[3].ends_with(",average_fee,failed,Unable to load data"));
    }

    #[test]
    fn archived_csv_path_gets_gz_suffix() {
        let path = Path::new("data/output/l2_stats.csv");
        assert_eq!(saved_csv_path(path, false), PathBuf::from("data/output/l2_stats.csv"));
        assert_eq!(
            saved_csv_path(path, true),
            PathBuf::from("data/output/l2_stats.csv.gz")
        );
    }

    #[test]
    fn gzip_output_decompresses_to_input() {
        let compressed = gzip(b"stat,value\ntvl,$1.0M\n").unwrap();
        let mut decoded = String::new();
        GzDecoder::new(compressed.as_slice())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, "stat,value\ntvl,$1.0M\n");
    }
}
