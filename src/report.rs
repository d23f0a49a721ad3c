use crate::board::{DisplayStat, StatKind, StatsSnapshot};
use crate::write_output_file;
use anyhow::Result;
use chrono::{DateTime, Local};
use std::path::Path;

pub struct HtmlReportContext<'a> {
    pub(crate) tvl_url: &'a str,
    pub(crate) fees_url: &'a str,
    pub(crate) excluded_fee_id: &'a str,
    pub(crate) run_started_at: &'a DateTime<Local>,
    pub(crate) snapshot: &'a StatsSnapshot,
    pub(crate) csv_path: Option<&'a Path>,
    pub(crate) output_path: &'a Path,
}

pub async fn save_html_report(context: &HtmlReportContext<'_>) -> Result<()> {
    let html = render_html_report(context);
    write_output_file(context.output_path, html.as_bytes()).await
}

fn render_html_report(context: &HtmlReportContext<'_>) -> String {
    let snapshot = context.snapshot;
    let lang = escape_html(snapshot.locale.tag());
    let generated_at = escape_html(
        &context
            .run_started_at
            .format("%Y-%m-%d %H:%M:%S %Z")
            .to_string(),
    );
    let cards: String = StatKind::ALL
        .into_iter()
        .map(|kind| render_stat_card(kind, snapshot.get(kind)))
        .collect();

    format!(
        "<!doctype html>\n<html lang=\"{lang}\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Layer 2 Stats</title>\n<style>{REPORT_STYLE}</style>\n</head>\n<body>\n\
         <h1>Layer 2 Stats</h1>\n\
         <p class=\"meta\">Generation {generation} &middot; {lang} &middot; {generated_at}</p>\n\
         <section class=\"cards\">\n{cards}</section>\n\
         {download}\
         <footer>Sources: <a href=\"{tvl}\">TVL</a>, <a href=\"{fees}\">fees</a>. \
         Average fee excludes <code>{excluded}</code>.</footer>\n\
         </body>\n</html>\n",
        generation = snapshot.generation,
        download = render_download(context),
        tvl = escape_html(context.tvl_url),
        fees = escape_html(context.fees_url),
        excluded = escape_html(context.excluded_fee_id),
    )
}

fn render_stat_card(kind: StatKind, stat: &DisplayStat) -> String {
    let class = match stat {
        DisplayStat::Ready(text) if kind == StatKind::PercentChange => trend_class(text),
        DisplayStat::Ready(_) => "ready",
        DisplayStat::Loading => "loading",
        DisplayStat::Failed => "failed",
    };
    format!(
        "<div class=\"card\" data-stat=\"{}\"><div class=\"card-label\">{}</div><div class=\"card-value {class}\">{}</div></div>\n",
        kind.key(),
        escape_html(kind.label()),
        escape_html(&stat.to_string())
    )
}

fn trend_class(text: &str) -> &'static str {
    match text.as_bytes().first() {
        Some(b'+') => "up",
        Some(b'-') => "down",
        _ => "neutral",
    }
}

/// Links the CSV when it sits next to the report, otherwise names it.
fn render_download(context: &HtmlReportContext<'_>) -> String {
    let Some(csv) = context.csv_path else {
        return String::new();
    };
    let shown = escape_html(&csv.display().to_string());
    match sibling_name(context.output_path, csv) {
        Some(name) => format!(
            "<p class=\"download\">CSV: <a href=\"{}\">{shown}</a></p>\n",
            escape_html(name)
        ),
        None => format!("<p class=\"download\">CSV: <code>{shown}</code></p>\n"),
    }
}

fn sibling_name<'a>(html_path: &Path, target: &'a Path) -> Option<&'a str> {
    if html_path.parent() != target.parent() {
        return None;
    }
    target.file_name()?.to_str()
}

fn escape_html(input: &str) -> String {
    input.chars().fold(String::with_capacity(input.len()), |mut out, ch| {
        match html_entity(ch) {
            Some(entity) => out.push_str(entity),
            None => out.push(ch),
        }
        out
    })
}

const fn html_entity(ch: char) -> Option<&'static str> {
    match ch {
        '&' => Some("&amp;"),
        '<' => Some("&lt;"),
        '>' => Some("&gt;"),
        '"' => Some("&quot;"),
        '\'' => Some("&#39;"),
        _ => None,
    }
}

const REPORT_STYLE: &str = "
body { margin: 0 auto; max-width: 880px; padding: 32px 20px; font-family: sans-serif; color: #1f1b16; }
.meta, footer { color: #6b635b; font-size: 13px; }
.cards { display: grid; grid-template-columns: repeat(auto-fit, minmax(220px, 1fr)); gap: 16px; margin: 24px 0; }
.card { border: 1px solid #e2d6c6; border-radius: 14px; padding: 20px; }
.card-label { font-size: 12px; text-transform: uppercase; color: #6b635b; margin-bottom: 8px; }
.card-value { font-size: 30px; font-weight: 600; }
.card-value.up { color: #2f855a; }
.card-value.down, .card-value.failed { color: #c53030; }
.card-value.loading, .card-value.failed { font-size: 18px; }
";
