use anyhow::Result;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::time::Duration;

const TICK_INTERVAL: Duration = Duration::from_millis(120);
const ASCII_TICKS: &str = "-\\|/ ";

#[derive(Clone, Copy)]
pub enum Stage {
    Fetch,
    Save,
}

impl Stage {
    const fn verb(self) -> &'static str {
        match self {
            Self::Fetch => "Fetching",
            Self::Save => "Saving",
        }
    }
}

/// Spinner settings shared by every stage of a run.
pub struct Progress {
    style: ProgressStyle,
    /// Clear finished spinners instead of leaving a status line behind.
    transient: bool,
}

impl Progress {
    pub(crate) fn new(transient: bool) -> Self {
        let style =
            ProgressStyle::with_template("{spinner:.cyan.bold} {prefix:.yellow.bold} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
        let style = if is_dumb_term() {
            style.tick_chars(ASCII_TICKS)
        } else {
            style
        };
        Self { style, transient }
    }

    fn start(&self, stage: Stage, label: &str) -> ProgressBar {
        let bar = ProgressBar::new_spinner()
            .with_style(self.style.clone())
            .with_prefix(stage.verb())
            .with_message(label.to_string());
        bar.enable_steady_tick(TICK_INTERVAL);
        bar
    }

    fn finish(&self, bar: &ProgressBar, label: &str, succeeded: bool) {
        if self.transient {
            bar.finish_and_clear();
            return;
        }
        let outcome = if succeeded {
            "done".bright_green().bold()
        } else {
            "failed".bright_red().bold()
        };
        bar.finish_with_message(format!(
            "{label} {outcome} {}",
            elapsed_note(bar.elapsed()).bright_black()
        ));
    }
}

fn is_dumb_term() -> bool {
    std::env::var("TERM").is_ok_and(|term| term.eq_ignore_ascii_case("dumb"))
}

fn elapsed_note(elapsed: Duration) -> String {
    format!("({:.1}s)", elapsed.as_secs_f64())
}

/// Awaits `fut`, showing a spinner for `stage` while it runs when `progress` is set.
pub async fn track<T>(
    progress: Option<&Progress>,
    stage: Stage,
    label: &str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    let Some(progress) = progress else {
        return fut.await;
    };
    let bar = progress.start(stage, label);
    let result = fut.await;
    progress.finish(&bar, label, result.is_ok());
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_note_rounds_to_tenths() {
        assert_eq!(elapsed_note(Duration::from_millis(1_260)), "(1.3s)");
        assert_eq!(elapsed_note(Duration::ZERO), "(0.0s)");
    }

    #[tokio::test]
    async fn track_passes_result_through() {
        let progress = Progress::new(true);
        let value = track(Some(&progress), Stage::Fetch, "test", async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);

        let err = track(None, Stage::Save, "test", async {
            Err::<(), _>(anyhow::anyhow!("disk full"))
        })
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "disk full");
    }
}
