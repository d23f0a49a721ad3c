use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("request to {url} failed")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected response shape from {url}")]
    Parse {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("insufficient data: {0}")]
    DataInsufficient(#[from] Insufficiency),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum Insufficiency {
    #[error("time series is empty")]
    EmptySeries,
    #[error("time series has {actual} points, at least {required} required")]
    SeriesTooShort { required: usize, actual: usize },
    #[error("no fee entries left after excluding `{excluded}`")]
    EmptyFeeSet { excluded: String },
    #[error("baseline value {baseline} cannot anchor a percent change")]
    UnusableBaseline { baseline: f64 },
    #[error("non-finite value in {field}")]
    NonFinite { field: &'static str },
}

/// Renders an error and every `source()` beneath it on one line.
pub fn describe_error(error: &(dyn std::error::Error + 'static)) -> String {
    let mut pieces: Vec<String> = Vec::new();
    let mut current = Some(error);
    let mut idx = 0;
    while let Some(cause) = current {
        let text = cause.to_string();
        if !text.is_empty() {
            if idx == 0 {
                pieces.push(text);
            } else {
                pieces.push(format!("caused by {text}"));
            }
        }
        current = cause.source();
        idx += 1;
    }

    if pieces.is_empty() {
        format!("{error:?}")
    } else {
        pieces.join(" | ")
    }
}
