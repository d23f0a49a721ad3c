use serde::Deserialize;
use std::fmt;

/// Point timestamp as shipped by the provider: ISO-ish text or unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Unix(i64),
    Text(String),
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix(seconds) => write!(f, "{seconds}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// `(timestamp, usd, eth)` row of the daily chart, oldest first.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TimeSeriesPoint(pub Timestamp, pub f64, pub f64);

impl TimeSeriesPoint {
    pub const fn timestamp(&self) -> &Timestamp {
        &self.0
    }

    pub const fn value(&self) -> f64 {
        self.1
    }
}

#[derive(Debug, Deserialize)]
struct TvlPayload {
    layers2s: ChartGroup,
}

#[derive(Debug, Deserialize)]
struct ChartGroup {
    daily: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    data: Vec<TimeSeriesPoint>,
}

pub fn parse_tvl_series(body: &[u8]) -> Result<Vec<TimeSeriesPoint>, serde_json::Error> {
    let payload: TvlPayload = serde_json::from_slice(body)?;
    Ok(payload.layers2s.daily.data)
}
