use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct FeeEntry {
    pub id: String,
    pub fee: f64,
}

#[derive(Debug, Deserialize)]
struct FeePayload {
    data: Vec<FeeRecord>,
}

#[derive(Debug, Deserialize)]
struct FeeRecord {
    id: String,
    results: FeeResults,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeeResults {
    #[serde(default)]
    fee_transfer_eth: Option<f64>,
}

/// Networks that report no transfer fee are dropped rather than averaged in.
pub fn parse_fee_entries(body: &[u8]) -> Result<Vec<FeeEntry>, serde_json::Error> {
    let payload: FeePayload = serde_json::from_slice(body)?;
    let entries = payload
        .data
        .into_iter()
        .filter_map(|record| match record.results.fee_transfer_eth {
            Some(fee) => Some(FeeEntry {
                id: record.id,
                fee,
            }),
            None => {
                debug!(id = %record.id, "fee entry has no transfer fee, skipping");
                None
            }
        })
        .collect();
    Ok(entries)
}
