pub mod l2beat;
pub mod l2fees;

pub use l2beat::{TimeSeriesPoint, Timestamp, parse_tvl_series};
pub use l2fees::{FeeEntry, parse_fee_entries};

use crate::error::StatsError;
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

/// Where the board pulls its raw inputs from.
#[async_trait]
pub trait StatsSource: Send + Sync + 'static {
    async fn fetch_tvl_series(&self) -> Result<Vec<TimeSeriesPoint>, StatsError>;

    async fn fetch_fee_entries(&self) -> Result<Vec<FeeEntry>, StatsError>;
}

#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    tvl_url: String,
    fees_url: String,
}

impl HttpSource {
    pub const fn new(client: Client, tvl_url: String, fees_url: String) -> Self {
        Self {
            client,
            tvl_url,
            fees_url,
        }
    }
}

#[async_trait]
impl StatsSource for HttpSource {
    async fn fetch_tvl_series(&self) -> Result<Vec<TimeSeriesPoint>, StatsError> {
        let body = fetch_bytes(&self.client, &self.tvl_url).await?;
        let series = parse_tvl_series(&body).map_err(|source| StatsError::Parse {
            url: self.tvl_url.clone(),
            source,
        })?;
        if let Some(last) = series.last() {
            debug!(
                url = %self.tvl_url,
                points = series.len(),
                latest = %last.timestamp(),
                "fetched TVL series"
            );
        }
        Ok(series)
    }

    async fn fetch_fee_entries(&self) -> Result<Vec<FeeEntry>, StatsError> {
        let body = fetch_bytes(&self.client, &self.fees_url).await?;
        let entries = parse_fee_entries(&body).map_err(|source| StatsError::Parse {
            url: self.fees_url.clone(),
            source,
        })?;
        debug!(url = %self.fees_url, entries = entries.len(), "fetched fee entries");
        Ok(entries)
    }
}

/// Single GET without retries; non-2xx statuses count as network failures.
pub async fn fetch_bytes(client: &Client, url: &str) -> Result<Vec<u8>, StatsError> {
    let network = |source: reqwest::Error| StatsError::Network {
        url: url.to_string(),
        source,
    };
    let response = client
        .get(url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(network)?;
    let bytes = response.bytes().await.map_err(network)?;
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn http_response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    /// Answers a single request with a canned response and returns the URL to hit.
    async fn serve_once(response: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = [0_u8; 2048];
            let _ = stream.read(&mut request).await;
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        });
        format!("http://{addr}/")
    }

    /// Accepts a connection and never answers it.
    async fn serve_silence() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0_u8; 2048];
            while matches!(stream.read(&mut buf).await, Ok(read) if read > 0) {}
        });
        format!("http://{addr}/")
    }

    fn client(timeout: Duration) -> Client {
        Client::builder()
            .no_proxy()
            .timeout(timeout)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn server_error_status_is_a_network_failure() {
        let url = serve_once(http_response("500 Internal Server Error", "")).await;
        let source = HttpSource::new(client(Duration::from_secs(5)), url.clone(), url);

        let err = source.fetch_tvl_series().await.unwrap_err();
        match err {
            StatsError::Network { source, .. } => {
                assert_eq!(
                    source.status(),
                    Some(reqwest::StatusCode::INTERNAL_SERVER_ERROR)
                );
            }
            other => panic!("expected a network failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unexpected_body_shape_is_a_parse_failure() {
        let tvl_url = serve_once(http_response("200 OK", r#"{"layers2s":1}"#)).await;
        let fees_url = serve_once(http_response("200 OK", r#"{"layers2s":1}"#)).await;
        let source = HttpSource::new(
            client(Duration::from_secs(5)),
            tvl_url.clone(),
            fees_url.clone(),
        );

        let tvl_err = source.fetch_tvl_series().await.unwrap_err();
        assert!(matches!(&tvl_err, StatsError::Parse { url, .. } if *url == tvl_url));

        let fee_err = source.fetch_fee_entries().await.unwrap_err();
        assert!(matches!(&fee_err, StatsError::Parse { url, .. } if *url == fees_url));
    }

    #[tokio::test]
    async fn unanswered_request_times_out_as_network_failure() {
        let url = serve_silence().await;
        let source = HttpSource::new(client(Duration::from_millis(200)), url.clone(), url);

        let err = source.fetch_fee_entries().await.unwrap_err();
        match err {
            StatsError::Network { source, .. } => assert!(source.is_timeout()),
            other => panic!("expected a network failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn well_formed_body_is_parsed() {
        let body = r#"{"data":[{"id":"arbitrum","results":{"feeTransferEth":0.25}}]}"#;
        let url = serve_once(http_response("200 OK", body)).await;
        let source = HttpSource::new(client(Duration::from_secs(5)), url.clone(), url);

        let entries = source.fetch_fee_entries().await.unwrap();
        assert_eq!(
            entries,
            vec![FeeEntry {
                id: "arbitrum".to_string(),
                fee: 0.25
            }]
        );
    }
}
