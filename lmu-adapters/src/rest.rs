//! Vehicle metadata over the game's REST API
//!
//! The game exposes a single bulk endpoint listing every vehicle in the
//! current content set; there is no per-vehicle lookup.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use lmu_core::model::VehicleRecord;
use lmu_core::VehicleSource;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Build the bulk vehicle URL for a host and REST port
pub fn vehicles_url(host: &str, port: u16) -> String {
    format!("http://{}:{}/rest/sessions/getAllVehicles", host, port)
}

/// `VehicleSource` backed by `GET /rest/sessions/getAllVehicles`
pub struct RestVehicleSource {
    url: String,
    client: reqwest::Client,
}

impl RestVehicleSource {
    pub fn new(url: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { url, client })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl VehicleSource for RestVehicleSource {
    async fn fetch_all(&self) -> Result<Vec<VehicleRecord>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("GET request error: {}", self.url))?;

        let status = response.status();
        if !status.is_success() {
            bail!("invalid response status: {}", status);
        }

        let body = response.text().await.context("response read error")?;
        parse_vehicles(&body)
    }
}

/// Decode the bulk vehicle list
pub fn parse_vehicles(body: &str) -> Result<Vec<VehicleRecord>> {
    serde_json::from_str(body).context("JSON decode error")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vehicles_url() {
        assert_eq!(
            vehicles_url("192.168.1.20", 6397),
            "http://192.168.1.20:6397/rest/sessions/getAllVehicles"
        );
    }

    #[test]
    fn test_parse_vehicles() {
        let body = r#"[
            {"id": "TOY_GR010_7", "fullPathTree": "Hypercar, Toyota, Toyota GR010, #7", "number": "7", "classes": ["Hypercar"]},
            {"id": "FER_499P_51", "fullPathTree": "Hypercar, Ferrari, Ferrari 499P, #51", "number": "51"}
        ]"#;
        let vehicles = parse_vehicles(body).unwrap();
        assert_eq!(vehicles.len(), 2);
        assert_eq!(vehicles[0].id, "TOY_GR010_7");
        assert_eq!(vehicles[1].to_info().model, "Ferrari 499P");
    }

    #[test]
    fn test_parse_vehicles_rejects_non_array() {
        assert!(parse_vehicles(r#"{"error": "not in session"}"#).is_err());
    }

    #[tokio::test]
    async fn test_fetch_from_unreachable_host_fails() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let source = RestVehicleSource::new(vehicles_url("127.0.0.1", port)).unwrap();
        assert!(source.fetch_all().await.is_err());
    }
}
