use crate::domain::Coordinate;
use crate::error::{LocatorError, Result};
use crate::geocoding::{value_to_f64, GeocodeProvider};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// OpenCage forward geocoder. Secondary provider; only configured when an
/// API key is available.
pub struct OpenCageProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenCageProvider {
    pub fn new(base_url: &str, api_key: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait::async_trait]
impl GeocodeProvider for OpenCageProvider {
    fn name(&self) -> &str {
        "opencage"
    }

    async fn lookup(&self, query: &str) -> Result<Option<Coordinate>> {
        let url = format!("{}/geocode/v1/json", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("q", query), ("key", &self.api_key), ("limit", "1")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LocatorError::Provider {
                message: format!("opencage returned {status}"),
            });
        }

        let body: Value = response.json().await?;
        let Some(first) = body["results"].as_array().and_then(|results| results.first()) else {
            debug!(%query, "opencage returned an empty match set");
            return Ok(None);
        };

        let geometry = &first["geometry"];
        let lat = value_to_f64(&geometry["lat"]);
        let lng = value_to_f64(&geometry["lng"]);
        let coordinate = match (lat, lng) {
            (Some(lat), Some(lng)) => Coordinate::new(lat, lng),
            _ => None,
        };
        coordinate
            .ok_or_else(|| LocatorError::Provider {
                message: "opencage match had a malformed coordinate".to_string(),
            })
            .map(Some)
    }
}
