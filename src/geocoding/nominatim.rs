use crate::domain::Coordinate;
use crate::error::{LocatorError, Result};
use crate::geocoding::{value_to_f64, GeocodeProvider};
use reqwest::header::USER_AGENT;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// OpenStreetMap Nominatim search API. Primary provider in the chain; no
/// API key, but a User-Agent header is mandatory per the usage policy.
pub struct NominatimProvider {
    client: reqwest::Client,
    base_url: String,
    user_agent: String,
}

impl NominatimProvider {
    pub fn new(base_url: &str, user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_agent: user_agent.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl GeocodeProvider for NominatimProvider {
    fn name(&self) -> &str {
        "nominatim"
    }

    async fn lookup(&self, query: &str) -> Result<Option<Coordinate>> {
        let url = format!("{}/search", self.base_url);
        let response = self
            .client
            .get(&url)
            .header(USER_AGENT, &self.user_agent)
            .query(&[("format", "json"), ("q", query), ("limit", "1")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LocatorError::Provider {
                message: format!("nominatim returned {status}"),
            });
        }

        let body: Value = response.json().await?;
        let Some(first) = body.as_array().and_then(|matches| matches.first()) else {
            debug!(%query, "nominatim returned an empty match set");
            return Ok(None);
        };

        let lat = value_to_f64(&first["lat"]);
        let lng = value_to_f64(&first["lon"]);
        let coordinate = match (lat, lng) {
            (Some(lat), Some(lng)) => Coordinate::new(lat, lng),
            _ => None,
        };
        coordinate
            .ok_or_else(|| LocatorError::Provider {
                message: "nominatim match had a malformed coordinate".to_string(),
            })
            .map(Some)
    }
}
