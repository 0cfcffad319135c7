pub mod nominatim;
pub mod opencage;

use crate::config::GeocodingConfig;
use crate::domain::{Address, Coordinate, GeocodeSource};
use crate::error::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

// Characters that would corrupt a comma-joined query string.
static FIELD_STRIP: Lazy<Regex> = Lazy::new(|| Regex::new(r#"["',]+"#).unwrap());
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static COMMA_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*,[\s,]*").unwrap());

fn clean_field(raw: &str) -> String {
    let stripped = FIELD_STRIP.replace_all(raw, " ");
    WHITESPACE_RUN.replace_all(stripped.trim(), " ").into_owned()
}

/// Joins the address fields into one geocoder query string, in fixed
/// line1 -> line2 -> city -> state -> country order. Empty fields are
/// skipped; an entirely empty address yields the empty string.
pub fn normalize_address(address: &Address) -> String {
    let fields = [
        &address.line1,
        &address.line2,
        &address.city,
        &address.state,
        &address.country,
    ];
    let parts: Vec<String> = fields
        .into_iter()
        .flatten()
        .map(|field| clean_field(field))
        .filter(|part| !part.is_empty())
        .collect();
    parts.join(", ")
}

/// Cleans a free-text query: collapses repeated commas and whitespace and
/// trims the ends. Idempotent, so normalizing an already-normalized string
/// returns it unchanged.
pub fn normalize_query(raw: &str) -> String {
    let collapsed = COMMA_RUN.replace_all(raw, ", ");
    let collapsed = WHITESPACE_RUN.replace_all(&collapsed, " ");
    collapsed
        .trim_matches(|c: char| c == ',' || c.is_whitespace())
        .to_string()
}

/// Reads a numeric field that some providers encode as a JSON string
/// (Nominatim returns `"lat": "12.82"`).
pub(crate) fn value_to_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// A single external geocoding service. Implementations return at most one
/// best match per query and surface their own failures as errors; the
/// resolver turns those into fallthrough.
#[async_trait::async_trait]
pub trait GeocodeProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Resolve `query` to its best-match coordinate, or `None` when the
    /// provider answered successfully but found nothing.
    async fn lookup(&self, query: &str) -> Result<Option<Coordinate>>;
}

/// Outcome of a resolve call. Total: there is always a coordinate, and the
/// source tag keeps a degraded default distinguishable from a provider match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeocodeOutcome {
    pub coordinate: Coordinate,
    pub source: GeocodeSource,
}

struct CacheEntry {
    outcome: GeocodeOutcome,
    cached_at: Instant,
}

/// Resolves a query string through an ordered provider chain. Each provider
/// call is bounded by its own timeout; network errors, bad responses, empty
/// match sets and timeouts all fall through to the next provider. Exhaustion
/// (or an empty query) yields the configured default coordinate tagged
/// `GeocodeSource::Default`. Never returns an error.
pub struct GeocodeResolver {
    providers: Vec<Box<dyn GeocodeProvider>>,
    timeout: Duration,
    default_coordinate: Coordinate,
    cache_ttl: Duration,
    cache: Mutex<HashMap<String, CacheEntry>>,
}

impl GeocodeResolver {
    pub fn new(
        providers: Vec<Box<dyn GeocodeProvider>>,
        timeout: Duration,
        default_coordinate: Coordinate,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            providers,
            timeout,
            default_coordinate,
            cache_ttl,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Builds the production chain: Nominatim first, OpenCage second when an
    /// `OPENCAGE_API_KEY` is present in the environment.
    pub fn from_config(config: &GeocodingConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_seconds);
        let mut providers: Vec<Box<dyn GeocodeProvider>> = vec![Box::new(
            nominatim::NominatimProvider::new(&config.nominatim_url, &config.user_agent, timeout)?,
        )];
        if let Ok(key) = std::env::var("OPENCAGE_API_KEY") {
            if !key.is_empty() {
                providers.push(Box::new(opencage::OpenCageProvider::new(
                    &config.opencage_url,
                    key,
                    timeout,
                )?));
            }
        }
        Ok(Self::new(
            providers,
            timeout,
            config.default_coordinate()?,
            Duration::from_secs(config.cache_ttl_seconds),
        ))
    }

    fn default_outcome(&self) -> GeocodeOutcome {
        GeocodeOutcome {
            coordinate: self.default_coordinate,
            source: GeocodeSource::Default,
        }
    }

    fn cached(&self, query: &str) -> Option<GeocodeOutcome> {
        if self.cache_ttl.is_zero() {
            return None;
        }
        let cache = self.cache.lock().unwrap();
        cache
            .get(query)
            .filter(|entry| entry.cached_at.elapsed() < self.cache_ttl)
            .map(|entry| entry.outcome.clone())
    }

    fn remember(&self, query: &str, outcome: &GeocodeOutcome) {
        if self.cache_ttl.is_zero() {
            return;
        }
        let mut cache = self.cache.lock().unwrap();
        cache.insert(
            query.to_string(),
            CacheEntry {
                outcome: outcome.clone(),
                cached_at: Instant::now(),
            },
        );
    }

    /// Resolves `raw_query` to a coordinate. Total function: provider
    /// failures are logged and recovered internally, never surfaced.
    pub async fn resolve(&self, raw_query: &str) -> GeocodeOutcome {
        let query = normalize_query(raw_query);
        if query.is_empty() {
            debug!("empty query, skipping providers");
            return self.default_outcome();
        }

        if let Some(outcome) = self.cached(&query) {
            debug!(%query, "geocode cache hit");
            return outcome;
        }

        for provider in &self.providers {
            match tokio::time::timeout(self.timeout, provider.lookup(&query)).await {
                Ok(Ok(Some(coordinate))) if coordinate.is_finite() && coordinate.in_range() => {
                    info!(
                        provider = provider.name(),
                        lat = coordinate.lat,
                        lng = coordinate.lng,
                        %query,
                        "geocode match"
                    );
                    let outcome = GeocodeOutcome {
                        coordinate,
                        source: GeocodeSource::Provider(provider.name().to_string()),
                    };
                    self.remember(&query, &outcome);
                    return outcome;
                }
                Ok(Ok(Some(coordinate))) => {
                    warn!(
                        provider = provider.name(),
                        lat = coordinate.lat,
                        lng = coordinate.lng,
                        %query,
                        "provider returned an out-of-range coordinate, trying next"
                    );
                }
                Ok(Ok(None)) => {
                    warn!(provider = provider.name(), %query, "no match, trying next provider");
                }
                Ok(Err(e)) => {
                    warn!(provider = provider.name(), %query, error = %e, "provider failed, trying next");
                }
                Err(_) => {
                    warn!(
                        provider = provider.name(),
                        %query,
                        timeout_secs = self.timeout.as_secs(),
                        "provider timed out, trying next"
                    );
                }
            }
        }

        warn!(%query, "all providers exhausted, using default coordinate");
        // Defaults are deliberately not cached so a recovering provider is
        // retried on the next identical query.
        self.default_outcome()
    }
}
