use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Structured postal address as captured when a doctor registers.
/// Any or all fields may be absent; normalization handles the gaps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

/// A WGS84 latitude/longitude pair in degrees. Value type, immutable once
/// produced; the scalar pair is the sole source of truth for an entity's
/// position (any geometry projection is derived from it).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    /// Builds a coordinate, rejecting non-finite or out-of-range values.
    pub fn new(lat: f64, lng: f64) -> Option<Self> {
        let candidate = Self { lat, lng };
        if candidate.is_finite() && candidate.in_range() {
            Some(candidate)
        } else {
            None
        }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }

    pub fn in_range(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }
}

/// GeoJSON-style point derived from a [`Coordinate`] for spatial indexing.
/// Coordinates are ordered longitude first, matching geometry-typed index
/// backends. Never settable independently: always recomputed from the
/// coordinate on write and verified against it on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(rename = "type")]
    pub kind: String,
    /// `[lng, lat]`
    pub coordinates: [f64; 2],
}

/// Tolerance used when checking that a stored projection still matches the
/// coordinate it was derived from.
pub const PROJECTION_TOLERANCE: f64 = 1e-9;

impl GeoPoint {
    pub fn from_coordinate(coordinate: Coordinate) -> Self {
        Self {
            kind: "Point".to_string(),
            coordinates: [coordinate.lng, coordinate.lat],
        }
    }

    /// True when this projection equals the one derived from `coordinate`
    /// within [`PROJECTION_TOLERANCE`].
    pub fn matches(&self, coordinate: Coordinate) -> bool {
        self.kind == "Point"
            && (self.coordinates[0] - coordinate.lng).abs() <= PROJECTION_TOLERANCE
            && (self.coordinates[1] - coordinate.lat).abs() <= PROJECTION_TOLERANCE
    }
}

/// Where a resolved coordinate came from. `Default` marks a degraded result
/// (no provider produced a match); it must never be conflated with a genuine
/// provider hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeocodeSource {
    Provider(String),
    Default,
}

impl GeocodeSource {
    pub fn is_default(&self) -> bool {
        matches!(self, GeocodeSource::Default)
    }
}

/// The resolved position of one entity, one-to-one with the doctor it
/// locates. Created when an address first resolves, replaced wholesale on
/// re-geocode, removed only with the owning entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLocation {
    pub entity_id: Uuid,
    pub coordinate: Coordinate,
    pub source: GeocodeSource,
    pub resolved_at: chrono::DateTime<chrono::Utc>,
}

/// Lifecycle of an entity's address resolution. Registration starts at
/// `Pending`; geocoding moves it to `Resolved` on a provider match or
/// `Unresolved` when the chain was exhausted and the default coordinate was
/// recorded instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    Pending,
    Resolved,
    Unresolved,
}

/// A doctor profile as held by the directory. `password_hash` and `email`
/// are credential fields and never leave the core (see the projector).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Option<Uuid>,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub speciality: String,
    pub degree: String,
    pub experience: String,
    pub about: String,
    pub fees: f64,
    pub available: bool,
    pub verified: bool,
    pub address: Address,
    pub resolution: ResolutionStatus,
    /// Present once geocoding has run (also for `Unresolved`, where it
    /// carries the default coordinate tagged as such).
    pub location: Option<ResolvedLocation>,
}
