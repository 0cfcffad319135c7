use crate::directory::DoctorDirectory;
use crate::domain::{Coordinate, Doctor};
use crate::error::{LocatorError, Result};
use crate::store::{LocationStore, Region};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, warn};

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A zero radius admits only coincident points, within this slack.
pub const COINCIDENT_EPSILON_KM: f64 = 1e-6;

/// Great-circle distance in kilometers via the haversine formula. This is
/// the one distance computation in the crate; every query path uses it so
/// results cannot diverge between backends.
pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

/// Attribute filters applied in conjunction with the radius predicate.
/// `available` and `speciality` are exact matches; `text` is a
/// case-insensitive substring match over name, speciality and about.
#[derive(Debug, Clone, Default)]
pub struct CandidateFilters {
    pub available: Option<bool>,
    pub speciality: Option<String>,
    pub text: Option<String>,
}

impl CandidateFilters {
    pub fn matches(&self, doctor: &Doctor) -> bool {
        if let Some(available) = self.available {
            if doctor.available != available {
                return false;
            }
        }
        if let Some(speciality) = &self.speciality {
            if !doctor.speciality.eq_ignore_ascii_case(speciality) {
                return false;
            }
        }
        if let Some(text) = &self.text {
            let needle = text.to_lowercase();
            let haystack = format!(
                "{} {} {}",
                doctor.name, doctor.speciality, doctor.about
            )
            .to_lowercase();
            if !haystack.contains(&needle) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone)]
pub struct ProximityQuery {
    pub origin: Coordinate,
    pub radius_km: f64,
    pub filters: CandidateFilters,
}

/// One entry of a proximity result: the doctor, where it is, and how far.
#[derive(Debug, Clone)]
pub struct NearbyMatch {
    pub doctor: Doctor,
    pub coordinate: Coordinate,
    pub distance_km: f64,
}

/// The single nearby-search path. Candidates come from whatever
/// [`LocationStore`] backend is plugged in (index-accelerated or full scan);
/// membership, filtering and ordering are decided here, so every entry point
/// returns the same result for the same query.
pub struct ProximityEngine {
    store: Arc<dyn LocationStore>,
    directory: Arc<DoctorDirectory>,
}

impl ProximityEngine {
    pub fn new(store: Arc<dyn LocationStore>, directory: Arc<DoctorDirectory>) -> Self {
        Self { store, directory }
    }

    fn validate(query: &ProximityQuery) -> Result<()> {
        if !query.origin.is_finite() || !query.origin.in_range() {
            return Err(LocatorError::Validation(format!(
                "origin ({}, {}) is out of range",
                query.origin.lat, query.origin.lng
            )));
        }
        if !query.radius_km.is_finite() || query.radius_km < 0.0 {
            return Err(LocatorError::Validation(format!(
                "radius_km {} must be a non-negative number",
                query.radius_km
            )));
        }
        Ok(())
    }

    /// Returns every stored entity within `radius_km` of the origin
    /// (inclusive boundary), with filters applied, sorted ascending by
    /// distance. A zero radius admits only coincident points within
    /// [`COINCIDENT_EPSILON_KM`].
    pub async fn find_within(&self, query: &ProximityQuery) -> Result<Vec<NearbyMatch>> {
        Self::validate(query)?;

        let region = Region::around(
            query.origin,
            query.radius_km.max(COINCIDENT_EPSILON_KM),
        );
        let candidates = self.store.query(&region).await?;
        debug!(
            candidates = candidates.len(),
            radius_km = query.radius_km,
            indexed = self.store.has_spatial_index(),
            "scanning region candidates"
        );

        let mut matches = Vec::new();
        for (entity_id, coordinate) in candidates {
            if !coordinate.is_finite() {
                warn!(%entity_id, "excluding candidate with non-finite coordinate");
                continue;
            }
            let distance_km = haversine_km(query.origin, coordinate);
            let within = if query.radius_km == 0.0 {
                distance_km <= COINCIDENT_EPSILON_KM
            } else {
                distance_km <= query.radius_km
            };
            if !within {
                continue;
            }
            let Some(doctor) = self.directory.get(entity_id) else {
                warn!(%entity_id, "stored location has no doctor record, excluding");
                continue;
            };
            if !query.filters.matches(&doctor) {
                continue;
            }
            matches.push(NearbyMatch {
                doctor,
                coordinate,
                distance_km,
            });
        }

        // The store makes no ordering promise; sort explicitly.
        matches.sort_by(|a, b| {
            a.distance_km
                .partial_cmp(&b.distance_km)
                .unwrap_or(Ordering::Equal)
        });
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(lat: f64, lng: f64) -> Coordinate {
        Coordinate::new(lat, lng).unwrap()
    }

    #[test]
    fn distance_to_self_is_zero() {
        let a = coord(12.823, 80.045);
        assert_eq!(haversine_km(a, a), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = coord(12.823, 80.045);
        let b = coord(13.0827, 80.2707);
        assert!((haversine_km(a, b) - haversine_km(b, a)).abs() < 1e-12);
    }

    #[test]
    fn distance_satisfies_triangle_inequality_for_sample_points() {
        let a = coord(12.823, 80.045);
        let b = coord(13.0827, 80.2707);
        let c = coord(12.9716, 77.5946);
        assert!(haversine_km(a, c) <= haversine_km(a, b) + haversine_km(b, c) + 1e-9);
    }

    #[test]
    fn known_distances_are_in_expected_range() {
        // Campus to a point ~0.25 km away, and toward central Chennai (~34 km).
        let origin = coord(12.823, 80.045);
        let close = haversine_km(origin, coord(12.825, 80.046));
        assert!(close > 0.2 && close < 0.3, "got {close}");
        let far = haversine_km(origin, coord(13.0, 80.3));
        assert!(far > 33.0 && far < 35.0, "got {far}");
    }

    #[test]
    fn filters_match_availability_speciality_and_text() {
        let doctor = Doctor {
            id: None,
            name: "Dr. Meera Nair".to_string(),
            email: "meera@example.com".to_string(),
            password_hash: "x".to_string(),
            speciality: "Dermatologist".to_string(),
            degree: "MBBS, MD".to_string(),
            experience: "6 Years".to_string(),
            about: "Skin and allergy care".to_string(),
            fees: 400.0,
            available: true,
            verified: true,
            address: Default::default(),
            resolution: crate::domain::ResolutionStatus::Resolved,
            location: None,
        };

        assert!(CandidateFilters::default().matches(&doctor));
        assert!(CandidateFilters {
            available: Some(true),
            speciality: Some("dermatologist".to_string()),
            text: Some("allergy".to_string()),
        }
        .matches(&doctor));
        assert!(!CandidateFilters {
            available: Some(false),
            ..Default::default()
        }
        .matches(&doctor));
        assert!(!CandidateFilters {
            text: Some("cardio".to_string()),
            ..Default::default()
        }
        .matches(&doctor));
    }
}
