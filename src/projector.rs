use crate::domain::{Address, ResolutionStatus};
use crate::proximity::NearbyMatch;
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

/// Externally safe view of a nearby doctor. Credential fields (email,
/// password hash) are stripped by construction: this struct simply has no
/// place to put them.
#[derive(Debug, Clone, Serialize)]
pub struct DoctorView {
    pub id: Uuid,
    pub name: String,
    pub speciality: String,
    pub degree: String,
    pub experience: String,
    pub about: String,
    pub fees: f64,
    pub available: bool,
    pub verified: bool,
    pub address: Address,
    pub resolution: ResolutionStatus,
    pub lat: f64,
    pub lng: f64,
    pub distance_km: f64,
}

/// Shapes engine matches for external consumption. Fails closed: a
/// candidate whose coordinate or distance is not a finite number is dropped
/// rather than handed to a rendering layer as invalid data. Input order is
/// preserved.
pub fn project(matches: Vec<NearbyMatch>) -> Vec<DoctorView> {
    let mut views = Vec::with_capacity(matches.len());
    for m in matches {
        let Some(id) = m.doctor.id else {
            warn!("dropping candidate without an id");
            continue;
        };
        if !m.coordinate.is_finite() || !m.distance_km.is_finite() {
            warn!(%id, "dropping candidate with non-finite coordinate");
            continue;
        }
        views.push(DoctorView {
            id,
            name: m.doctor.name,
            speciality: m.doctor.speciality,
            degree: m.doctor.degree,
            experience: m.doctor.experience,
            about: m.doctor.about,
            fees: m.doctor.fees,
            available: m.doctor.available,
            verified: m.doctor.verified,
            address: m.doctor.address,
            resolution: m.doctor.resolution,
            lat: m.coordinate.lat,
            lng: m.coordinate.lng,
            distance_km: m.distance_km,
        });
    }
    views
}
