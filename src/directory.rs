use crate::domain::{Address, Coordinate, Doctor, GeocodeSource, ResolutionStatus, ResolvedLocation};
use crate::error::{LocatorError, Result};
use crate::geocoding::{normalize_address, GeocodeResolver};
use crate::store::LocationStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::info;
use uuid::Uuid;

/// Owns doctor records and is the sole trigger of the location write path:
/// registering a doctor (or changing its address) normalizes the address,
/// runs the geocode chain and upserts the coordinate into the store.
///
/// Resolution is decoupled from registration: a freshly registered doctor is
/// `Pending` until [`resolve_location`](Self::resolve_location) runs, so
/// third-party geocoder latency never blocks record creation.
pub struct DoctorDirectory {
    doctors: Mutex<HashMap<Uuid, Doctor>>,
    resolver: Arc<GeocodeResolver>,
    store: Arc<dyn LocationStore>,
}

impl DoctorDirectory {
    pub fn new(resolver: Arc<GeocodeResolver>, store: Arc<dyn LocationStore>) -> Self {
        Self {
            doctors: Mutex::new(HashMap::new()),
            resolver,
            store,
        }
    }

    pub fn get(&self, id: Uuid) -> Option<Doctor> {
        let doctors = self.doctors.lock().unwrap();
        doctors.get(&id).cloned()
    }

    /// Inserts the doctor with `Pending` resolution and returns its id.
    /// Call [`resolve_location`](Self::resolve_location) (or
    /// [`resolve_pending`](Self::resolve_pending)) to geocode it.
    pub fn register(&self, mut doctor: Doctor) -> Uuid {
        let id = Uuid::new_v4();
        doctor.id = Some(id);
        doctor.resolution = ResolutionStatus::Pending;
        let mut doctors = self.doctors.lock().unwrap();
        doctors.insert(id, doctor);
        info!(%id, "registered doctor");
        id
    }

    /// Inserts a doctor whose coordinate is already known, bypassing the
    /// geocode chain. Used for seed data and tests.
    pub async fn register_with_coordinate(
        &self,
        mut doctor: Doctor,
        coordinate: Coordinate,
    ) -> Result<Uuid> {
        let id = Uuid::new_v4();
        doctor.id = Some(id);
        doctor.resolution = ResolutionStatus::Resolved;
        doctor.location = Some(ResolvedLocation {
            entity_id: id,
            coordinate,
            source: GeocodeSource::Provider("manual".to_string()),
            resolved_at: chrono::Utc::now(),
        });
        {
            let mut doctors = self.doctors.lock().unwrap();
            doctors.insert(id, doctor);
        }
        self.store.upsert(id, coordinate).await?;
        Ok(id)
    }

    /// Geocodes the doctor's current address and upserts the result. The
    /// coordinate and its projection commit atomically in the store; the
    /// status flips to `Resolved` on a provider match or `Unresolved` when
    /// the chain fell back to the default coordinate.
    pub async fn resolve_location(&self, id: Uuid) -> Result<()> {
        let address = {
            let doctors = self.doctors.lock().unwrap();
            let doctor = doctors
                .get(&id)
                .ok_or_else(|| LocatorError::Store(format!("unknown doctor {id}")))?;
            doctor.address.clone()
        };

        let query = normalize_address(&address);
        let outcome = self.resolver.resolve(&query).await;
        self.store.upsert(id, outcome.coordinate).await?;

        let status = if outcome.source.is_default() {
            ResolutionStatus::Unresolved
        } else {
            ResolutionStatus::Resolved
        };
        {
            let mut doctors = self.doctors.lock().unwrap();
            if let Some(doctor) = doctors.get_mut(&id) {
                doctor.resolution = status;
                doctor.location = Some(ResolvedLocation {
                    entity_id: id,
                    coordinate: outcome.coordinate,
                    source: outcome.source.clone(),
                    resolved_at: chrono::Utc::now(),
                });
            }
        }
        info!(%id, ?status, source = ?outcome.source, "resolved doctor location");
        Ok(())
    }

    /// Replaces the doctor's address and re-geocodes it. Last writer wins
    /// under concurrent updates.
    pub async fn update_address(&self, id: Uuid, address: Address) -> Result<()> {
        {
            let mut doctors = self.doctors.lock().unwrap();
            let doctor = doctors
                .get_mut(&id)
                .ok_or_else(|| LocatorError::Store(format!("unknown doctor {id}")))?;
            doctor.address = address;
            doctor.resolution = ResolutionStatus::Pending;
        }
        self.resolve_location(id).await
    }

    /// Resolves every doctor still marked `Pending`. Returns how many were
    /// processed.
    pub async fn resolve_pending(&self) -> Result<usize> {
        let pending: Vec<Uuid> = {
            let doctors = self.doctors.lock().unwrap();
            doctors
                .iter()
                .filter(|(_, d)| d.resolution == ResolutionStatus::Pending)
                .map(|(id, _)| *id)
                .collect()
        };
        for id in &pending {
            self.resolve_location(*id).await?;
        }
        Ok(pending.len())
    }
}

/// A doctor profile with placeholder credentials, for seeding and tests.
pub fn demo_doctor(name: &str, speciality: &str, about: &str, available: bool) -> Doctor {
    Doctor {
        id: None,
        name: name.to_string(),
        email: format!(
            "{}@medfinder.local",
            name.to_lowercase().replace(|c: char| !c.is_alphanumeric(), ".")
        ),
        password_hash: "$2b$10$seeded-placeholder-hash".to_string(),
        speciality: speciality.to_string(),
        degree: "MBBS".to_string(),
        experience: "4 Years".to_string(),
        about: about.to_string(),
        fees: 300.0,
        available,
        verified: true,
        address: Address::default(),
        resolution: ResolutionStatus::Pending,
        location: None,
    }
}

/// Loads a handful of doctors with known coordinates around the default
/// campus so a fresh server has something to answer with.
pub async fn seed_demo(directory: &DoctorDirectory) -> Result<Vec<Uuid>> {
    let seeds = [
        (
            demo_doctor(
                "Dr. Aarav Menon",
                "General physician",
                "Walk-in consultations and preventive care",
                true,
            ),
            Coordinate { lat: 12.825, lng: 80.046 },
        ),
        (
            demo_doctor(
                "Dr. Meera Nair",
                "Dermatologist",
                "Skin and allergy care",
                true,
            ),
            Coordinate { lat: 12.819, lng: 80.039 },
        ),
        (
            demo_doctor(
                "Dr. Vikram Rao",
                "Cardiologist",
                "Preventive cardiology clinic",
                false,
            ),
            Coordinate { lat: 12.84, lng: 80.07 },
        ),
        (
            demo_doctor(
                "Dr. Sana Iqbal",
                "Pediatrician",
                "Child health and vaccinations",
                true,
            ),
            Coordinate { lat: 13.0, lng: 80.3 },
        ),
    ];

    let mut ids = Vec::with_capacity(seeds.len());
    for (doctor, coordinate) in seeds {
        ids.push(directory.register_with_coordinate(doctor, coordinate).await?);
    }
    info!(count = ids.len(), "seeded demo doctors");
    Ok(ids)
}
