use anyhow::Result;
use medfinder::directory::{demo_doctor, DoctorDirectory};
use medfinder::domain::Coordinate;
use medfinder::geocoding::GeocodeResolver;
use medfinder::proximity::{CandidateFilters, ProximityEngine, ProximityQuery};
use medfinder::store::{GridIndexStore, InMemoryLocationStore, LocationStore};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const ORIGIN: Coordinate = Coordinate {
    lat: 12.823,
    lng: 80.045,
};

fn offline_resolver() -> Arc<GeocodeResolver> {
    // No providers: only used to satisfy the directory; these tests seed
    // coordinates directly.
    Arc::new(GeocodeResolver::new(
        Vec::new(),
        Duration::from_secs(1),
        ORIGIN,
        Duration::ZERO,
    ))
}

fn engine_on(store: Arc<dyn LocationStore>) -> (Arc<DoctorDirectory>, ProximityEngine) {
    let directory = Arc::new(DoctorDirectory::new(offline_resolver(), store.clone()));
    let engine = ProximityEngine::new(store, directory.clone());
    (directory, engine)
}

async fn seed_campus_and_city(directory: &DoctorDirectory) -> Result<(Uuid, Uuid)> {
    // ~0.27 km from the origin.
    let near = directory
        .register_with_coordinate(
            demo_doctor("Dr. Aarav Menon", "General physician", "walk-in care", true),
            Coordinate { lat: 12.825, lng: 80.046 },
        )
        .await?;
    // ~34 km from the origin.
    let far = directory
        .register_with_coordinate(
            demo_doctor("Dr. Sana Iqbal", "Pediatrician", "child health", true),
            Coordinate { lat: 13.0, lng: 80.3 },
        )
        .await?;
    Ok((near, far))
}

fn query(radius_km: f64) -> ProximityQuery {
    ProximityQuery {
        origin: ORIGIN,
        radius_km,
        filters: CandidateFilters::default(),
    }
}

#[tokio::test]
async fn radius_membership_is_inclusive_and_monotonic() -> Result<()> {
    let store: Arc<dyn LocationStore> = Arc::new(GridIndexStore::new());
    let (directory, engine) = engine_on(store);
    let (near, far) = seed_campus_and_city(&directory).await?;

    let at_5 = engine.find_within(&query(5.0)).await?;
    let ids_at_5: Vec<Uuid> = at_5.iter().filter_map(|m| m.doctor.id).collect();
    assert_eq!(ids_at_5, vec![near]);
    assert!(at_5[0].distance_km > 0.2 && at_5[0].distance_km < 0.35);

    // The far candidate is ~33.9 km out.
    let at_30 = engine.find_within(&query(30.0)).await?;
    let ids_at_30: Vec<Uuid> = at_30.iter().filter_map(|m| m.doctor.id).collect();
    assert_eq!(ids_at_30, vec![near]);

    let at_35 = engine.find_within(&query(35.0)).await?;
    let ids_at_35: Vec<Uuid> = at_35.iter().filter_map(|m| m.doctor.id).collect();
    assert_eq!(ids_at_35, vec![near, far]);

    // Growing the radius only ever adds candidates.
    for id in &ids_at_5 {
        assert!(ids_at_35.contains(id));
    }
    Ok(())
}

#[tokio::test]
async fn results_are_sorted_ascending_by_distance() -> Result<()> {
    let store: Arc<dyn LocationStore> = Arc::new(InMemoryLocationStore::new());
    let (directory, engine) = engine_on(store);

    for (lat, lng) in [(12.9, 80.2), (12.825, 80.046), (12.84, 80.07)] {
        directory
            .register_with_coordinate(
                demo_doctor("Dr. Test", "General physician", "", true),
                Coordinate { lat, lng },
            )
            .await?;
    }

    let matches = engine.find_within(&query(50.0)).await?;
    assert_eq!(matches.len(), 3);
    for pair in matches.windows(2) {
        assert!(pair[0].distance_km <= pair[1].distance_km);
    }
    Ok(())
}

#[tokio::test]
async fn zero_radius_admits_only_coincident_points() -> Result<()> {
    let store: Arc<dyn LocationStore> = Arc::new(GridIndexStore::new());
    let (directory, engine) = engine_on(store);

    let coincident = directory
        .register_with_coordinate(
            demo_doctor("Dr. Here", "General physician", "", true),
            ORIGIN,
        )
        .await?;
    directory
        .register_with_coordinate(
            demo_doctor("Dr. Near", "General physician", "", true),
            Coordinate { lat: 12.825, lng: 80.046 },
        )
        .await?;

    let matches = engine.find_within(&query(0.0)).await?;
    let ids: Vec<Uuid> = matches.iter().filter_map(|m| m.doctor.id).collect();
    assert_eq!(ids, vec![coincident]);
    Ok(())
}

#[tokio::test]
async fn invalid_origin_and_negative_radius_are_rejected() -> Result<()> {
    let store: Arc<dyn LocationStore> = Arc::new(GridIndexStore::new());
    let (_, engine) = engine_on(store);

    let bad_origin = ProximityQuery {
        origin: Coordinate { lat: 91.0, lng: 80.0 },
        radius_km: 5.0,
        filters: CandidateFilters::default(),
    };
    assert!(engine.find_within(&bad_origin).await.is_err());

    assert!(engine.find_within(&query(-1.0)).await.is_err());
    assert!(engine.find_within(&query(f64::NAN)).await.is_err());
    Ok(())
}

#[tokio::test]
async fn non_finite_stored_coordinates_are_excluded_at_any_radius() -> Result<()> {
    let store: Arc<dyn LocationStore> = Arc::new(InMemoryLocationStore::new());
    let (directory, engine) = engine_on(store);

    directory
        .register_with_coordinate(
            demo_doctor("Dr. Broken", "General physician", "", true),
            Coordinate { lat: f64::NAN, lng: 80.0 },
        )
        .await?;
    let valid = directory
        .register_with_coordinate(
            demo_doctor("Dr. Valid", "General physician", "", true),
            Coordinate { lat: 12.825, lng: 80.046 },
        )
        .await?;

    for radius in [1.0, 100.0, 20000.0] {
        let ids: Vec<Uuid> = engine
            .find_within(&query(radius))
            .await?
            .iter()
            .filter_map(|m| m.doctor.id)
            .collect();
        assert_eq!(ids, vec![valid], "radius {radius}");
    }
    Ok(())
}

#[tokio::test]
async fn filters_compose_with_the_radius_predicate() -> Result<()> {
    let store: Arc<dyn LocationStore> = Arc::new(GridIndexStore::new());
    let (directory, engine) = engine_on(store);

    let dermatologist = directory
        .register_with_coordinate(
            demo_doctor("Dr. Meera Nair", "Dermatologist", "skin and allergy care", true),
            Coordinate { lat: 12.825, lng: 80.046 },
        )
        .await?;
    directory
        .register_with_coordinate(
            demo_doctor("Dr. Vikram Rao", "Cardiologist", "heart clinic", false),
            Coordinate { lat: 12.824, lng: 80.044 },
        )
        .await?;

    let mut q = query(5.0);
    q.filters.available = Some(true);
    q.filters.speciality = Some("dermatologist".to_string());
    let ids: Vec<Uuid> = engine
        .find_within(&q)
        .await?
        .iter()
        .filter_map(|m| m.doctor.id)
        .collect();
    assert_eq!(ids, vec![dermatologist]);

    let mut q = query(5.0);
    q.filters.text = Some("ALLERGY".to_string());
    let ids: Vec<Uuid> = engine
        .find_within(&q)
        .await?
        .iter()
        .filter_map(|m| m.doctor.id)
        .collect();
    assert_eq!(ids, vec![dermatologist]);
    Ok(())
}

#[tokio::test]
async fn full_scan_and_indexed_backends_return_identical_results() -> Result<()> {
    let scan: Arc<dyn LocationStore> = Arc::new(InMemoryLocationStore::new());
    let indexed: Arc<dyn LocationStore> = Arc::new(GridIndexStore::new());
    let (scan_directory, scan_engine) = engine_on(scan);
    let (indexed_directory, indexed_engine) = engine_on(indexed);

    let points = [
        (12.825, 80.046),
        (12.819, 80.039),
        (12.84, 80.07),
        (13.0, 80.3),
        (12.9716, 77.5946),
        (28.6139, 77.209),
    ];
    for (index, (lat, lng)) in points.iter().enumerate() {
        let name = format!("Dr. {index}");
        // Same names on both sides so results can be compared by name.
        scan_directory
            .register_with_coordinate(
                demo_doctor(&name, "General physician", "", true),
                Coordinate { lat: *lat, lng: *lng },
            )
            .await?;
        indexed_directory
            .register_with_coordinate(
                demo_doctor(&name, "General physician", "", true),
                Coordinate { lat: *lat, lng: *lng },
            )
            .await?;
    }

    for radius in [0.5, 5.0, 30.0, 300.0, 2500.0] {
        let scan_names: Vec<String> = scan_engine
            .find_within(&query(radius))
            .await?
            .into_iter()
            .map(|m| m.doctor.name)
            .collect();
        let indexed_names: Vec<String> = indexed_engine
            .find_within(&query(radius))
            .await?
            .into_iter()
            .map(|m| m.doctor.name)
            .collect();
        assert_eq!(scan_names, indexed_names, "radius {radius}");
    }
    Ok(())
}

#[tokio::test]
async fn updating_an_address_is_atomic_for_readers() -> Result<()> {
    // Writers race on the same entity; readers must always see a coordinate
    // whose projection matches (the store errors otherwise).
    let store = Arc::new(GridIndexStore::new());
    let id = Uuid::new_v4();
    store
        .upsert(id, Coordinate { lat: 12.823, lng: 80.045 })
        .await?;

    let writer_store = store.clone();
    let writer = tokio::spawn(async move {
        for step in 0..100 {
            let lat = 12.0 + f64::from(step) * 0.01;
            writer_store
                .upsert(id, Coordinate { lat, lng: 80.0 })
                .await
                .unwrap();
        }
    });

    for _ in 0..100 {
        // A torn coordinate/projection pair would surface as a store error.
        let _ = store.read(id).await?;
    }
    writer.await.unwrap();
    Ok(())
}
