use crate::domain::{Coordinate, GeoPoint};
use crate::error::{LocatorError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

/// Conservative kilometers-per-degree used to widen query regions; slightly
/// under the true value so a bounding box never excludes a true candidate.
const KM_PER_DEGREE: f64 = 110.0;

/// Latitude/longitude bounding box handed to [`LocationStore::query`].
/// Regions are a coarse pre-filter; callers apply the exact distance
/// predicate themselves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Region {
    /// Bounding box guaranteed to contain every point within `radius_km` of
    /// `origin`. Near the poles or the antimeridian the longitude span
    /// degenerates to the full range rather than wrapping.
    pub fn around(origin: Coordinate, radius_km: f64) -> Self {
        let lat_delta = radius_km / KM_PER_DEGREE;
        let min_lat = (origin.lat - lat_delta).max(-90.0);
        let max_lat = (origin.lat + lat_delta).min(90.0);

        // Parallels shrink toward the poles, so size the longitude span for
        // the widest latitude the box can reach.
        let widest_lat = min_lat.abs().max(max_lat.abs());
        let cos_lat = widest_lat.to_radians().cos();
        let lng_delta = if cos_lat > 0.01 {
            radius_km / (KM_PER_DEGREE * cos_lat)
        } else {
            360.0
        };

        let min_lng = origin.lng - lng_delta;
        let max_lng = origin.lng + lng_delta;
        let (min_lng, max_lng) = if min_lng < -180.0 || max_lng > 180.0 {
            (-180.0, 180.0)
        } else {
            (min_lng, max_lng)
        };

        Self {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        }
    }

    pub fn contains(&self, coordinate: Coordinate) -> bool {
        coordinate.lat >= self.min_lat
            && coordinate.lat <= self.max_lat
            && coordinate.lng >= self.min_lng
            && coordinate.lng <= self.max_lng
    }
}

#[derive(Debug, Clone)]
struct StoredLocation {
    coordinate: Coordinate,
    projection: GeoPoint,
}

impl StoredLocation {
    fn new(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            projection: GeoPoint::from_coordinate(coordinate),
        }
    }

    /// Reads verify the derived projection still matches the coordinate.
    /// Non-finite coordinates are data-quality candidates for the caller to
    /// exclude, not corruption, so they skip the check.
    fn verified_coordinate(&self, entity_id: Uuid) -> Result<Coordinate> {
        if self.coordinate.is_finite() && !self.projection.matches(self.coordinate) {
            return Err(LocatorError::Store(format!(
                "projection out of sync with coordinate for entity {entity_id}"
            )));
        }
        Ok(self.coordinate)
    }
}

/// Persistence seam for entity coordinates. Every write commits the
/// coordinate and its derived projection as one atomic unit; no reader ever
/// observes one updated without the other. Concurrent writers to the same
/// entity are last-writer-wins.
#[async_trait]
pub trait LocationStore: Send + Sync {
    async fn upsert(&self, entity_id: Uuid, coordinate: Coordinate) -> Result<()>;
    async fn read(&self, entity_id: Uuid) -> Result<Option<Coordinate>>;

    /// All entities whose coordinate falls inside `region`. Correct on every
    /// backend; whether an index accelerates it is invisible to callers.
    async fn query(&self, region: &Region) -> Result<Vec<(Uuid, Coordinate)>>;

    /// Whether `query` is index-accelerated. Results are identical either way.
    fn has_spatial_index(&self) -> bool {
        false
    }
}

/// Full-scan store: a single map behind one mutex. No spatial index;
/// `query` walks every entry.
#[derive(Default)]
pub struct InMemoryLocationStore {
    locations: Mutex<HashMap<Uuid, StoredLocation>>,
}

impl InMemoryLocationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocationStore for InMemoryLocationStore {
    async fn upsert(&self, entity_id: Uuid, coordinate: Coordinate) -> Result<()> {
        let mut locations = self.locations.lock().unwrap();
        locations.insert(entity_id, StoredLocation::new(coordinate));
        debug!(%entity_id, lat = coordinate.lat, lng = coordinate.lng, "stored location");
        Ok(())
    }

    async fn read(&self, entity_id: Uuid) -> Result<Option<Coordinate>> {
        let locations = self.locations.lock().unwrap();
        locations
            .get(&entity_id)
            .map(|stored| stored.verified_coordinate(entity_id))
            .transpose()
    }

    async fn query(&self, region: &Region) -> Result<Vec<(Uuid, Coordinate)>> {
        let locations = self.locations.lock().unwrap();
        let mut hits = Vec::new();
        for (entity_id, stored) in locations.iter() {
            if !stored.coordinate.is_finite() {
                warn!(%entity_id, "skipping entity with non-finite stored coordinate");
                continue;
            }
            let coordinate = stored.verified_coordinate(*entity_id)?;
            if region.contains(coordinate) {
                hits.push((*entity_id, coordinate));
            }
        }
        Ok(hits)
    }
}

/// Cell edge for the grid index, in degrees.
const GRID_CELL_DEGREES: f64 = 0.25;

#[derive(Default)]
struct GridIndexInner {
    locations: HashMap<Uuid, StoredLocation>,
    buckets: HashMap<(i32, i32), HashSet<Uuid>>,
}

fn grid_cell(coordinate: Coordinate) -> (i32, i32) {
    (
        (coordinate.lat / GRID_CELL_DEGREES).floor() as i32,
        (coordinate.lng / GRID_CELL_DEGREES).floor() as i32,
    )
}

/// Index-accelerated store: coordinates bucketed into fixed-size
/// latitude/longitude cells so region queries touch only the overlapping
/// cells. Map and buckets live behind one mutex, so the coordinate, its
/// projection and the index entry move together.
#[derive(Default)]
pub struct GridIndexStore {
    inner: Mutex<GridIndexInner>,
}

impl GridIndexStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocationStore for GridIndexStore {
    async fn upsert(&self, entity_id: Uuid, coordinate: Coordinate) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(previous) = inner.locations.remove(&entity_id) {
            let old_cell = grid_cell(previous.coordinate);
            if let Some(bucket) = inner.buckets.get_mut(&old_cell) {
                bucket.remove(&entity_id);
            }
        }
        inner.locations.insert(entity_id, StoredLocation::new(coordinate));
        inner
            .buckets
            .entry(grid_cell(coordinate))
            .or_default()
            .insert(entity_id);
        debug!(%entity_id, lat = coordinate.lat, lng = coordinate.lng, "stored indexed location");
        Ok(())
    }

    async fn read(&self, entity_id: Uuid) -> Result<Option<Coordinate>> {
        let inner = self.inner.lock().unwrap();
        inner
            .locations
            .get(&entity_id)
            .map(|stored| stored.verified_coordinate(entity_id))
            .transpose()
    }

    async fn query(&self, region: &Region) -> Result<Vec<(Uuid, Coordinate)>> {
        let inner = self.inner.lock().unwrap();

        let min_cell_lat = (region.min_lat / GRID_CELL_DEGREES).floor() as i32;
        let max_cell_lat = (region.max_lat / GRID_CELL_DEGREES).floor() as i32;
        let min_cell_lng = (region.min_lng / GRID_CELL_DEGREES).floor() as i32;
        let max_cell_lng = (region.max_lng / GRID_CELL_DEGREES).floor() as i32;

        let mut hits = Vec::new();
        for cell_lat in min_cell_lat..=max_cell_lat {
            for cell_lng in min_cell_lng..=max_cell_lng {
                let Some(bucket) = inner.buckets.get(&(cell_lat, cell_lng)) else {
                    continue;
                };
                for entity_id in bucket {
                    let Some(stored) = inner.locations.get(entity_id) else {
                        continue;
                    };
                    if !stored.coordinate.is_finite() {
                        warn!(%entity_id, "skipping entity with non-finite stored coordinate");
                        continue;
                    }
                    let coordinate = stored.verified_coordinate(*entity_id)?;
                    if region.contains(coordinate) {
                        hits.push((*entity_id, coordinate));
                    }
                }
            }
        }
        Ok(hits)
    }

    fn has_spatial_index(&self) -> bool {
        true
    }
}
