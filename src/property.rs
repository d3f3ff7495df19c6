use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Deserialize;
use tracing::info;

use crate::limits::*;
use crate::model::{Booking, Room};
use crate::resolver::AvailabilityResolver;
use crate::source::StoreError;
use crate::store::PropertyStore;

/// Rooms and historical bookings a property starts out with.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PropertySeed {
    #[serde(default)]
    pub rooms: Vec<Room>,
    #[serde(default)]
    pub bookings: Vec<Booking>,
}

/// Read a JSON object mapping property name to [`PropertySeed`].
pub fn load_seeds(path: &Path) -> std::io::Result<HashMap<String, PropertySeed>> {
    let file = std::fs::File::open(path)?;
    let seeds = serde_json::from_reader(std::io::BufReader::new(file))?;
    Ok(seeds)
}

/// A property's store together with the resolver reading from it.
pub struct Property {
    pub store: Arc<PropertyStore>,
    pub resolver: AvailabilityResolver,
}

impl Property {
    pub fn new(store: Arc<PropertyStore>) -> Self {
        let resolver = AvailabilityResolver::new(store.clone(), store.clone());
        Self { store, resolver }
    }

    pub async fn seeded(seed: &PropertySeed) -> Result<Self, StoreError> {
        let store = Arc::new(PropertyStore::new());
        for room in &seed.rooms {
            store.add_room(room.clone()).await?;
        }
        for booking in &seed.bookings {
            store.import_booking(booking.clone()).await?;
        }
        Ok(Self::new(store))
    }
}

/// Manages per-property stores. Property = database name from the pgwire connection.
pub struct PropertyManager {
    properties: DashMap<String, Arc<Property>>,
    seeds: HashMap<String, PropertySeed>,
}

impl PropertyManager {
    pub fn new(seeds: HashMap<String, PropertySeed>) -> Self {
        Self {
            properties: DashMap::new(),
            seeds,
        }
    }

    /// Get or lazily create the property with the given name.
    pub async fn get_or_create(&self, name: &str) -> Result<Arc<Property>, StoreError> {
        if let Some(property) = self.properties.get(name) {
            return Ok(property.value().clone());
        }
        if name.len() > MAX_PROPERTY_NAME_LEN {
            return Err(StoreError::LimitExceeded("property name too long"));
        }
        if self.properties.len() >= MAX_PROPERTIES {
            return Err(StoreError::LimitExceeded("too many properties"));
        }

        let property = match self.seeds.get(name) {
            Some(seed) => {
                let property = Property::seeded(seed).await?;
                info!(
                    "property {name} seeded with {} rooms, {} bookings",
                    seed.rooms.len(),
                    seed.bookings.len()
                );
                property
            }
            None => Property::new(Arc::new(PropertyStore::new())),
        };

        // Another connection may have created it while we were seeding.
        let property = self
            .properties
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(property))
            .value()
            .clone();
        metrics::gauge!(crate::observability::PROPERTIES_ACTIVE).set(self.properties.len() as f64);
        Ok(property)
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }
}
