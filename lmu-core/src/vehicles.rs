//! Vehicle metadata cache
//!
//! Resolves a vehicle identifier to a model name and car number. The
//! backing source only supports a bulk query, so misses trigger a full
//! refresh, throttled to one attempt per [`REFRESH_INTERVAL`].

use crate::model::{VehicleInfo, VehicleRecord};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Minimum time between two refresh attempts
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Separator between levels of a vehicle's hierarchical path
const PATH_SEPARATOR: &str = ", ";

/// Trait for vehicle metadata providers
#[async_trait]
pub trait VehicleSource: Send + Sync {
    /// Fetch every known vehicle
    async fn fetch_all(&self) -> Result<Vec<VehicleRecord>>;
}

/// Source that knows no vehicles; resolution always falls back
pub struct NoVehicles;

#[async_trait]
impl VehicleSource for NoVehicles {
    async fn fetch_all(&self) -> Result<Vec<VehicleRecord>> {
        Ok(Vec::new())
    }
}

impl VehicleRecord {
    /// Model is the third path segment when present, else the whole path
    pub fn to_info(&self) -> VehicleInfo {
        let model = self
            .full_path_tree
            .split(PATH_SEPARATOR)
            .nth(2)
            .unwrap_or(&self.full_path_tree);
        VehicleInfo {
            model: model.to_string(),
            number: self.number.clone(),
        }
    }
}

/// Process-lifetime cache in front of a [`VehicleSource`]
pub struct VehicleCache {
    source: Box<dyn VehicleSource>,
    vehicles: HashMap<String, VehicleInfo>,
    last_attempt: Option<Instant>,
    interval: Duration,
}

impl VehicleCache {
    pub fn new(source: Box<dyn VehicleSource>) -> Self {
        Self::with_interval(source, REFRESH_INTERVAL)
    }

    pub fn with_interval(source: Box<dyn VehicleSource>, interval: Duration) -> Self {
        Self {
            source,
            vehicles: HashMap::new(),
            last_attempt: None,
            interval,
        }
    }

    /// Resolve a vehicle, refreshing the cache on a miss if allowed
    pub async fn resolve(&mut self, vehicle_id: &str) -> Option<VehicleInfo> {
        self.resolve_at(vehicle_id, Instant::now()).await
    }

    pub async fn resolve_at(&mut self, vehicle_id: &str, now: Instant) -> Option<VehicleInfo> {
        if let Some(info) = self.vehicles.get(vehicle_id) {
            return Some(info.clone());
        }
        self.refresh_at(now).await;
        self.vehicles.get(vehicle_id).cloned()
    }

    /// Attempt a bulk refresh unless one was attempted within the interval
    ///
    /// A failed refresh keeps the current contents and still counts as an
    /// attempt.
    pub async fn refresh_at(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_attempt {
            if now.saturating_duration_since(last) < self.interval {
                debug!("Vehicle refresh throttled");
                return false;
            }
        }
        self.last_attempt = Some(now);

        match self.source.fetch_all().await {
            Ok(records) => {
                self.vehicles = records
                    .iter()
                    .map(|record| (record.id.clone(), record.to_info()))
                    .collect();
                info!(vehicles = self.vehicles.len(), "Vehicle metadata refreshed");
                true
            }
            Err(e) => {
                warn!("Vehicle metadata refresh failed: {:#}", e);
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }
}
