//! Placeholder locations for hotspots registered without coordinates

use super::{Job, PassSummary};
use crate::flow::types::{Hotspot, Location};
use crate::flow::Registry;
use async_trait::async_trait;
use rand::Rng;
use std::ops::RangeInclusive;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Latitude band covering the continental US and Canada
pub const LAT_RANGE: RangeInclusive<f64> = 24.0..=60.0;
/// Longitude band in signed degrees (west is negative)
pub const LNG_RANGE: RangeInclusive<f64> = -170.0..=-50.0;

/// Uniform random point inside the North America bounding box
pub fn generate_random_location<R: Rng + ?Sized>(rng: &mut R) -> Location {
    Location {
        lat: rng.gen_range(LAT_RANGE),
        lng: rng.gen_range(LNG_RANGE),
    }
}

/// Map a signed longitude onto [0, 360) for unsigned contract fields
pub fn normalize_longitude(lng: f64) -> f64 {
    if lng < 0.0 {
        lng + 360.0
    } else {
        lng
    }
}

/// Hotspots still missing either coordinate
pub fn select_unlocated(hotspots: &[Hotspot]) -> Vec<&Hotspot> {
    hotspots.iter().filter(|h| !h.has_location()).collect()
}

pub struct LocationJob {
    registry: Arc<dyn Registry>,
    normalize_longitude: bool,
}

impl LocationJob {
    pub fn new(registry: Arc<dyn Registry>, normalize_longitude: bool) -> Self {
        Self {
            registry,
            normalize_longitude,
        }
    }

    fn placeholder<R: Rng + ?Sized>(&self, rng: &mut R) -> Location {
        let mut location = generate_random_location(rng);
        if self.normalize_longitude {
            location.lng = normalize_longitude(location.lng);
        }
        location
    }
}

#[async_trait]
impl Job for LocationJob {
    fn name(&self) -> &'static str {
        "location"
    }

    async fn run_pass(&self) -> anyhow::Result<PassSummary> {
        info!("Starting hotspot location processing...");
        let hotspots = self.registry.all_hotspots().await?;
        let unlocated = select_unlocated(&hotspots);
        info!(
            "Retrieved {} hotspots, {} without location data",
            hotspots.len(),
            unlocated.len()
        );

        let mut summary = PassSummary::started(hotspots.len(), unlocated.len());

        // Draw every location up front; the thread rng cannot cross awaits
        let assignments: Vec<(u64, Location)> = {
            let mut rng = rand::thread_rng();
            unlocated
                .iter()
                .map(|h| (h.id, self.placeholder(&mut rng)))
                .collect()
        };

        let mut updates = JoinSet::new();
        for (id, location) in assignments {
            info!("Assigning location {} to hotspot {}", location, id);
            let registry = Arc::clone(&self.registry);
            updates.spawn(async move { (id, registry.update_location(id, location).await) });
        }

        while let Some(joined) = updates.join_next().await {
            match joined {
                Ok((id, result)) => {
                    match &result {
                        Ok(outcome) => info!("Location update for hotspot {}: {:?}", id, outcome),
                        Err(e) => warn!("Failed to update location for hotspot {}: {:#}", id, e),
                    }
                    summary.record(&result);
                }
                Err(e) => {
                    error!("Location update task panicked: {}", e);
                    summary.failed += 1;
                }
            }
        }

        Ok(summary.finish())
    }
}
