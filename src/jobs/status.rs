//! Simulated liveness: flips the online flag of located hotspots

use super::{Job, PassSummary};
use crate::flow::types::Hotspot;
use crate::flow::Registry;
use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Hotspots whose drawn state differs from the registry, with the new state
///
/// Hotspots without a location are not reported on until they are placed.
pub fn plan_status_changes<R: Rng + ?Sized>(
    hotspots: &[Hotspot],
    online_ratio: f64,
    rng: &mut R,
) -> Vec<(u64, bool)> {
    hotspots
        .iter()
        .filter(|h| h.has_location())
        .filter_map(|h| {
            let online = rng.gen_bool(online_ratio);
            (online != h.online).then_some((h.id, online))
        })
        .collect()
}

pub struct StatusJob {
    registry: Arc<dyn Registry>,
    online_ratio: f64,
}

impl StatusJob {
    pub fn new(registry: Arc<dyn Registry>, online_ratio: f64) -> Self {
        Self {
            registry,
            online_ratio: online_ratio.clamp(0.0, 1.0),
        }
    }
}

#[async_trait]
impl Job for StatusJob {
    fn name(&self) -> &'static str {
        "status"
    }

    async fn run_pass(&self) -> anyhow::Result<PassSummary> {
        let hotspots = self.registry.all_hotspots().await?;
        let changes = plan_status_changes(&hotspots, self.online_ratio, &mut rand::thread_rng());
        info!(
            "{} of {} hotspots change online status",
            changes.len(),
            hotspots.len()
        );

        let mut summary = PassSummary::started(hotspots.len(), changes.len());
        let mut updates = JoinSet::new();
        for (id, online) in changes {
            let registry = Arc::clone(&self.registry);
            updates.spawn(async move { (id, online, registry.update_status(id, online).await) });
        }

        while let Some(joined) = updates.join_next().await {
            match joined {
                Ok((id, online, result)) => {
                    match &result {
                        Ok(outcome) => info!(
                            "Hotspot {} marked {}: {:?}",
                            id,
                            if online { "online" } else { "offline" },
                            outcome
                        ),
                        Err(e) => warn!("Failed to update status for hotspot {}: {:#}", id, e),
                    }
                    summary.record(&result);
                }
                Err(e) => {
                    error!("Status update task panicked: {}", e);
                    summary.failed += 1;
                }
            }
        }

        Ok(summary.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::location::tests::{hotspot, MockRegistry};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_unlocated_hotspots_are_left_alone() {
        let mut offline = hotspot(2, None, None);
        offline.online = false;
        let hotspots = vec![hotspot(1, Some(40.0), Some(250.0)), offline];

        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(plan_status_changes(&hotspots, 0.0, &mut rng), vec![(1, false)]);
        assert!(plan_status_changes(&hotspots, 1.0, &mut rng).is_empty());
    }

    #[tokio::test]
    async fn test_pass_takes_located_hotspots_offline() {
        let registry = Arc::new(MockRegistry::new(vec![
            hotspot(1, Some(40.0), Some(250.0)),
            hotspot(2, Some(41.0), Some(251.0)),
            hotspot(3, None, None),
        ]));

        let summary = StatusJob::new(registry.clone(), 0.0).run_pass().await.unwrap();
        assert_eq!(summary.selected, 2);
        assert_eq!(summary.sealed, 2);

        let after = registry.snapshot();
        assert!(!after[0].online);
        assert!(!after[1].online);
        assert!(after[2].online);
    }

    #[tokio::test]
    async fn test_pass_with_matching_state_writes_nothing() {
        let registry = Arc::new(MockRegistry::new(vec![hotspot(1, Some(40.0), Some(250.0))]));
        let summary = StatusJob::new(registry, 1.0).run_pass().await.unwrap();
        assert_eq!(summary.selected, 0);
        assert_eq!(summary.sealed, 0);
    }
}
