#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Spawn-once service driving placement and spawn-state bookkeeping.
//!
//! [`SpawnService`] owns the [`SpawnStateStore`] for the lifetime of a host
//! session. Each pass asks the store whether a template still needs spawning,
//! searches the host grid for a position and records the outcome.

use serde::{Deserialize, Serialize};
use stowage_core::{
    ContainerId, HostGrid, ItemId, ItemTemplate, Materialize, MaterializeError, Placement,
    TemplateId,
};
use stowage_system_occupancy::{AnalyzerError, OccupancyAnalyzer};
use stowage_system_placement::{PlacementStrategy, ScoreWeights};
use stowage_system_spawn_state::{
    Clock, KeyValueStore, SpawnState, SpawnStateError, SpawnStateStore,
};
use tracing::{debug, info, warn};

/// What to do when a previously spawned item is found to have been taken.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RespawnPolicy {
    /// Never spawn the template again; it is reported as exhausted.
    #[default]
    Never,
    /// Reset the record and spawn a fresh item.
    AfterConsumption,
}

/// Configuration parameters required to construct the spawning service.
#[derive(Clone, Copy, Debug, Default)]
pub struct Config {
    respawn: RespawnPolicy,
    weights: ScoreWeights,
}

impl Config {
    /// Creates a configuration using the provided respawn policy and default weights.
    #[must_use]
    pub fn new(respawn: RespawnPolicy) -> Self {
        Self {
            respawn,
            weights: ScoreWeights::default(),
        }
    }

    /// Overrides the placement scoring weights.
    #[must_use]
    pub const fn with_weights(mut self, weights: ScoreWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Respawn policy applied after consumption.
    #[must_use]
    pub const fn respawn(&self) -> RespawnPolicy {
        self.respawn
    }

    /// Placement scoring weights.
    #[must_use]
    pub const fn weights(&self) -> ScoreWeights {
        self.weights
    }
}

/// Errors that abort a spawn pass.
#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    /// The host grid could not be analyzed.
    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),
    /// The spawn-state store rejected an update or failed to persist.
    #[error(transparent)]
    State(#[from] SpawnStateError),
}

/// Result of evaluating one template during a spawn pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpawnOutcome {
    /// A new item was created.
    Spawned {
        /// Identity assigned by the host.
        item: ItemId,
        /// Position and orientation used.
        placement: Placement,
    },
    /// The previously spawned item is still on the grid.
    AlreadyPresent,
    /// The template was consumed or expired and will not spawn again.
    Exhausted,
    /// The caller's spawn condition rejected the template.
    ConditionNotMet,
    /// No free position could hold the item.
    NoFit,
    /// The host refused to create the item.
    MaterializeFailed(MaterializeError),
}

/// Per-template outcomes of one spawn pass, in template order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SpawnReport {
    outcomes: Vec<(TemplateId, SpawnOutcome)>,
}

impl SpawnReport {
    /// Outcomes paired with their template ids.
    pub fn iter(&self) -> impl Iterator<Item = (&TemplateId, &SpawnOutcome)> {
        self.outcomes.iter().map(|(template, outcome)| (template, outcome))
    }

    /// Outcome reported for `template`, if it was part of the pass.
    #[must_use]
    pub fn outcome(&self, template: &TemplateId) -> Option<&SpawnOutcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| id == template)
            .map(|(_, outcome)| outcome)
    }

    /// Number of items created during the pass.
    #[must_use]
    pub fn spawned(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, SpawnOutcome::Spawned { .. }))
            .count()
    }

    /// Number of templates evaluated.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Reports whether the pass evaluated no templates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Process-scoped owner of the spawn-state store.
#[derive(Debug)]
pub struct SpawnService<P, C> {
    store: SpawnStateStore<P, C>,
    strategy: PlacementStrategy,
    respawn: RespawnPolicy,
}

impl<P: KeyValueStore, C: Clock> SpawnService<P, C> {
    /// Loads the persisted spawn state and prepares the service.
    #[must_use]
    pub fn init(persistence: P, clock: C, config: Config) -> Self {
        Self {
            store: SpawnStateStore::open(persistence, clock),
            strategy: PlacementStrategy::with_weights(config.weights()),
            respawn: config.respawn(),
        }
    }

    /// Saves pending changes and hands back the persistence surface.
    pub fn shutdown(mut self) -> Result<P, SpawnError> {
        let _ = self.store.save()?;
        Ok(self.store.into_persistence())
    }

    /// Spawn-state store owned by the service.
    #[must_use]
    pub fn store(&self) -> &SpawnStateStore<P, C> {
        &self.store
    }

    /// Mutable access to the store, for explicit resets and saves.
    pub fn store_mut(&mut self) -> &mut SpawnStateStore<P, C> {
        &mut self.store
    }

    /// Placement strategy used for new spawns.
    #[must_use]
    pub const fn strategy(&self) -> &PlacementStrategy {
        &self.strategy
    }

    /// Runs one spawn pass for `container` over `templates`.
    ///
    /// `condition` is consulted only for templates that would otherwise
    /// spawn. Per-template failures are reported as outcomes; only analyzer
    /// and store errors abort the pass. Changes are not saved.
    pub fn spawn_templates<H, F>(
        &mut self,
        container: &ContainerId,
        host: &mut H,
        templates: &[ItemTemplate],
        mut condition: F,
    ) -> Result<SpawnReport, SpawnError>
    where
        H: HostGrid + Materialize + ?Sized,
        F: FnMut(&ItemTemplate) -> bool,
    {
        let mut report = SpawnReport::default();
        for template in templates {
            let outcome = self.spawn_one(container, host, template, &mut condition)?;
            debug!(%container, template = %template.id, ?outcome, "template evaluated");
            report.outcomes.push((template.id.clone(), outcome));
        }
        info!(
            %container,
            templates = report.len(),
            spawned = report.spawned(),
            "spawn pass complete"
        );
        Ok(report)
    }

    fn spawn_one<H, F>(
        &mut self,
        container: &ContainerId,
        host: &mut H,
        template: &ItemTemplate,
        condition: &mut F,
    ) -> Result<SpawnOutcome, SpawnError>
    where
        H: HostGrid + Materialize + ?Sized,
        F: FnMut(&ItemTemplate) -> bool,
    {
        let previous = self.store.state(container, &template.id);
        if !self.store.should_spawn(container, &template.id, &*host) {
            return Ok(match self.store.state(container, &template.id) {
                Some(SpawnState::Generated) => SpawnOutcome::AlreadyPresent,
                _ => SpawnOutcome::Exhausted,
            });
        }

        let consumed_now = previous == Some(SpawnState::Generated)
            && self.store.state(container, &template.id) == Some(SpawnState::Consumed);
        if consumed_now {
            match self.respawn {
                RespawnPolicy::Never => return Ok(SpawnOutcome::Exhausted),
                RespawnPolicy::AfterConsumption => {
                    let _ = self.store.reset_record(container, &template.id);
                }
            }
        }

        if !condition(template) {
            self.store
                .record_condition_not_met(container, &template.id)?;
            return Ok(SpawnOutcome::ConditionNotMet);
        }

        let placement = {
            let mut analyzer = OccupancyAnalyzer::new(&*host);
            self.strategy
                .find_position(&mut analyzer, &template.policy())?
        };
        let Some(placement) = placement else {
            debug!(%container, template = %template.id, size = %template.size, "no room to spawn");
            return Ok(SpawnOutcome::NoFit);
        };

        match host.materialize(template, placement) {
            Ok(item) => {
                self.store.record_spawned(
                    container,
                    &template.id,
                    item.clone(),
                    template.quantity,
                    placement.origin,
                )?;
                Ok(SpawnOutcome::Spawned { item, placement })
            }
            Err(error) => {
                warn!(%container, template = %template.id, %error, "host refused to materialize item");
                Ok(SpawnOutcome::MaterializeFailed(error))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn respawn_policy_defaults_to_never() {
        assert_eq!(Config::default().respawn(), RespawnPolicy::Never);
        assert_eq!(RespawnPolicy::default(), RespawnPolicy::Never);
    }

    #[test]
    fn empty_report_counts_nothing() {
        let report = SpawnReport::default();
        assert!(report.is_empty());
        assert_eq!(report.spawned(), 0);
        assert_eq!(report.outcome(&TemplateId::new("missing")), None);
    }
}
