#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Persistent spawn-once bookkeeping for item containers.
//!
//! [`SpawnStateStore`] tracks one [`SpawnRecord`] per `(container, template)`
//! pair and reconciles `Generated` records against the live host grid, so an
//! item that was taken is detected as consumed and never spawned twice. The
//! whole [`SpawnStateDocument`] is persisted as a single JSON blob through a
//! [`KeyValueStore`].

mod clock;
mod document;
mod persistence;

use std::collections::HashMap;

use stowage_core::{CellCoord, ContainerId, GridItem, HostGrid, ItemId, TemplateId};
use tracing::{debug, info, warn};

pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::document::{
    ContainerRecord, SpawnRecord, SpawnState, SpawnStateDocument, DOCUMENT_VERSION,
};
pub use crate::persistence::{FileStore, KeyValueStore, MemoryStore, PersistenceError};

/// Key the document is stored under.
pub const STORAGE_KEY: &str = "spawn_state";

/// Errors reported by [`SpawnStateStore`].
#[derive(Debug, thiserror::Error)]
pub enum SpawnStateError {
    /// The record is consumed or expired and must be reset before reuse.
    #[error("spawn of `{template}` in `{container}` is {state:?}; reset it first")]
    TerminalState {
        /// Container owning the record.
        container: ContainerId,
        /// Template tracked by the record.
        template: TemplateId,
        /// Terminal state the record is in.
        state: SpawnState,
    },
    /// The requested transition is not allowed from the current state.
    #[error("spawn of `{template}` in `{container}` cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        /// Container owning the record.
        container: ContainerId,
        /// Template tracked by the record.
        template: TemplateId,
        /// Current state.
        from: SpawnState,
        /// Requested state.
        to: SpawnState,
    },
    /// No record exists for the pair.
    #[error("no spawn record for `{template}` in `{container}`")]
    MissingRecord {
        /// Container that was queried.
        container: ContainerId,
        /// Template that was queried.
        template: TemplateId,
    },
    /// The document could not be encoded.
    #[error("failed to encode spawn state: {0}")]
    Encode(#[from] serde_json::Error),
    /// The persistence surface failed.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Where the document came from on the last load.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadSource {
    /// A stored document was decoded.
    Restored,
    /// Nothing was stored; a fresh document was created.
    Fresh,
    /// The stored blob was unreadable or of another version and was replaced.
    Recovered,
}

/// Number of records per state across every container.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SpawnSummary {
    /// Number of container records.
    pub containers: usize,
    /// Records never spawned.
    pub not_generated: usize,
    /// Records whose item is expected on the grid.
    pub generated: usize,
    /// Records whose item was taken.
    pub consumed: usize,
    /// Records that lapsed.
    pub expired: usize,
    /// Records parked by failing conditions.
    pub condition_not_met: usize,
}

impl SpawnSummary {
    /// Total number of spawn records.
    #[must_use]
    pub const fn records(&self) -> usize {
        self.not_generated + self.generated + self.consumed + self.expired + self.condition_not_met
    }

    fn count(&mut self, state: SpawnState) {
        let slot = match state {
            SpawnState::NotGenerated => &mut self.not_generated,
            SpawnState::Generated => &mut self.generated,
            SpawnState::Consumed => &mut self.consumed,
            SpawnState::Expired => &mut self.expired,
            SpawnState::ConditionNotMet => &mut self.condition_not_met,
        };
        *slot += 1;
    }
}

/// Spawn-state document plus its persistence surface and clock.
#[derive(Debug)]
pub struct SpawnStateStore<P, C> {
    persistence: P,
    clock: C,
    document: SpawnStateDocument,
    index: HashMap<ContainerId, usize>,
    dirty: bool,
}

impl<P: KeyValueStore, C: Clock> SpawnStateStore<P, C> {
    /// Creates a store and loads any document already persisted.
    #[must_use]
    pub fn open(persistence: P, clock: C) -> Self {
        let document = SpawnStateDocument::new(clock.now());
        let mut store = Self {
            persistence,
            clock,
            document,
            index: HashMap::new(),
            dirty: false,
        };
        let _ = store.load();
        store
    }

    /// Replaces the in-memory document with the persisted one.
    ///
    /// Absent, unparsable or foreign-version blobs are not fatal: the store
    /// starts from an empty document and reports how it got there.
    pub fn load(&mut self) -> LoadSource {
        let now = self.clock.now();
        let (document, source) = match self.persistence.get(STORAGE_KEY) {
            Ok(None) => (SpawnStateDocument::new(now), LoadSource::Fresh),
            Ok(Some(blob)) => match serde_json::from_str::<SpawnStateDocument>(&blob) {
                Ok(document) if document.version == DOCUMENT_VERSION => {
                    (document, LoadSource::Restored)
                }
                Ok(document) => {
                    warn!(version = %document.version, "unsupported spawn state version, starting fresh");
                    (SpawnStateDocument::new(now), LoadSource::Recovered)
                }
                Err(error) => {
                    warn!(%error, "corrupt spawn state, starting fresh");
                    (SpawnStateDocument::new(now), LoadSource::Recovered)
                }
            },
            Err(error) => {
                warn!(%error, "failed to read spawn state, starting fresh");
                (SpawnStateDocument::new(now), LoadSource::Recovered)
            }
        };

        self.document = document;
        self.rebuild_index();
        self.dirty = false;
        debug!(
            containers = self.document.containers.len(),
            ?source,
            "spawn state loaded"
        );
        source
    }

    /// Writes the document when it has unsaved changes.
    ///
    /// Returns `Ok(false)` without touching persistence when nothing changed.
    /// On failure the dirty flag is kept so a later save can retry.
    pub fn save(&mut self) -> Result<bool, SpawnStateError> {
        if !self.dirty {
            return Ok(false);
        }
        self.document.updated_at = self.clock.now();
        let blob = serde_json::to_string(&self.document)?;
        if let Err(error) = self.persistence.put(STORAGE_KEY, &blob) {
            warn!(%error, "failed to save spawn state");
            return Err(error.into());
        }
        self.dirty = false;
        info!(containers = self.document.containers.len(), "spawn state saved");
        Ok(true)
    }

    /// Reports whether the document has unsaved changes.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// In-memory document.
    #[must_use]
    pub fn document(&self) -> &SpawnStateDocument {
        &self.document
    }

    /// Persistence surface backing the store.
    #[must_use]
    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    /// Clock stamping the records.
    #[must_use]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Consumes the store, returning its persistence surface without saving.
    #[must_use]
    pub fn into_persistence(self) -> P {
        self.persistence
    }

    /// Container record, if the container was ever queried.
    #[must_use]
    pub fn container(&self, container: &ContainerId) -> Option<&ContainerRecord> {
        self.index
            .get(container)
            .and_then(|&index| self.document.containers.get(index))
    }

    /// Spawn record for the pair, if it exists.
    #[must_use]
    pub fn record(&self, container: &ContainerId, template: &TemplateId) -> Option<&SpawnRecord> {
        self.container(container)?.record(template)
    }

    /// Current state of the pair, if a record exists.
    #[must_use]
    pub fn state(&self, container: &ContainerId, template: &TemplateId) -> Option<SpawnState> {
        self.record(container, template).map(|record| record.state)
    }

    /// Per-state record counts.
    #[must_use]
    pub fn summary(&self) -> SpawnSummary {
        let mut summary = SpawnSummary {
            containers: self.document.containers.len(),
            ..SpawnSummary::default()
        };
        for record in self
            .document
            .containers
            .iter()
            .flat_map(|container| container.items.iter())
        {
            summary.count(record.state);
        }
        summary
    }

    /// Records the host-defined kind of a container.
    pub fn set_container_type(&mut self, container: &ContainerId, kind: impl Into<String>) {
        let kind = kind.into();
        let record = self.container_or_insert(container);
        if record.container_type != kind {
            record.container_type = kind;
            self.dirty = true;
        }
    }

    /// Decides whether `template` should be spawned into `container`.
    ///
    /// Creates the record on first query. `Generated` records are reconciled
    /// against `grid`: when no live item matches, the record becomes
    /// `Consumed` and the call returns `true` so the caller can apply its
    /// respawn policy; when one matches, its position is refreshed.
    pub fn should_spawn<G: HostGrid + ?Sized>(
        &mut self,
        container: &ContainerId,
        template: &TemplateId,
        grid: &G,
    ) -> bool {
        let now = self.clock.now();
        let existed = self.record(container, template).is_some();
        let (state, recorded_item) = {
            let record = self
                .container_or_insert(container)
                .record_or_insert(template, now);
            (record.state, record.item_id.clone())
        };
        if !existed {
            self.dirty = true;
        }

        match state {
            SpawnState::NotGenerated | SpawnState::ConditionNotMet => true,
            SpawnState::Consumed | SpawnState::Expired => false,
            SpawnState::Generated => {
                let found = find_spawned_item(&grid.items(), template, recorded_item.as_ref());
                self.dirty = true;
                let Some(record) = self.record_mut(container, template) else {
                    return false;
                };
                record.last_checked_at = now;
                match found {
                    Some(item) => {
                        if record.position != Some(item.origin) {
                            debug!(%container, %template, origin = %item.origin, "spawned item moved");
                            record.position = Some(item.origin);
                        }
                        if record.item_id.as_ref() != Some(&item.id) {
                            record.item_id = Some(item.id);
                        }
                        false
                    }
                    None => {
                        debug!(%container, %template, "spawned item missing, marking consumed");
                        record.state = SpawnState::Consumed;
                        record.remaining_quantity = 0;
                        true
                    }
                }
            }
        }
    }

    /// Records a successful spawn.
    ///
    /// Fails with [`SpawnStateError::TerminalState`] when the record is
    /// consumed or expired; call [`Self::reset_record`] first to spawn again.
    pub fn record_spawned(
        &mut self,
        container: &ContainerId,
        template: &TemplateId,
        item: ItemId,
        quantity: u32,
        position: CellCoord,
    ) -> Result<(), SpawnStateError> {
        if let Some(state) = self.state(container, template) {
            if state.is_terminal() {
                return Err(SpawnStateError::TerminalState {
                    container: container.clone(),
                    template: template.clone(),
                    state,
                });
            }
        }

        let now = self.clock.now();
        let owner = self.container_or_insert(container);
        owner.spawn_count = owner.spawn_count.saturating_add(1);
        let _ = owner.first_spawn_at.get_or_insert(now);
        owner.last_spawn_at = Some(now);

        let record = owner.record_or_insert(template, now);
        record.state = SpawnState::Generated;
        record.item_id = Some(item);
        record.spawned_quantity = quantity;
        record.remaining_quantity = quantity;
        record.position = Some(position);
        record.last_checked_at = now;
        self.dirty = true;
        info!(%container, %template, %position, quantity, "spawn recorded");
        Ok(())
    }

    /// Forces the pair into `Consumed`, creating the record if needed.
    pub fn record_consumed(&mut self, container: &ContainerId, template: &TemplateId) {
        let now = self.clock.now();
        let record = self
            .container_or_insert(container)
            .record_or_insert(template, now);
        record.state = SpawnState::Consumed;
        record.remaining_quantity = 0;
        record.last_checked_at = now;
        self.dirty = true;
    }

    /// Marks a generated spawn as lapsed.
    pub fn record_expired(
        &mut self,
        container: &ContainerId,
        template: &TemplateId,
    ) -> Result<(), SpawnStateError> {
        self.transition(container, template, SpawnState::Expired, |from| {
            matches!(from, SpawnState::Generated | SpawnState::Expired)
        })
    }

    /// Parks a not-yet-spawned record until its conditions hold.
    pub fn record_condition_not_met(
        &mut self,
        container: &ContainerId,
        template: &TemplateId,
    ) -> Result<(), SpawnStateError> {
        let now = self.clock.now();
        let _ = self
            .container_or_insert(container)
            .record_or_insert(template, now);
        self.transition(container, template, SpawnState::ConditionNotMet, |from| {
            matches!(from, SpawnState::NotGenerated | SpawnState::ConditionNotMet)
        })
    }

    /// Updates the quantity left on a generated spawn; zero consumes it.
    pub fn record_remaining(
        &mut self,
        container: &ContainerId,
        template: &TemplateId,
        remaining: u32,
    ) -> Result<(), SpawnStateError> {
        let now = self.clock.now();
        let record = self.existing_record_mut(container, template)?;
        if record.state != SpawnState::Generated {
            return Err(SpawnStateError::InvalidTransition {
                container: container.clone(),
                template: template.clone(),
                from: record.state,
                to: SpawnState::Generated,
            });
        }
        record.remaining_quantity = remaining;
        record.last_checked_at = now;
        if remaining == 0 {
            record.state = SpawnState::Consumed;
        }
        self.dirty = true;
        Ok(())
    }

    /// Returns a record to `NotGenerated`, forgetting its item.
    ///
    /// Returns `false` when no record existed.
    pub fn reset_record(&mut self, container: &ContainerId, template: &TemplateId) -> bool {
        let now = self.clock.now();
        let Some(record) = self.record_mut(container, template) else {
            return false;
        };
        *record = SpawnRecord::new(template.clone(), now);
        self.dirty = true;
        info!(%container, %template, "spawn record reset");
        true
    }

    /// Removes every record of one container and saves immediately.
    pub fn reset_container(&mut self, container: &ContainerId) -> Result<(), SpawnStateError> {
        if self.index.contains_key(container) {
            self.document
                .containers
                .retain(|record| &record.container_id != container);
            self.rebuild_index();
            self.dirty = true;
            info!(%container, "container spawn state reset");
        }
        let _ = self.save()?;
        Ok(())
    }

    /// Removes every record and saves immediately.
    pub fn reset_all(&mut self) -> Result<(), SpawnStateError> {
        self.document.containers.clear();
        self.index.clear();
        self.dirty = true;
        info!("all spawn state reset");
        let _ = self.save()?;
        Ok(())
    }

    fn transition(
        &mut self,
        container: &ContainerId,
        template: &TemplateId,
        to: SpawnState,
        allowed: impl Fn(SpawnState) -> bool,
    ) -> Result<(), SpawnStateError> {
        let now = self.clock.now();
        let record = self.existing_record_mut(container, template)?;
        if !allowed(record.state) {
            return Err(SpawnStateError::InvalidTransition {
                container: container.clone(),
                template: template.clone(),
                from: record.state,
                to,
            });
        }
        record.state = to;
        record.last_checked_at = now;
        self.dirty = true;
        Ok(())
    }

    fn existing_record_mut(
        &mut self,
        container: &ContainerId,
        template: &TemplateId,
    ) -> Result<&mut SpawnRecord, SpawnStateError> {
        self.record_mut(container, template)
            .ok_or_else(|| SpawnStateError::MissingRecord {
                container: container.clone(),
                template: template.clone(),
            })
    }

    fn record_mut(
        &mut self,
        container: &ContainerId,
        template: &TemplateId,
    ) -> Option<&mut SpawnRecord> {
        let index = *self.index.get(container)?;
        self.document
            .containers
            .get_mut(index)?
            .record_mut(template)
    }

    fn container_or_insert(&mut self, container: &ContainerId) -> &mut ContainerRecord {
        let existing = self.index.get(container).copied();
        let index = match existing {
            Some(index) => index,
            None => {
                self.document
                    .containers
                    .push(ContainerRecord::new(container.clone()));
                let index = self.document.containers.len() - 1;
                let _ = self.index.insert(container.clone(), index);
                self.dirty = true;
                index
            }
        };
        &mut self.document.containers[index]
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .document
            .containers
            .iter()
            .enumerate()
            .map(|(index, record)| (record.container_id.clone(), index))
            .collect();
    }
}

/// Picks the live item best matching a generated spawn.
///
/// Tagged items match on the template id, preferring the recorded item id.
/// Untagged items fall back to an exact id match, then to an id containing
/// the recorded one.
fn find_spawned_item(
    items: &[GridItem],
    template: &TemplateId,
    recorded: Option<&ItemId>,
) -> Option<GridItem> {
    let mut best: Option<(u8, &GridItem)> = None;
    for item in items {
        let same_id = recorded == Some(&item.id);
        let rank = match &item.spawn_tag {
            Some(tag) if tag == template && same_id => 0,
            Some(tag) if tag == template => 1,
            Some(_) => continue,
            None if same_id => 2,
            None => match recorded {
                Some(recorded)
                    if !recorded.as_str().is_empty()
                        && item.id.as_str().contains(recorded.as_str()) =>
                {
                    3
                }
                _ => continue,
            },
        };
        if best.map_or(true, |(best_rank, _)| rank < best_rank) {
            best = Some((rank, item));
        }
    }
    best.map(|(_, item)| item.clone())
}
