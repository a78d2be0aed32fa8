//! Persisted spawn-state schema.

use serde::{Deserialize, Serialize};
use stowage_core::{CellCoord, ContainerId, ItemId, TemplateId};

/// Schema version written into every document.
pub const DOCUMENT_VERSION: &str = "1.0";

/// Lifecycle of one configured spawn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpawnState {
    /// The template has never been spawned for this container.
    #[default]
    NotGenerated,
    /// The item was spawned and is expected on the grid.
    Generated,
    /// The spawned item was taken or used up.
    Consumed,
    /// The spawn lapsed without being taken.
    Expired,
    /// Spawn conditions failed on the last evaluation; re-checked next time.
    ConditionNotMet,
}

impl SpawnState {
    /// Reports whether only an explicit reset can leave this state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Consumed | Self::Expired)
    }
}

/// Spawn lifecycle of one template inside one container.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnRecord {
    /// Template the record tracks.
    pub template_id: TemplateId,
    /// Identity of the spawned item, once known.
    pub item_id: Option<ItemId>,
    /// Current lifecycle state.
    pub state: SpawnState,
    /// Quantity assigned when the item was spawned.
    pub spawned_quantity: u32,
    /// Quantity believed to remain on the grid.
    pub remaining_quantity: u32,
    /// Origin the item was last seen at.
    pub position: Option<CellCoord>,
    /// Last time the record was evaluated, in Unix seconds.
    pub last_checked_at: u64,
}

impl SpawnRecord {
    pub(crate) fn new(template_id: TemplateId, now: u64) -> Self {
        Self {
            template_id,
            item_id: None,
            state: SpawnState::NotGenerated,
            spawned_quantity: 0,
            remaining_quantity: 0,
            position: None,
            last_checked_at: now,
        }
    }
}

/// Spawn records of one container plus its spawn statistics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRecord {
    /// Container the records belong to.
    pub container_id: ContainerId,
    /// Host-defined kind of container, empty when never set.
    pub container_type: String,
    /// Number of successful spawns recorded.
    pub spawn_count: u32,
    /// Time of the first recorded spawn, in Unix seconds.
    pub first_spawn_at: Option<u64>,
    /// Time of the latest recorded spawn, in Unix seconds.
    pub last_spawn_at: Option<u64>,
    /// Records in creation order.
    pub items: Vec<SpawnRecord>,
}

impl ContainerRecord {
    pub(crate) fn new(container_id: ContainerId) -> Self {
        Self {
            container_id,
            container_type: String::new(),
            spawn_count: 0,
            first_spawn_at: None,
            last_spawn_at: None,
            items: Vec::new(),
        }
    }

    /// Record tracking `template`, if one exists.
    #[must_use]
    pub fn record(&self, template: &TemplateId) -> Option<&SpawnRecord> {
        self.items.iter().find(|record| &record.template_id == template)
    }

    pub(crate) fn record_mut(&mut self, template: &TemplateId) -> Option<&mut SpawnRecord> {
        self.items
            .iter_mut()
            .find(|record| &record.template_id == template)
    }

    pub(crate) fn record_or_insert(&mut self, template: &TemplateId, now: u64) -> &mut SpawnRecord {
        let position = match self
            .items
            .iter()
            .position(|record| &record.template_id == template)
        {
            Some(position) => position,
            None => {
                self.items.push(SpawnRecord::new(template.clone(), now));
                self.items.len() - 1
            }
        };
        &mut self.items[position]
    }
}

/// Root persisted aggregate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnStateDocument {
    /// Schema version, see [`DOCUMENT_VERSION`].
    pub version: String,
    /// Creation time in Unix seconds.
    pub created_at: u64,
    /// Time of the latest save in Unix seconds.
    pub updated_at: u64,
    /// Containers in creation order.
    pub containers: Vec<ContainerRecord>,
}

impl SpawnStateDocument {
    /// Creates an empty document stamped with `now`.
    #[must_use]
    pub fn new(now: u64) -> Self {
        Self {
            version: DOCUMENT_VERSION.to_owned(),
            created_at: now,
            updated_at: now,
            containers: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_uses_camel_case_field_names() {
        let mut document = SpawnStateDocument::new(100);
        let mut container = ContainerRecord::new(ContainerId::new("locker-3"));
        container.container_type = "locker".to_owned();
        let record = container.record_or_insert(&TemplateId::new("flare"), 100);
        record.state = SpawnState::Generated;
        record.item_id = Some(ItemId::new("flare#1"));
        record.position = Some(CellCoord::new(2, 1));
        document.containers.push(container);

        let json = serde_json::to_value(&document).expect("document serializes");
        let container = &json["containers"][0];
        assert_eq!(json["createdAt"], 100);
        assert_eq!(container["containerId"], "locker-3");
        assert_eq!(container["containerType"], "locker");
        assert_eq!(container["spawnCount"], 0);
        assert!(container["firstSpawnAt"].is_null());
        let item = &container["items"][0];
        assert_eq!(item["templateId"], "flare");
        assert_eq!(item["itemId"], "flare#1");
        assert_eq!(item["state"], "Generated");
        assert_eq!(item["position"]["column"], 2);
        assert_eq!(item["lastCheckedAt"], 100);
    }

    #[test]
    fn record_or_insert_reuses_existing_records() {
        let mut container = ContainerRecord::new(ContainerId::new("chest"));
        let template = TemplateId::new("ammo");
        container.record_or_insert(&template, 1).spawned_quantity = 5;
        let again = container.record_or_insert(&template, 2);
        assert_eq!(again.spawned_quantity, 5);
        assert_eq!(container.items.len(), 1);
    }

    #[test]
    fn only_consumed_and_expired_are_terminal() {
        assert!(SpawnState::Consumed.is_terminal());
        assert!(SpawnState::Expired.is_terminal());
        assert!(!SpawnState::Generated.is_terminal());
        assert!(!SpawnState::ConditionNotMet.is_terminal());
        assert!(!SpawnState::NotGenerated.is_terminal());
    }
}
