#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Reference in-memory host grid for the Stowage engine.
//!
//! [`Container`] owns a dense occupancy grid and an item registry. It
//! implements [`HostGrid`] so the analyzer and the spawn-state tracker can read
//! it, and [`Materialize`] so the spawn service can create items at chosen
//! placements. Real hosts (inventory UIs, engine-side grids) implement the same
//! traits over their own storage.

mod items;

use stowage_core::{
    CellCoord, CellRect, CellRectSize, GridItem, HostGrid, ItemId, ItemTemplate, Materialize,
    MaterializeError, Placement, TemplateId,
};

use crate::items::{ItemKey, ItemRegistry, StoredItem};

/// Reasons a container mutation may be rejected.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ContainerError {
    /// The footprint has a zero dimension or leaves the grid.
    #[error("footprint {size} at {origin} does not fit inside the grid")]
    OutOfBounds {
        /// Requested origin.
        origin: CellCoord,
        /// Requested footprint.
        size: CellRectSize,
    },
    /// The footprint overlaps another item.
    #[error("footprint at {origin} overlaps item `{occupant}`")]
    Occupied {
        /// Requested origin.
        origin: CellCoord,
        /// Item already covering part of the footprint.
        occupant: ItemId,
    },
    /// Another item already uses the identity.
    #[error("item `{0}` already exists")]
    DuplicateId(ItemId),
    /// No item with the identity exists.
    #[error("item `{0}` does not exist")]
    MissingItem(ItemId),
}

/// Description of an item to insert into a container.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemSpec {
    /// Identity to assign; allocated from the spawn tag (or `item`) when absent.
    pub id: Option<ItemId>,
    /// Upper-left cell of the footprint.
    pub origin: CellCoord,
    /// Footprint size.
    pub size: CellRectSize,
    /// Template tag used for reconciliation.
    pub spawn_tag: Option<TemplateId>,
    /// Stack quantity.
    pub quantity: u32,
}

impl ItemSpec {
    /// Untagged single item with an explicit identity.
    #[must_use]
    pub fn new(id: impl Into<String>, origin: CellCoord, size: CellRectSize) -> Self {
        Self {
            id: Some(ItemId::new(id)),
            origin,
            size,
            spawn_tag: None,
            quantity: 1,
        }
    }

    /// Overrides the spawn tag.
    #[must_use]
    pub fn tagged(mut self, template: impl Into<String>) -> Self {
        self.spawn_tag = Some(TemplateId::new(template));
        self
    }

    /// Overrides the stack quantity.
    #[must_use]
    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }
}

/// Grid-backed item container acting as the authoritative host.
#[derive(Debug)]
pub struct Container {
    occupancy: OccupancyGrid,
    items: ItemRegistry,
}

impl Container {
    /// Creates an empty container with the provided dimensions.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            occupancy: OccupancyGrid::new(width, height),
            items: ItemRegistry::new(),
        }
    }

    /// Number of items currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Reports whether the container holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.len() == 0
    }

    /// Inserts an item, rejecting overlaps, overhangs and duplicate identities.
    pub fn insert(&mut self, spec: ItemSpec) -> Result<ItemId, ContainerError> {
        let region = CellRect::from_origin_and_size(spec.origin, spec.size);
        self.check_footprint(region, None)?;

        let id = match spec.id {
            Some(id) => {
                if self.items.key_of(&id).is_some() {
                    return Err(ContainerError::DuplicateId(id));
                }
                id
            }
            None => {
                let tag = spec
                    .spawn_tag
                    .clone()
                    .unwrap_or_else(|| TemplateId::new("item"));
                self.items.allocate_id(&tag)
            }
        };

        let key = self.items.insert(StoredItem {
            id: id.clone(),
            region,
            spawn_tag: spec.spawn_tag,
            quantity: spec.quantity,
        });
        self.occupancy.fill(region, Some(key));
        Ok(id)
    }

    /// Removes an item, returning its last reported view.
    pub fn remove(&mut self, id: &ItemId) -> Result<GridItem, ContainerError> {
        let key = self.key_for(id)?;
        let item = self
            .items
            .remove(key)
            .ok_or_else(|| ContainerError::MissingItem(id.clone()))?;
        self.occupancy.fill(item.region, None);
        Ok(item.to_grid_item())
    }

    /// Moves an item to a new origin, keeping its footprint.
    pub fn move_item(&mut self, id: &ItemId, origin: CellCoord) -> Result<(), ContainerError> {
        let key = self.key_for(id)?;
        let current = self
            .items
            .get(key)
            .map(|item| item.region)
            .ok_or_else(|| ContainerError::MissingItem(id.clone()))?;
        let target = CellRect::from_origin_and_size(origin, current.size());
        self.check_footprint(target, Some(key))?;

        self.occupancy.fill(current, None);
        self.occupancy.fill(target, Some(key));
        if let Some(item) = self.items.get_mut(key) {
            item.region = target;
        }
        Ok(())
    }

    /// Stack quantity of an item.
    #[must_use]
    pub fn quantity(&self, id: &ItemId) -> Option<u32> {
        let key = self.items.key_of(id)?;
        self.items.get(key).map(|item| item.quantity)
    }

    /// Overrides the stack quantity of an item.
    pub fn set_quantity(&mut self, id: &ItemId, quantity: u32) -> Result<(), ContainerError> {
        let key = self.key_for(id)?;
        if let Some(item) = self.items.get_mut(key) {
            item.quantity = quantity;
        }
        Ok(())
    }

    fn key_for(&self, id: &ItemId) -> Result<ItemKey, ContainerError> {
        self.items
            .key_of(id)
            .ok_or_else(|| ContainerError::MissingItem(id.clone()))
    }

    fn check_footprint(&self, region: CellRect, ignore: Option<ItemKey>) -> Result<(), ContainerError> {
        let (width, height) = self.occupancy.dimensions();
        if region.size().is_empty() || !CellRect::grid(width, height).contains_rect(&region) {
            return Err(ContainerError::OutOfBounds {
                origin: region.origin(),
                size: region.size(),
            });
        }

        for cell in region.cells() {
            let Some(occupant) = self.occupancy.occupant(cell) else {
                continue;
            };
            if Some(occupant) == ignore {
                continue;
            }
            let occupant = self
                .items
                .get(occupant)
                .map(|item| item.id.clone())
                .unwrap_or_default();
            return Err(ContainerError::Occupied {
                origin: region.origin(),
                occupant,
            });
        }
        Ok(())
    }
}

impl HostGrid for Container {
    fn width(&self) -> u32 {
        self.occupancy.dimensions().0
    }

    fn height(&self) -> u32 {
        self.occupancy.dimensions().1
    }

    fn item_at(&self, cell: CellCoord) -> Option<GridItem> {
        let key = self.occupancy.occupant(cell)?;
        self.items.get(key).map(StoredItem::to_grid_item)
    }

    fn items(&self) -> Vec<GridItem> {
        self.items.iter().map(|(_, item)| item.to_grid_item()).collect()
    }
}

impl Materialize for Container {
    fn materialize(
        &mut self,
        template: &ItemTemplate,
        placement: Placement,
    ) -> Result<ItemId, MaterializeError> {
        let spec = ItemSpec {
            id: None,
            origin: placement.origin,
            size: placement.size,
            spawn_tag: Some(template.id.clone()),
            quantity: template.quantity,
        };
        self.insert(spec).map_err(|error| match error {
            ContainerError::OutOfBounds { origin, size } => {
                MaterializeError::OutOfBounds { origin, size }
            }
            ContainerError::Occupied { origin, occupant } => {
                MaterializeError::Occupied { origin, occupant }
            }
            other => MaterializeError::Rejected {
                template: template.id.clone(),
                reason: other.to_string(),
            },
        })
    }
}

/// Query functions that provide read-only access to container state.
pub mod query {
    use super::Container;
    use stowage_core::ItemId;

    /// Snapshot of a stored item including host-only attributes.
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct ItemSnapshot {
        /// Engine-facing view of the item.
        pub item: stowage_core::GridItem,
        /// Stack quantity carried by the item.
        pub quantity: u32,
    }

    /// Captures every stored item in insertion order.
    #[must_use]
    pub fn snapshots(container: &Container) -> Vec<ItemSnapshot> {
        container
            .items
            .iter()
            .map(|(_, stored)| ItemSnapshot {
                item: stored.to_grid_item(),
                quantity: stored.quantity,
            })
            .collect()
    }

    /// Reports whether an item with the identity is present.
    #[must_use]
    pub fn contains(container: &Container, id: &ItemId) -> bool {
        container.items.key_of(id).is_some()
    }
}

#[derive(Clone, Debug)]
struct OccupancyGrid {
    columns: u32,
    rows: u32,
    cells: Vec<Option<ItemKey>>,
}

impl OccupancyGrid {
    fn new(columns: u32, rows: u32) -> Self {
        let capacity_u64 = u64::from(columns) * u64::from(rows);
        let capacity = usize::try_from(capacity_u64).unwrap_or(0);
        Self {
            columns,
            rows,
            cells: vec![None; capacity],
        }
    }

    fn occupant(&self, cell: CellCoord) -> Option<ItemKey> {
        self.index(cell)
            .and_then(|index| self.cells.get(index).copied().flatten())
    }

    fn fill(&mut self, region: CellRect, value: Option<ItemKey>) {
        for cell in region.cells() {
            if let Some(index) = self.index(cell) {
                if let Some(slot) = self.cells.get_mut(index) {
                    *slot = value;
                }
            }
        }
    }

    fn index(&self, cell: CellCoord) -> Option<usize> {
        if cell.column() < self.columns && cell.row() < self.rows {
            let row = usize::try_from(cell.row()).ok()?;
            let column = usize::try_from(cell.column()).ok()?;
            let width = usize::try_from(self.columns).ok()?;
            Some(row * width + column)
        } else {
            None
        }
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.columns, self.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size(width: u32, height: u32) -> CellRectSize {
        CellRectSize::new(width, height)
    }

    #[test]
    fn insert_rejects_overlap() {
        let mut container = Container::new(4, 4);
        let _ = container
            .insert(ItemSpec::new("crate", CellCoord::new(0, 0), size(2, 2)))
            .expect("first insert succeeds");

        let error = container
            .insert(ItemSpec::new("box", CellCoord::new(1, 1), size(2, 2)))
            .expect_err("overlap rejected");
        assert_eq!(
            error,
            ContainerError::Occupied {
                origin: CellCoord::new(1, 1),
                occupant: ItemId::new("crate"),
            }
        );
    }

    #[test]
    fn insert_rejects_overhang() {
        let mut container = Container::new(4, 4);
        let error = container
            .insert(ItemSpec::new("pipe", CellCoord::new(3, 0), size(2, 1)))
            .expect_err("overhang rejected");
        assert!(matches!(error, ContainerError::OutOfBounds { .. }));
    }

    #[test]
    fn item_at_reports_every_covered_cell() {
        let mut container = Container::new(4, 4);
        let id = container
            .insert(ItemSpec::new("rifle", CellCoord::new(1, 0), size(3, 1)).tagged("rifle"))
            .expect("insert succeeds");

        for column in 1..4 {
            let item = container
                .item_at(CellCoord::new(column, 0))
                .expect("cell covered");
            assert_eq!(item.id, id);
            assert_eq!(item.spawn_tag, Some(TemplateId::new("rifle")));
        }
        assert!(container.item_at(CellCoord::new(0, 0)).is_none());
    }

    #[test]
    fn move_item_may_overlap_its_own_footprint() {
        let mut container = Container::new(4, 4);
        let id = container
            .insert(ItemSpec::new("bag", CellCoord::new(0, 0), size(2, 2)))
            .expect("insert succeeds");

        container
            .move_item(&id, CellCoord::new(1, 1))
            .expect("move succeeds");

        assert!(container.item_at(CellCoord::new(0, 0)).is_none());
        assert_eq!(
            container.item_at(CellCoord::new(2, 2)).map(|item| item.id),
            Some(id)
        );
    }

    #[test]
    fn remove_frees_cells() {
        let mut container = Container::new(3, 3);
        let id = container
            .insert(ItemSpec::new("key", CellCoord::new(2, 2), size(1, 1)))
            .expect("insert succeeds");

        let removed = container.remove(&id).expect("remove succeeds");
        assert_eq!(removed.origin, CellCoord::new(2, 2));
        assert!(container.is_empty());
        assert!(container.item_at(CellCoord::new(2, 2)).is_none());
        assert_eq!(
            container.remove(&id),
            Err(ContainerError::MissingItem(id))
        );
    }

    #[test]
    fn materialize_tags_items_with_template() {
        let mut container = Container::new(5, 5);
        let template = ItemTemplate::new("ration", size(1, 2)).with_quantity(4);
        let placement = Placement {
            origin: CellCoord::new(0, 0),
            size: size(2, 1),
            rotated: true,
        };

        let id = container
            .materialize(&template, placement)
            .expect("materialize succeeds");

        assert_eq!(id.as_str(), "ration#1");
        assert_eq!(container.quantity(&id), Some(4));
        let item = container.item_at(CellCoord::new(1, 0)).expect("covered");
        assert_eq!(item.size, size(2, 1));
        assert_eq!(item.spawn_tag, Some(template.id));
    }
}
