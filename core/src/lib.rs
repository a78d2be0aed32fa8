#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Stowage placement engine.
//!
//! This crate defines the plain-data surface that connects host grids, the
//! occupancy analyzer, the placement strategy and the spawn-state tracker.
//! Hosts expose their contents through [`HostGrid`], receive positions as
//! [`Placement`] values and materialize items through [`Materialize`]. Item
//! templates describe what should be spawned and how a position is chosen via
//! [`PlacementPolicy`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Location of a single grid cell expressed as column and row coordinates.
///
/// Columns grow to the right (`x`) and rows grow downwards (`y`).
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct CellCoord {
    column: u32,
    row: u32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }

    /// Squared Euclidean distance between two cells.
    #[must_use]
    pub fn distance_squared(self, other: CellCoord) -> u64 {
        let dx = u64::from(self.column.abs_diff(other.column));
        let dy = u64::from(self.row.abs_diff(other.row));
        dx * dx + dy * dy
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.column, self.row)
    }
}

/// Size of a [`CellRect`] measured in whole cells.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRectSize {
    width: u32,
    height: u32,
}

impl CellRectSize {
    /// Creates a new size descriptor with explicit dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width of the rectangle in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height of the rectangle in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Number of cells covered by a rectangle of this size.
    #[must_use]
    pub const fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Reports whether either dimension is zero.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Returns the size with width and height swapped.
    #[must_use]
    pub const fn rotated(self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }

    /// Reports whether swapping the dimensions produces the same size.
    #[must_use]
    pub const fn is_square(&self) -> bool {
        self.width == self.height
    }
}

impl fmt::Display for CellRectSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Axis-aligned rectangle expressed in cell coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRect {
    origin: CellCoord,
    size: CellRectSize,
}

impl CellRect {
    /// Constructs a rectangle from an origin cell and size.
    #[must_use]
    pub const fn from_origin_and_size(origin: CellCoord, size: CellRectSize) -> Self {
        Self { origin, size }
    }

    /// Rectangle covering a whole `width` x `height` grid.
    #[must_use]
    pub const fn grid(width: u32, height: u32) -> Self {
        Self {
            origin: CellCoord::new(0, 0),
            size: CellRectSize::new(width, height),
        }
    }

    /// Upper-left cell that anchors the rectangle.
    #[must_use]
    pub const fn origin(&self) -> CellCoord {
        self.origin
    }

    /// Dimensions of the rectangle measured in whole cells.
    #[must_use]
    pub const fn size(&self) -> CellRectSize {
        self.size
    }

    /// Exclusive column bound, widened so it never overflows.
    #[must_use]
    pub const fn right(&self) -> u64 {
        self.origin.column() as u64 + self.size.width() as u64
    }

    /// Exclusive row bound, widened so it never overflows.
    #[must_use]
    pub const fn bottom(&self) -> u64 {
        self.origin.row() as u64 + self.size.height() as u64
    }

    /// Reports whether the cell lies inside the rectangle.
    #[must_use]
    pub fn contains(&self, cell: CellCoord) -> bool {
        cell.column() >= self.origin.column()
            && cell.row() >= self.origin.row()
            && u64::from(cell.column()) < self.right()
            && u64::from(cell.row()) < self.bottom()
    }

    /// Reports whether `other` lies entirely inside this rectangle.
    #[must_use]
    pub fn contains_rect(&self, other: &CellRect) -> bool {
        other.origin.column() >= self.origin.column()
            && other.origin.row() >= self.origin.row()
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Overlapping part of two rectangles, if they share at least one cell.
    #[must_use]
    pub fn intersection(&self, other: &CellRect) -> Option<CellRect> {
        let left = self.origin.column().max(other.origin.column());
        let top = self.origin.row().max(other.origin.row());
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if u64::from(left) >= right || u64::from(top) >= bottom {
            return None;
        }

        let width = u32::try_from(right - u64::from(left)).ok()?;
        let height = u32::try_from(bottom - u64::from(top)).ok()?;
        Some(CellRect::from_origin_and_size(
            CellCoord::new(left, top),
            CellRectSize::new(width, height),
        ))
    }

    /// Reports whether the rectangles share at least one cell.
    #[must_use]
    pub fn intersects(&self, other: &CellRect) -> bool {
        self.intersection(other).is_some()
    }

    /// Cell nearest to the geometric center, rounding towards the origin.
    ///
    /// Saturates at `u32::MAX` for rectangles reaching past the coordinate space.
    #[must_use]
    pub const fn center(&self) -> CellCoord {
        CellCoord::new(
            self.origin
                .column()
                .saturating_add(self.size.width().saturating_sub(1) / 2),
            self.origin
                .row()
                .saturating_add(self.size.height().saturating_sub(1) / 2),
        )
    }

    /// The rectangle trimmed to the cells whose coordinates fit in `u32`.
    #[must_use]
    pub fn addressable(&self) -> CellRect {
        let fit = |start: u32, len: u32| len.min((u32::MAX - start).saturating_add(1));
        CellRect::from_origin_and_size(
            self.origin,
            CellRectSize::new(
                fit(self.origin.column(), self.size.width()),
                fit(self.origin.row(), self.size.height()),
            ),
        )
    }

    /// Iterates every addressable cell of the rectangle, rows outer and columns inner.
    pub fn cells(&self) -> impl Iterator<Item = CellCoord> {
        let bounded = self.addressable();
        let origin = bounded.origin;
        let size = bounded.size;
        (0..size.height()).flat_map(move |dy| {
            (0..size.width()).map(move |dx| CellCoord::new(origin.column() + dx, origin.row() + dy))
        })
    }
}

/// Stable identity assigned to a live item by its host grid.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Creates an item identifier from any string-like value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrows the textual form of the identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a configured item template.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateId(String);

impl TemplateId {
    /// Creates a template identifier from any string-like value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrows the textual form of the identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a container (chest, corpse, locker) whose grid receives spawns.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(String);

impl ContainerId {
    /// Creates a container identifier from any string-like value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrows the textual form of the identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Plain-data view of a live item as reported by a host grid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GridItem {
    /// Stable identity of the item.
    pub id: ItemId,
    /// Upper-left cell of the item's declared footprint.
    pub origin: CellCoord,
    /// Declared footprint size.
    pub size: CellRectSize,
    /// Template that spawned the item, when the host tagged it.
    pub spawn_tag: Option<TemplateId>,
}

impl GridItem {
    /// Rectangle covered by the item's declared footprint.
    #[must_use]
    pub const fn region(&self) -> CellRect {
        CellRect::from_origin_and_size(self.origin, self.size)
    }
}

/// Read-only surface a host grid exposes to the engine.
pub trait HostGrid {
    /// Number of columns in the grid.
    fn width(&self) -> u32;

    /// Number of rows in the grid.
    fn height(&self) -> u32;

    /// Item covering the provided cell, if any.
    fn item_at(&self, cell: CellCoord) -> Option<GridItem>;

    /// Every live item, each reported once in row-major discovery order.
    ///
    /// The default implementation probes every cell and deduplicates by item
    /// identity. Hosts with an item list should override it.
    fn items(&self) -> Vec<GridItem> {
        let mut seen = std::collections::HashSet::new();
        let mut items = Vec::new();
        for cell in CellRect::grid(self.width(), self.height()).cells() {
            if let Some(item) = self.item_at(cell) {
                if seen.insert(item.id.clone()) {
                    items.push(item);
                }
            }
        }
        items
    }
}

/// Reasons a host may refuse to materialize an item.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MaterializeError {
    /// The footprint leaves the host grid.
    #[error("footprint {size} at {origin} leaves the grid")]
    OutOfBounds {
        /// Requested origin.
        origin: CellCoord,
        /// Requested footprint.
        size: CellRectSize,
    },
    /// The footprint overlaps an existing item.
    #[error("footprint at {origin} overlaps item `{occupant}`")]
    Occupied {
        /// Requested origin.
        origin: CellCoord,
        /// Item already covering part of the footprint.
        occupant: ItemId,
    },
    /// The host rejected the template for its own reasons.
    #[error("host rejected template `{template}`: {reason}")]
    Rejected {
        /// Template the host refused.
        template: TemplateId,
        /// Host supplied explanation.
        reason: String,
    },
}

/// Mutable host surface used to create items at chosen placements.
pub trait Materialize {
    /// Creates an item for `template` at `placement`, returning its identity.
    ///
    /// Hosts should tag the new item with the template id so later
    /// reconciliation can find it.
    fn materialize(
        &mut self,
        template: &ItemTemplate,
        placement: Placement,
    ) -> Result<ItemId, MaterializeError>;
}

/// Free area of a grid reported as a placement candidate window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    /// Upper-left cell of the region's bounding box.
    pub position: CellCoord,
    /// Bounding box of the free component.
    pub size: CellRectSize,
    /// Number of free cells in the component.
    pub area: u64,
}

impl Region {
    /// Bounding box of the region as a rectangle.
    #[must_use]
    pub const fn bounds(&self) -> CellRect {
        CellRect::from_origin_and_size(self.position, self.size)
    }
}

/// Order in which candidate cells are visited inside a search rectangle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanPattern {
    /// Top row first, left to right.
    #[default]
    RowMajor,
    /// Left column first, top to bottom.
    ColumnMajor,
    /// Breadth-first expansion from the center cell.
    SpiralOut,
    /// All cells ordered by distance to the center cell.
    CenterToEdge,
    /// Origins of known free regions, largest first.
    LargestGapFirst,
}

impl ScanPattern {
    /// Every supported pattern in declaration order.
    pub const ALL: [ScanPattern; 5] = [
        ScanPattern::RowMajor,
        ScanPattern::ColumnMajor,
        ScanPattern::SpiralOut,
        ScanPattern::CenterToEdge,
        ScanPattern::LargestGapFirst,
    ];
}

/// How a position is chosen for an item.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlacementKind {
    /// Place at exactly this cell or not at all.
    Exact {
        /// Required upper-left cell.
        position: CellCoord,
    },
    /// Unconstrained search over the whole grid.
    #[default]
    Smart,
    /// Search only inside the rectangle.
    AreaConstrained {
        /// Rectangle the whole footprint must stay inside.
        area: CellRect,
    },
    /// Prefer the rectangle, fall back to a smart search of the whole grid.
    Priority {
        /// Rectangle searched first and rewarded while scoring.
        preferred: CellRect,
    },
}

/// Complete request handed to the placement strategy for one item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlacementPolicy {
    /// Policy variant driving the search.
    pub kind: PlacementKind,
    /// Scan order used inside constrained rectangles and as the last smart stage.
    pub scan_pattern: ScanPattern,
    /// Whether a rotated retry is allowed when nothing fits.
    pub allow_rotation: bool,
    /// Footprint of the item being placed.
    pub size: CellRectSize,
}

impl PlacementPolicy {
    /// Creates a policy with row-major scanning and rotation disabled.
    #[must_use]
    pub const fn new(kind: PlacementKind, size: CellRectSize) -> Self {
        Self {
            kind,
            scan_pattern: ScanPattern::RowMajor,
            allow_rotation: false,
            size,
        }
    }

    /// Overrides the scan pattern.
    #[must_use]
    pub const fn with_scan_pattern(mut self, scan_pattern: ScanPattern) -> Self {
        self.scan_pattern = scan_pattern;
        self
    }

    /// Overrides whether rotation is allowed.
    #[must_use]
    pub const fn with_rotation(mut self, allow_rotation: bool) -> Self {
        self.allow_rotation = allow_rotation;
        self
    }

    /// Rectangle rewarded by the preferred-zone scoring term.
    #[must_use]
    pub const fn preferred_zone(&self) -> Option<CellRect> {
        match self.kind {
            PlacementKind::Priority { preferred } => Some(preferred),
            _ => None,
        }
    }

    /// Same request with the footprint rotated and further rotation disabled.
    #[must_use]
    pub const fn rotated(self) -> Self {
        Self {
            size: self.size.rotated(),
            allow_rotation: false,
            ..self
        }
    }
}

/// Position chosen by the placement strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    /// Upper-left cell at which the item should be materialized.
    pub origin: CellCoord,
    /// Footprint actually used, swapped when `rotated` is set.
    pub size: CellRectSize,
    /// Whether the item was rotated to fit.
    pub rotated: bool,
}

impl Placement {
    /// Rectangle the item will cover.
    #[must_use]
    pub const fn region(&self) -> CellRect {
        CellRect::from_origin_and_size(self.origin, self.size)
    }
}

fn default_quantity() -> u32 {
    1
}

/// Configured, not-yet-instantiated item descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemTemplate {
    /// Identity used to track the template's spawn state.
    pub id: TemplateId,
    /// Footprint in its unrotated orientation.
    pub size: CellRectSize,
    /// How the position is chosen.
    #[serde(default)]
    pub placement: PlacementKind,
    /// Scan order used by the placement search.
    #[serde(default)]
    pub scan_pattern: ScanPattern,
    /// Whether the item may be rotated to fit.
    #[serde(default)]
    pub allow_rotation: bool,
    /// Stack quantity assigned to the spawned item.
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

impl ItemTemplate {
    /// Creates a template using smart placement and a quantity of one.
    #[must_use]
    pub fn new(id: impl Into<String>, size: CellRectSize) -> Self {
        Self {
            id: TemplateId::new(id),
            size,
            placement: PlacementKind::Smart,
            scan_pattern: ScanPattern::RowMajor,
            allow_rotation: false,
            quantity: default_quantity(),
        }
    }

    /// Overrides the placement kind.
    #[must_use]
    pub fn with_placement(mut self, placement: PlacementKind) -> Self {
        self.placement = placement;
        self
    }

    /// Overrides the scan pattern.
    #[must_use]
    pub fn with_scan_pattern(mut self, scan_pattern: ScanPattern) -> Self {
        self.scan_pattern = scan_pattern;
        self
    }

    /// Overrides whether rotation is allowed.
    #[must_use]
    pub fn with_rotation(mut self, allow_rotation: bool) -> Self {
        self.allow_rotation = allow_rotation;
        self
    }

    /// Overrides the spawned quantity.
    #[must_use]
    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    /// Placement request derived from the template.
    #[must_use]
    pub fn policy(&self) -> PlacementPolicy {
        PlacementPolicy::new(self.placement, self.size)
            .with_scan_pattern(self.scan_pattern)
            .with_rotation(self.allow_rotation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(column: u32, row: u32, width: u32, height: u32) -> CellRect {
        CellRect::from_origin_and_size(CellCoord::new(column, row), CellRectSize::new(width, height))
    }

    #[test]
    fn intersection_clips_to_shared_cells() {
        let a = rect(0, 0, 4, 4);
        let b = rect(2, 3, 5, 5);
        assert_eq!(a.intersection(&b), Some(rect(2, 3, 2, 1)));
        assert!(a.intersection(&rect(4, 0, 1, 1)).is_none());
    }

    #[test]
    fn contains_rect_rejects_overhang() {
        let grid = CellRect::grid(10, 10);
        assert!(grid.contains_rect(&rect(7, 7, 3, 3)));
        assert!(!grid.contains_rect(&rect(8, 8, 3, 3)));
    }

    #[test]
    fn cells_iterate_rows_then_columns() {
        let cells: Vec<_> = rect(1, 1, 2, 2).cells().collect();
        assert_eq!(
            cells,
            vec![
                CellCoord::new(1, 1),
                CellCoord::new(2, 1),
                CellCoord::new(1, 2),
                CellCoord::new(2, 2),
            ]
        );
    }

    #[test]
    fn center_rounds_towards_origin() {
        assert_eq!(rect(0, 0, 5, 5).center(), CellCoord::new(2, 2));
        assert_eq!(rect(2, 2, 4, 4).center(), CellCoord::new(3, 3));
    }

    #[test]
    fn cells_stop_at_the_coordinate_limit() {
        let edge = rect(u32::MAX - 1, 7, 4, 1);
        assert_eq!(edge.addressable(), rect(u32::MAX - 1, 7, 2, 1));
        assert_eq!(
            edge.cells().collect::<Vec<_>>(),
            vec![CellCoord::new(u32::MAX - 1, 7), CellCoord::new(u32::MAX, 7)]
        );
        assert_eq!(rect(0, 0, u32::MAX, 3).addressable(), rect(0, 0, u32::MAX, 3));
        assert_eq!(rect(u32::MAX, u32::MAX, 9, 9).center(), CellCoord::new(u32::MAX, u32::MAX));
    }

    #[test]
    fn rotated_policy_disables_further_rotation() {
        let policy = PlacementPolicy::new(PlacementKind::Smart, CellRectSize::new(1, 3))
            .with_rotation(true)
            .rotated();
        assert_eq!(policy.size, CellRectSize::new(3, 1));
        assert!(!policy.allow_rotation);
    }

    #[test]
    fn template_deserializes_with_defaults() {
        let template: ItemTemplate = serde_json::from_str(
            r#"{
                "id": "medkit",
                "size": { "width": 2, "height": 1 },
                "scan_pattern": "spiral-out",
                "placement": { "kind": "priority", "preferred": {
                    "origin": { "column": 0, "row": 0 },
                    "size": { "width": 3, "height": 3 }
                } }
            }"#,
        )
        .expect("template parses");

        assert_eq!(template.quantity, 1);
        assert!(!template.allow_rotation);
        assert_eq!(template.scan_pattern, ScanPattern::SpiralOut);
        assert_eq!(template.policy().preferred_zone(), Some(rect(0, 0, 3, 3)));
    }
}
