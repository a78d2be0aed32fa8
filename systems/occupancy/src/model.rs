//! Occupancy bitmap and the free regions derived from it.

use std::collections::VecDeque;

use stowage_core::{CellCoord, CellRect, CellRectSize, Region};

/// Dense occupancy bitmap plus the ranked free regions computed from it.
///
/// Cells are stored in row-major order. Regions are recomputed as a whole and
/// are sorted by descending area, ties keeping row-major discovery order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OccupancyModel {
    width: u32,
    height: u32,
    cells: Vec<bool>,
    occupied: u64,
    regions: Vec<Region>,
}

impl OccupancyModel {
    /// Creates a fully free model with no computed regions.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        let capacity = usize::try_from(u64::from(width) * u64::from(height)).unwrap_or(0);
        Self {
            width,
            height,
            cells: vec![false; capacity],
            occupied: 0,
            regions: Vec::new(),
        }
    }

    /// Number of columns covered by the bitmap.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Number of rows covered by the bitmap.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Reports whether the cell is occupied. Cells outside the grid count as occupied.
    #[must_use]
    pub fn is_occupied(&self, cell: CellCoord) -> bool {
        self.index(cell)
            .and_then(|index| self.cells.get(index).copied())
            .unwrap_or(true)
    }

    /// Number of occupied cells.
    #[must_use]
    pub const fn occupied_count(&self) -> u64 {
        self.occupied
    }

    /// Number of free cells.
    #[must_use]
    pub fn free_count(&self) -> u64 {
        (self.cells.len() as u64).saturating_sub(self.occupied)
    }

    /// Fraction of occupied cells, zero for an empty grid.
    #[must_use]
    pub fn occupancy_rate(&self) -> f64 {
        if self.cells.is_empty() {
            return 0.0;
        }
        self.occupied as f64 / self.cells.len() as f64
    }

    /// Free regions, largest first.
    #[must_use]
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Dense bitmap in row-major order.
    #[must_use]
    pub fn cells(&self) -> &[bool] {
        &self.cells
    }

    /// ASCII map of the bitmap: `#` occupied, `.` free, one line per row.
    #[must_use]
    pub fn render(&self) -> String {
        let width = usize::try_from(self.width).unwrap_or(0);
        if width == 0 {
            return String::new();
        }
        self.cells
            .chunks(width)
            .map(|row| {
                row.iter()
                    .map(|occupied| if *occupied { '#' } else { '.' })
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Marks every in-bounds cell of the rectangle, returning how many were newly occupied.
    pub(crate) fn mark(&mut self, region: CellRect) -> u64 {
        let Some(region) = region.intersection(&CellRect::grid(self.width, self.height)) else {
            return 0;
        };
        let mut newly = 0;
        for cell in region.cells() {
            let Some(index) = self.index(cell) else {
                continue;
            };
            if let Some(slot) = self.cells.get_mut(index) {
                if !*slot {
                    *slot = true;
                    newly += 1;
                }
            }
        }
        self.occupied += newly;
        newly
    }

    /// Recomputes the free regions with a 4-connected breadth-first flood fill.
    ///
    /// Each component is reported with its bounding box and its free-cell
    /// count, so the areas of all regions always sum to the free cell count.
    pub(crate) fn compute_regions(&mut self) {
        self.regions.clear();

        let width = usize::try_from(self.width).unwrap_or(0);
        if width == 0 || self.cells.is_empty() {
            return;
        }

        let mut visited = vec![false; self.cells.len()];
        let mut queue = VecDeque::new();

        for seed in CellRect::grid(self.width, self.height).cells() {
            let Some(seed_index) = self.index(seed) else {
                continue;
            };
            if self.cells[seed_index] || visited[seed_index] {
                continue;
            }

            visited[seed_index] = true;
            queue.push_back(seed);

            let mut bounds = Bounds::at(seed);
            let mut area = 0_u64;

            while let Some(cell) = queue.pop_front() {
                area += 1;
                bounds.include(cell);

                for neighbor in neighbors(cell, self.width, self.height) {
                    let Some(index) = self.index(neighbor) else {
                        continue;
                    };
                    if self.cells[index] || visited[index] {
                        continue;
                    }
                    visited[index] = true;
                    queue.push_back(neighbor);
                }
            }

            self.regions.push(Region {
                position: bounds.origin(),
                size: bounds.size(),
                area,
            });
        }

        self.regions.sort_by(|a, b| b.area.cmp(&a.area));
    }

    fn index(&self, cell: CellCoord) -> Option<usize> {
        if cell.column() < self.width && cell.row() < self.height {
            let row = usize::try_from(cell.row()).ok()?;
            let column = usize::try_from(cell.column()).ok()?;
            let width = usize::try_from(self.width).ok()?;
            Some(row * width + column)
        } else {
            None
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Bounds {
    min_column: u32,
    min_row: u32,
    max_column: u32,
    max_row: u32,
}

impl Bounds {
    fn at(cell: CellCoord) -> Self {
        Self {
            min_column: cell.column(),
            min_row: cell.row(),
            max_column: cell.column(),
            max_row: cell.row(),
        }
    }

    fn include(&mut self, cell: CellCoord) {
        self.min_column = self.min_column.min(cell.column());
        self.min_row = self.min_row.min(cell.row());
        self.max_column = self.max_column.max(cell.column());
        self.max_row = self.max_row.max(cell.row());
    }

    fn origin(&self) -> CellCoord {
        CellCoord::new(self.min_column, self.min_row)
    }

    fn size(&self) -> CellRectSize {
        CellRectSize::new(
            self.max_column - self.min_column + 1,
            self.max_row - self.min_row + 1,
        )
    }
}

fn neighbors(cell: CellCoord, width: u32, height: u32) -> impl Iterator<Item = CellCoord> {
    let column = cell.column();
    let row = cell.row();
    let north = row.checked_sub(1).map(|r| CellCoord::new(column, r));
    let east = (column + 1 < width).then(|| CellCoord::new(column + 1, row));
    let south = (row + 1 < height).then(|| CellCoord::new(column, row + 1));
    let west = column.checked_sub(1).map(|c| CellCoord::new(c, row));
    [north, east, south, west].into_iter().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(column: u32, row: u32, width: u32, height: u32) -> CellRect {
        CellRect::from_origin_and_size(CellCoord::new(column, row), CellRectSize::new(width, height))
    }

    #[test]
    fn wall_splits_grid_into_two_regions() {
        let mut model = OccupancyModel::new(5, 3);
        let _ = model.mark(rect(2, 0, 1, 3));
        model.compute_regions();

        let regions = model.regions();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].position, CellCoord::new(0, 0));
        assert_eq!(regions[0].size, CellRectSize::new(2, 3));
        assert_eq!(regions[1].position, CellCoord::new(3, 0));
        assert_eq!(regions.iter().map(|r| r.area).sum::<u64>(), model.free_count());
    }

    #[test]
    fn mark_counts_only_new_cells_and_clips() {
        let mut model = OccupancyModel::new(3, 3);
        assert_eq!(model.mark(rect(1, 1, 4, 4)), 4);
        assert_eq!(model.mark(rect(0, 0, 2, 2)), 3);
        assert_eq!(model.occupied_count(), 7);
    }

    #[test]
    fn mark_only_walks_cells_inside_the_grid() {
        let mut model = OccupancyModel::new(4, 4);
        assert_eq!(model.mark(rect(u32::MAX, 0, 2, 1)), 0);
        assert_eq!(model.mark(rect(0, 0, 20_000, 20_000)), 16);
        assert_eq!(model.free_count(), 0);
    }

    #[test]
    fn render_draws_rows() {
        let mut model = OccupancyModel::new(3, 2);
        let _ = model.mark(rect(0, 1, 2, 1));
        assert_eq!(model.render(), "...\n##.");
    }

    #[test]
    fn empty_grid_reports_zero_rate() {
        let model = OccupancyModel::new(0, 0);
        assert_eq!(model.occupancy_rate(), 0.0);
        assert!(model.is_occupied(CellCoord::new(0, 0)));
    }
}
