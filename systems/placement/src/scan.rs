//! Candidate orderings over a search rectangle.

use std::collections::VecDeque;

use stowage_core::{CellCoord, CellRect, Region, ScanPattern};

/// Produces the ordered candidate origins `pattern` visits inside `area`.
///
/// The sequence is finite and recomputed on every call. Every pattern except
/// [`ScanPattern::LargestGapFirst`] yields each cell of `area` exactly once;
/// that pattern yields one origin per free region overlapping `area`, using
/// the first cell of the overlap. Cells past `u32::MAX` are never produced.
#[must_use]
pub fn scan_cells(pattern: ScanPattern, area: CellRect, regions: &[Region]) -> Vec<CellCoord> {
    let area = area.addressable();
    if area.size().is_empty() {
        return Vec::new();
    }

    match pattern {
        ScanPattern::RowMajor => area.cells().collect(),
        ScanPattern::ColumnMajor => column_major(area),
        ScanPattern::SpiralOut => spiral_out(area),
        ScanPattern::CenterToEdge => center_to_edge(area),
        ScanPattern::LargestGapFirst => largest_gap_first(area, regions),
    }
}

fn column_major(area: CellRect) -> Vec<CellCoord> {
    let origin = area.origin();
    let size = area.size();
    (0..size.width())
        .flat_map(|dx| {
            (0..size.height()).map(move |dy| CellCoord::new(origin.column() + dx, origin.row() + dy))
        })
        .collect()
}

fn spiral_out(area: CellRect) -> Vec<CellCoord> {
    let width = area.size().width();
    let capacity = usize::try_from(area.size().area()).unwrap_or(0);
    let mut visited = vec![false; capacity];
    let mut order = Vec::with_capacity(capacity);
    let mut queue = VecDeque::new();

    let local_index = |cell: CellCoord| -> usize {
        let dx = (cell.column() - area.origin().column()) as usize;
        let dy = (cell.row() - area.origin().row()) as usize;
        dy * width as usize + dx
    };

    let center = area.center();
    visited[local_index(center)] = true;
    queue.push_back(center);

    while let Some(cell) = queue.pop_front() {
        order.push(cell);
        for neighbor in neighbors_within(cell, area) {
            let index = local_index(neighbor);
            if visited[index] {
                continue;
            }
            visited[index] = true;
            queue.push_back(neighbor);
        }
    }

    order
}

fn center_to_edge(area: CellRect) -> Vec<CellCoord> {
    let center = area.center();
    let mut cells: Vec<CellCoord> = area.cells().collect();
    cells.sort_by_key(|cell| cell.distance_squared(center));
    cells
}

fn largest_gap_first(area: CellRect, regions: &[Region]) -> Vec<CellCoord> {
    let mut overlapping: Vec<(u64, CellRect)> = regions
        .iter()
        .filter(|region| region.area >= 1)
        .filter_map(|region| {
            region
                .bounds()
                .intersection(&area)
                .map(|overlap| (region.area, overlap))
        })
        .collect();
    overlapping.sort_by(|a, b| b.0.cmp(&a.0));

    let mut origins: Vec<CellCoord> = Vec::with_capacity(overlapping.len());
    for (_, overlap) in overlapping {
        if !origins.contains(&overlap.origin()) {
            origins.push(overlap.origin());
        }
    }
    origins
}

fn neighbors_within(cell: CellCoord, area: CellRect) -> impl Iterator<Item = CellCoord> {
    let column = cell.column();
    let row = cell.row();
    let candidates = [
        row.checked_sub(1).map(|r| CellCoord::new(column, r)),
        column.checked_add(1).map(|c| CellCoord::new(c, row)),
        row.checked_add(1).map(|r| CellCoord::new(column, r)),
        column.checked_sub(1).map(|c| CellCoord::new(c, row)),
    ];
    candidates
        .into_iter()
        .flatten()
        .filter(move |neighbor| area.contains(*neighbor))
}
