#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Occupancy analysis for host grids.
//!
//! [`OccupancyAnalyzer`] borrows a [`HostGrid`], scans its live items into an
//! [`OccupancyModel`] and answers feasibility and conflict queries. A single
//! speculative placement can be applied with [`OccupancyAnalyzer::simulate`]
//! and discarded with [`OccupancyAnalyzer::undo`]. Undo re-derives the model
//! from the host rather than restoring a diff; because the analyzer holds a
//! shared borrow of the host, the host cannot change in between.

mod model;

use std::collections::HashSet;

use stowage_core::{CellCoord, CellRect, CellRectSize, HostGrid, ItemId, Region};
use tracing::debug;

pub use crate::model::OccupancyModel;

/// Errors reported by the analyzer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AnalyzerError {
    /// The host grid has a zero dimension.
    #[error("grid is uninitialized ({width}x{height})")]
    GridUninitialized {
        /// Reported width.
        width: u32,
        /// Reported height.
        height: u32,
    },
    /// A query ran before [`OccupancyAnalyzer::analyze`].
    #[error("occupancy has not been analyzed")]
    NotAnalyzed,
    /// [`OccupancyAnalyzer::simulate`] was called while a simulation was pending.
    #[error("a simulated placement is already pending")]
    SimulationActive,
    /// [`OccupancyAnalyzer::undo`] was called without a pending simulation.
    #[error("no simulated placement to undo")]
    NoActiveSimulation,
}

/// Footprint of an existing item discovered while scanning the host grid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemFootprint {
    /// Identity of the item.
    pub id: ItemId,
    /// Declared rectangle of the item.
    pub region: CellRect,
    /// Cells of the declared rectangle that lie inside the grid.
    pub cells: Vec<CellCoord>,
}

/// Builds and queries the occupancy model of one host grid.
#[derive(Debug)]
pub struct OccupancyAnalyzer<'g, G: HostGrid + ?Sized> {
    grid: &'g G,
    model: Option<OccupancyModel>,
    footprints: Vec<ItemFootprint>,
    simulating: bool,
}

impl<'g, G: HostGrid + ?Sized> OccupancyAnalyzer<'g, G> {
    /// Creates an analyzer bound to the host grid. No scan happens until [`Self::analyze`].
    #[must_use]
    pub fn new(grid: &'g G) -> Self {
        Self {
            grid,
            model: None,
            footprints: Vec::new(),
            simulating: false,
        }
    }

    /// Host grid the analyzer reads from.
    #[must_use]
    pub fn grid(&self) -> &'g G {
        self.grid
    }

    /// Number of columns of the host grid.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.grid.width()
    }

    /// Number of rows of the host grid.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.grid.height()
    }

    /// Reports whether a model is available.
    #[must_use]
    pub fn is_analyzed(&self) -> bool {
        self.model.is_some()
    }

    /// Reports whether a simulated placement is pending.
    #[must_use]
    pub fn is_simulating(&self) -> bool {
        self.simulating
    }

    /// Scans the host grid into a fresh model.
    ///
    /// Does nothing when a model already exists and `force_refresh` is false.
    /// A forced refresh discards any pending simulation.
    pub fn analyze(&mut self, force_refresh: bool) -> Result<&OccupancyModel, AnalyzerError> {
        if force_refresh || self.model.is_none() {
            self.rebuild()?;
        }
        self.model()
    }

    /// Recomputes and returns the free regions of the current model.
    pub fn compute_regions(&mut self) -> Result<&[Region], AnalyzerError> {
        let model = self.model.as_mut().ok_or(AnalyzerError::NotAnalyzed)?;
        model.compute_regions();
        Ok(model.regions())
    }

    /// Current model.
    pub fn model(&self) -> Result<&OccupancyModel, AnalyzerError> {
        self.model.as_ref().ok_or(AnalyzerError::NotAnalyzed)
    }

    /// Footprints found by the last scan, in discovery order.
    #[must_use]
    pub fn footprints(&self) -> &[ItemFootprint] {
        &self.footprints
    }

    /// Largest free region of the current model.
    pub fn largest_region(&self) -> Result<Option<Region>, AnalyzerError> {
        Ok(self.model()?.regions().first().copied())
    }

    /// Number of free cells in the current model.
    pub fn free_cell_count(&self) -> Result<u64, AnalyzerError> {
        Ok(self.model()?.free_count())
    }

    /// Fraction of occupied cells, zero before analysis or for an empty grid.
    #[must_use]
    pub fn occupancy_rate(&self) -> f64 {
        self.model
            .as_ref()
            .map_or(0.0, OccupancyModel::occupancy_rate)
    }

    /// Reports whether an item of `size` fits at `origin` without overlap.
    pub fn can_place(&self, origin: CellCoord, size: CellRectSize) -> Result<bool, AnalyzerError> {
        let model = self.model()?;
        if size.is_empty() {
            return Ok(false);
        }
        let region = CellRect::from_origin_and_size(origin, size);
        if !CellRect::grid(model.width(), model.height()).contains_rect(&region) {
            return Ok(false);
        }
        Ok(region.cells().all(|cell| !model.is_occupied(cell)))
    }

    /// Footprints overlapping the rectangle, each reported once.
    pub fn conflicts_at(
        &self,
        origin: CellCoord,
        size: CellRectSize,
    ) -> Result<Vec<ItemFootprint>, AnalyzerError> {
        let _ = self.model()?;
        let region = CellRect::from_origin_and_size(origin, size);
        Ok(self
            .footprints
            .iter()
            .filter(|footprint| footprint.cells.iter().any(|cell| region.contains(*cell)))
            .cloned()
            .collect())
    }

    /// Marks the rectangle occupied in the model without touching the host.
    ///
    /// Must be paired with [`Self::undo`]; nesting is rejected.
    pub fn simulate(&mut self, origin: CellCoord, size: CellRectSize) -> Result<(), AnalyzerError> {
        if self.simulating {
            return Err(AnalyzerError::SimulationActive);
        }
        let model = self.model.as_mut().ok_or(AnalyzerError::NotAnalyzed)?;
        let _ = model.mark(CellRect::from_origin_and_size(origin, size));
        model.compute_regions();
        self.simulating = true;
        Ok(())
    }

    /// Discards the pending simulation by re-deriving the model from the host.
    pub fn undo(&mut self) -> Result<(), AnalyzerError> {
        if !self.simulating {
            return Err(AnalyzerError::NoActiveSimulation);
        }
        let _ = self.analyze(true)?;
        Ok(())
    }

    fn rebuild(&mut self) -> Result<(), AnalyzerError> {
        let width = self.grid.width();
        let height = self.grid.height();
        if width == 0 || height == 0 {
            return Err(AnalyzerError::GridUninitialized { width, height });
        }

        let mut model = OccupancyModel::new(width, height);
        let bounds = CellRect::grid(width, height);
        let mut seen = HashSet::new();
        self.footprints.clear();

        for item in self.grid.items() {
            if !seen.insert(item.id.clone()) {
                continue;
            }
            let region = item.region();
            let cells = match region.intersection(&bounds) {
                Some(clipped) => {
                    let _ = model.mark(clipped);
                    clipped.cells().collect()
                }
                None => Vec::new(),
            };
            self.footprints.push(ItemFootprint {
                id: item.id,
                region,
                cells,
            });
        }

        model.compute_regions();
        debug!(
            width,
            height,
            items = self.footprints.len(),
            occupied = model.occupied_count(),
            regions = model.regions().len(),
            "occupancy analyzed"
        );

        self.model = Some(model);
        self.simulating = false;
        Ok(())
    }
}
