#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Placement search over an analyzed host grid.
//!
//! [`PlacementStrategy::find_position`] dispatches on the policy kind, runs
//! the matching search over the analyzer's model and retries once with the
//! footprint rotated when allowed. A missing fit is reported as `Ok(None)`:
//! it is an expected outcome, not an error.

mod scan;
mod scoring;

use stowage_core::{
    CellCoord, CellRect, CellRectSize, HostGrid, Placement, PlacementKind, PlacementPolicy,
    ScanPattern,
};
use stowage_system_occupancy::{AnalyzerError, OccupancyAnalyzer};
use tracing::debug;

pub use crate::scan::scan_cells;
pub use crate::scoring::{ScoreBreakdown, ScoreWeights};

/// Finds positions for items inside analyzed host grids.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlacementStrategy {
    weights: ScoreWeights,
}

impl PlacementStrategy {
    /// Creates a strategy using the default scoring weights.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a strategy using custom scoring weights.
    #[must_use]
    pub const fn with_weights(weights: ScoreWeights) -> Self {
        Self { weights }
    }

    /// Weights applied by the exhaustive search stage.
    #[must_use]
    pub const fn weights(&self) -> ScoreWeights {
        self.weights
    }

    /// Finds a position for the policy's item, analyzing the grid first if needed.
    ///
    /// Returns `Ok(None)` when neither the requested orientation nor, if
    /// allowed, the rotated one fits. Fails with
    /// [`AnalyzerError::SimulationActive`] when the analyzer has a pending
    /// simulation.
    pub fn find_position<G: HostGrid + ?Sized>(
        &self,
        analyzer: &mut OccupancyAnalyzer<'_, G>,
        policy: &PlacementPolicy,
    ) -> Result<Option<Placement>, AnalyzerError> {
        if analyzer.is_simulating() {
            return Err(AnalyzerError::SimulationActive);
        }
        let _ = analyzer.analyze(false)?;

        if let Some(origin) = self.dispatch(analyzer, policy)? {
            return Ok(Some(Placement {
                origin,
                size: policy.size,
                rotated: false,
            }));
        }

        if policy.allow_rotation && !policy.size.is_square() {
            let rotated = policy.rotated();
            if let Some(origin) = self.dispatch(analyzer, &rotated)? {
                debug!(size = %policy.size, %origin, "placed after rotation");
                return Ok(Some(Placement {
                    origin,
                    size: rotated.size,
                    rotated: true,
                }));
            }
        }

        debug!(size = %policy.size, kind = ?policy.kind, "no fit found");
        Ok(None)
    }

    /// Scores placing the policy's item at `origin` without committing it.
    pub fn score<G: HostGrid + ?Sized>(
        &self,
        analyzer: &mut OccupancyAnalyzer<'_, G>,
        origin: CellCoord,
        policy: &PlacementPolicy,
    ) -> Result<ScoreBreakdown, AnalyzerError> {
        scoring::score_candidate(analyzer, origin, policy.size, policy.preferred_zone())
    }

    fn dispatch<G: HostGrid + ?Sized>(
        &self,
        analyzer: &mut OccupancyAnalyzer<'_, G>,
        policy: &PlacementPolicy,
    ) -> Result<Option<CellCoord>, AnalyzerError> {
        match policy.kind {
            PlacementKind::Exact { position } => {
                Ok(analyzer.can_place(position, policy.size)?.then_some(position))
            }
            PlacementKind::AreaConstrained { area } => {
                scan_area(analyzer, area, policy.scan_pattern, policy.size)
            }
            PlacementKind::Priority { preferred } => {
                match scan_area(analyzer, preferred, policy.scan_pattern, policy.size)? {
                    Some(origin) => Ok(Some(origin)),
                    None => self.smart(analyzer, policy),
                }
            }
            PlacementKind::Smart => self.smart(analyzer, policy),
        }
    }

    fn smart<G: HostGrid + ?Sized>(
        &self,
        analyzer: &mut OccupancyAnalyzer<'_, G>,
        policy: &PlacementPolicy,
    ) -> Result<Option<CellCoord>, AnalyzerError> {
        if let Some(region) = analyzer.largest_region()? {
            if let Some(origin) =
                scan_area(analyzer, region.bounds(), ScanPattern::RowMajor, policy.size)?
            {
                return Ok(Some(origin));
            }
        }

        if let Some(origin) = self.optimal_position(analyzer, policy)? {
            return Ok(Some(origin));
        }

        let grid = CellRect::grid(analyzer.width(), analyzer.height());
        scan_area(analyzer, grid, policy.scan_pattern, policy.size)
    }

    fn optimal_position<G: HostGrid + ?Sized>(
        &self,
        analyzer: &mut OccupancyAnalyzer<'_, G>,
        policy: &PlacementPolicy,
    ) -> Result<Option<CellCoord>, AnalyzerError> {
        let preferred = policy.preferred_zone();
        let mut best: Option<(CellCoord, f64)> = None;

        for origin in CellRect::grid(analyzer.width(), analyzer.height()).cells() {
            if !analyzer.can_place(origin, policy.size)? {
                continue;
            }
            let score = scoring::score_candidate(analyzer, origin, policy.size, preferred)?
                .total(&self.weights);
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((origin, score)),
            }
        }

        Ok(best.map(|(origin, _)| origin))
    }
}

/// Returns the first candidate of `pattern` whose whole footprint fits inside `area`.
fn scan_area<G: HostGrid + ?Sized>(
    analyzer: &OccupancyAnalyzer<'_, G>,
    area: CellRect,
    pattern: ScanPattern,
    size: CellRectSize,
) -> Result<Option<CellCoord>, AnalyzerError> {
    let model = analyzer.model()?;
    let grid = CellRect::grid(model.width(), model.height());
    let Some(area) = area.intersection(&grid) else {
        return Ok(None);
    };

    for origin in scan_cells(pattern, area, model.regions()) {
        let footprint = CellRect::from_origin_and_size(origin, size);
        if !area.contains_rect(&footprint) {
            continue;
        }
        if analyzer.can_place(origin, size)? {
            return Ok(Some(origin));
        }
    }
    Ok(None)
}
