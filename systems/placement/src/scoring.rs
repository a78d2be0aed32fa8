//! Multi-factor scoring used by the exhaustive search stage.

use stowage_core::{CellCoord, CellRect, CellRectSize, HostGrid};
use stowage_system_occupancy::{AnalyzerError, OccupancyAnalyzer};

const FRAGMENTATION_BASE: f64 = 100.0;
const FRAGMENTATION_PENALTY: f64 = 10.0;
const SMALL_REGION_AREA: u64 = 4;

const LEFT_EDGE_BONUS: f64 = 20.0;
const TOP_EDGE_BONUS: f64 = 20.0;
const RIGHT_EDGE_BONUS: f64 = 15.0;
const BOTTOM_EDGE_BONUS: f64 = 15.0;

const PREFERRED_ZONE_BONUS: f64 = 50.0;
const NEIGHBOR_BONUS: f64 = 10.0;

/// Relative weight of each scoring term.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoreWeights {
    /// Weight of the fragmentation term.
    pub fragmentation: f64,
    /// Weight of the edge alignment term.
    pub edge_alignment: f64,
    /// Weight of the preferred zone term.
    pub preferred_zone: f64,
    /// Weight of the compactness term.
    pub compactness: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            fragmentation: 0.4,
            edge_alignment: 0.3,
            preferred_zone: 0.2,
            compactness: 0.1,
        }
    }
}

/// Raw scoring terms for one candidate, each on a 0 to 100 scale.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScoreBreakdown {
    /// 100 minus 10 per tiny free region left behind, floored at zero.
    pub fragmentation: f64,
    /// Bonus for footprint edges flush with the grid border.
    pub edge_alignment: f64,
    /// Bonus when the origin lies inside the preferred rectangle.
    pub preferred_zone: f64,
    /// Bonus for occupied cells just outside the footprint.
    pub compactness: f64,
}

impl ScoreBreakdown {
    /// Weighted sum of the terms.
    #[must_use]
    pub fn total(&self, weights: &ScoreWeights) -> f64 {
        self.fragmentation * weights.fragmentation
            + self.edge_alignment * weights.edge_alignment
            + self.preferred_zone * weights.preferred_zone
            + self.compactness * weights.compactness
    }
}

/// Scores placing `size` at `origin`; the candidate must already be feasible.
pub(crate) fn score_candidate<G: HostGrid + ?Sized>(
    analyzer: &mut OccupancyAnalyzer<'_, G>,
    origin: CellCoord,
    size: CellRectSize,
    preferred: Option<CellRect>,
) -> Result<ScoreBreakdown, AnalyzerError> {
    let footprint = CellRect::from_origin_and_size(origin, size);
    let edge_alignment = edge_alignment(footprint, analyzer.width(), analyzer.height());
    let compactness = compactness(analyzer, footprint)?;
    let preferred_zone = match preferred {
        Some(zone) if zone.contains(origin) => PREFERRED_ZONE_BONUS,
        _ => 0.0,
    };
    let fragmentation = fragmentation(analyzer, origin, size)?;

    Ok(ScoreBreakdown {
        fragmentation,
        edge_alignment,
        preferred_zone,
        compactness,
    })
}

fn fragmentation<G: HostGrid + ?Sized>(
    analyzer: &mut OccupancyAnalyzer<'_, G>,
    origin: CellCoord,
    size: CellRectSize,
) -> Result<f64, AnalyzerError> {
    analyzer.simulate(origin, size)?;
    let small_regions = analyzer
        .model()?
        .regions()
        .iter()
        .filter(|region| region.area < SMALL_REGION_AREA)
        .count();
    analyzer.undo()?;

    let score = FRAGMENTATION_BASE - FRAGMENTATION_PENALTY * small_regions as f64;
    Ok(score.max(0.0))
}

fn edge_alignment(footprint: CellRect, width: u32, height: u32) -> f64 {
    let mut score = 0.0;
    if footprint.origin().column() == 0 {
        score += LEFT_EDGE_BONUS;
    }
    if footprint.origin().row() == 0 {
        score += TOP_EDGE_BONUS;
    }
    if footprint.right() == u64::from(width) {
        score += RIGHT_EDGE_BONUS;
    }
    if footprint.bottom() == u64::from(height) {
        score += BOTTOM_EDGE_BONUS;
    }
    score
}

fn compactness<G: HostGrid + ?Sized>(
    analyzer: &OccupancyAnalyzer<'_, G>,
    footprint: CellRect,
) -> Result<f64, AnalyzerError> {
    let model = analyzer.model()?;
    let origin = footprint.origin();
    let right = u32::try_from(footprint.right()).ok();
    let bottom = u32::try_from(footprint.bottom()).ok();

    let probes = [
        origin.column().checked_sub(1).map(|c| CellCoord::new(c, origin.row())),
        origin.row().checked_sub(1).map(|r| CellCoord::new(origin.column(), r)),
        right.map(|c| CellCoord::new(c, origin.row())),
        bottom.map(|r| CellCoord::new(origin.column(), r)),
    ];

    let bounds = CellRect::grid(model.width(), model.height());
    let neighbors = probes
        .into_iter()
        .flatten()
        .filter(|cell| bounds.contains(*cell) && model.is_occupied(*cell))
        .count();
    Ok(NEIGHBOR_BONUS * neighbors as f64)
}
