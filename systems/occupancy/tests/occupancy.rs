use stowage_core::{CellCoord, CellRectSize, GridItem, HostGrid, ItemId};
use stowage_system_occupancy::{AnalyzerError, OccupancyAnalyzer};
use stowage_world::{Container, ItemSpec};

fn size(width: u32, height: u32) -> CellRectSize {
    CellRectSize::new(width, height)
}

fn cluttered_container() -> Container {
    let mut container = Container::new(8, 6);
    let layout = [
        ("crate", CellCoord::new(0, 0), size(2, 2)),
        ("rifle", CellCoord::new(3, 1), size(4, 1)),
        ("canteen", CellCoord::new(7, 4), size(1, 2)),
        ("wall", CellCoord::new(2, 3), size(1, 3)),
    ];
    for (id, origin, footprint) in layout {
        let _ = container
            .insert(ItemSpec::new(id, origin, footprint))
            .expect("layout fits");
    }
    container
}

#[test]
fn single_item_in_corner_leaves_one_region() {
    let mut container = Container::new(10, 10);
    let _ = container
        .insert(ItemSpec::new("crate", CellCoord::new(0, 0), size(2, 2)))
        .expect("insert succeeds");

    let mut analyzer = OccupancyAnalyzer::new(&container);
    let model = analyzer.analyze(false).expect("analysis succeeds");

    let regions = model.regions();
    assert_eq!(regions.len(), 1, "free cells form one L-shaped component");
    assert_eq!(regions[0].position, CellCoord::new(0, 0));
    assert_eq!(regions[0].size, size(10, 10));
    assert_eq!(regions[0].area, 96);
}

#[test]
fn analysis_is_deterministic() {
    let container = cluttered_container();

    let mut first = OccupancyAnalyzer::new(&container);
    let mut second = OccupancyAnalyzer::new(&container);
    let first_model = first.analyze(false).expect("analysis succeeds").clone();
    let second_model = second.analyze(false).expect("analysis succeeds").clone();
    assert_eq!(first_model, second_model);

    let refreshed = first.analyze(true).expect("refresh succeeds").clone();
    assert_eq!(first_model, refreshed);
}

#[test]
fn region_areas_cover_free_cells() {
    let container = cluttered_container();
    let mut analyzer = OccupancyAnalyzer::new(&container);
    let model = analyzer.analyze(false).expect("analysis succeeds");

    let free = model.cells().iter().filter(|occupied| !**occupied).count() as u64;
    let covered: u64 = model.regions().iter().map(|region| region.area).sum();
    assert_eq!(covered, free);
    assert!(model
        .regions()
        .windows(2)
        .all(|pair| pair[0].area >= pair[1].area));
}

#[test]
fn simulate_then_undo_restores_model() {
    let container = cluttered_container();
    let mut analyzer = OccupancyAnalyzer::new(&container);
    let before = analyzer.analyze(false).expect("analysis succeeds").clone();

    for origin in [CellCoord::new(4, 3), CellCoord::new(0, 4), CellCoord::new(5, 0)] {
        assert!(analyzer.can_place(origin, size(2, 1)).expect("analyzed"));
        analyzer.simulate(origin, size(2, 1)).expect("simulate succeeds");
        assert!(!analyzer.can_place(origin, size(2, 1)).expect("analyzed"));
        analyzer.undo().expect("undo succeeds");
        assert_eq!(analyzer.model().expect("analyzed"), &before);
    }
}

#[test]
fn nested_simulation_is_rejected() {
    let container = Container::new(4, 4);
    let mut analyzer = OccupancyAnalyzer::new(&container);
    let _ = analyzer.analyze(false).expect("analysis succeeds");

    analyzer
        .simulate(CellCoord::new(0, 0), size(1, 1))
        .expect("first simulate succeeds");
    assert_eq!(
        analyzer.simulate(CellCoord::new(1, 1), size(1, 1)),
        Err(AnalyzerError::SimulationActive)
    );
    analyzer.undo().expect("undo succeeds");
    assert_eq!(analyzer.undo(), Err(AnalyzerError::NoActiveSimulation));
}

#[test]
fn queries_before_analysis_fail_fast() {
    let container = Container::new(4, 4);
    let mut analyzer = OccupancyAnalyzer::new(&container);

    assert_eq!(
        analyzer.can_place(CellCoord::new(0, 0), size(1, 1)),
        Err(AnalyzerError::NotAnalyzed)
    );
    assert_eq!(
        analyzer.simulate(CellCoord::new(0, 0), size(1, 1)),
        Err(AnalyzerError::NotAnalyzed)
    );
    assert_eq!(analyzer.occupancy_rate(), 0.0);
}

#[test]
fn zero_sized_grid_is_a_configuration_error() {
    let container = Container::new(0, 5);
    let mut analyzer = OccupancyAnalyzer::new(&container);
    assert_eq!(
        analyzer.analyze(false).err(),
        Some(AnalyzerError::GridUninitialized {
            width: 0,
            height: 5
        })
    );
}

#[test]
fn can_place_checks_bounds_and_overlap() {
    let container = cluttered_container();
    let mut analyzer = OccupancyAnalyzer::new(&container);
    let _ = analyzer.analyze(false).expect("analysis succeeds");

    assert!(!analyzer.can_place(CellCoord::new(7, 0), size(2, 1)).expect("analyzed"));
    assert!(!analyzer.can_place(CellCoord::new(1, 1), size(1, 1)).expect("analyzed"));
    assert!(!analyzer.can_place(CellCoord::new(4, 4), size(0, 1)).expect("analyzed"));
    assert!(analyzer.can_place(CellCoord::new(3, 2), size(4, 1)).expect("analyzed"));
}

#[test]
fn conflicts_report_each_overlapping_item_once() {
    let container = cluttered_container();
    let mut analyzer = OccupancyAnalyzer::new(&container);
    let _ = analyzer.analyze(false).expect("analysis succeeds");

    let conflicts = analyzer
        .conflicts_at(CellCoord::new(1, 0), size(4, 2))
        .expect("analyzed");
    let ids: Vec<_> = conflicts.iter().map(|footprint| footprint.id.as_str()).collect();
    assert_eq!(ids, vec!["crate", "rifle"]);
}

#[test]
fn occupancy_rate_tracks_covered_cells() {
    let mut container = Container::new(4, 5);
    let _ = container
        .insert(ItemSpec::new("slab", CellCoord::new(0, 0), size(4, 1)))
        .expect("insert succeeds");

    let mut analyzer = OccupancyAnalyzer::new(&container);
    let _ = analyzer.analyze(false).expect("analysis succeeds");
    assert!((analyzer.occupancy_rate() - 0.2).abs() < f64::EPSILON);
    assert_eq!(analyzer.free_cell_count(), Ok(16));
}

/// Host that reports the same item from every covered cell and no item list.
struct ProbeOnlyGrid {
    item: GridItem,
}

impl HostGrid for ProbeOnlyGrid {
    fn width(&self) -> u32 {
        6
    }

    fn height(&self) -> u32 {
        6
    }

    fn item_at(&self, cell: CellCoord) -> Option<GridItem> {
        self.item.region().contains(cell).then(|| self.item.clone())
    }
}

#[test]
fn multi_cell_items_are_scanned_once() {
    let grid = ProbeOnlyGrid {
        item: GridItem {
            id: ItemId::new("armor"),
            origin: CellCoord::new(2, 2),
            size: size(3, 3),
            spawn_tag: None,
        },
    };

    let mut analyzer = OccupancyAnalyzer::new(&grid);
    let model = analyzer.analyze(false).expect("analysis succeeds");
    assert_eq!(model.occupied_count(), 9);
    assert_eq!(analyzer.footprints().len(), 1);
    assert_eq!(analyzer.footprints()[0].cells.len(), 9);
}

#[test]
fn oversized_host_items_only_cover_cells_in_the_grid() {
    let grid = ProbeOnlyGrid {
        item: GridItem {
            id: ItemId::new("tarp"),
            origin: CellCoord::new(2, 2),
            size: size(50_000, 50_000),
            spawn_tag: None,
        },
    };

    let mut analyzer = OccupancyAnalyzer::new(&grid);
    let model = analyzer.analyze(false).expect("analysis succeeds");
    assert_eq!(model.occupied_count(), 16);
    assert_eq!(analyzer.footprints()[0].cells.len(), 16);
    assert_eq!(analyzer.free_cell_count(), Ok(20));
}

#[test]
fn simulating_past_the_coordinate_limit_marks_nothing() {
    let container = Container::new(4, 4);
    let mut analyzer = OccupancyAnalyzer::new(&container);
    let _ = analyzer.analyze(false).expect("analysis succeeds");

    analyzer
        .simulate(CellCoord::new(u32::MAX, 0), size(2, 1))
        .expect("simulation starts");
    assert_eq!(analyzer.free_cell_count(), Ok(16));
    analyzer.undo().expect("undo succeeds");
    assert_eq!(analyzer.free_cell_count(), Ok(16));
}
