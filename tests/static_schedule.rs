use std::collections::BTreeMap;

use alp_milp::error::{ModelError, ScheduleError, SolveError};
use alp_milp::instance::{Flight, FlightCatalog, SeparationMatrix, Time};
use alp_milp::resolution::{schedule_static, solve_model, MilpSolver, ModelBuilder, Solution, SolverAdapter, StaticConfig};

const EPS: f64 = 1e-5;

fn flight(id: usize, earliest: Time, target: Time, latest: Time) -> Flight {
    Flight { id, appearance: 0.0, earliest, target, latest, early_rate: 1.0, late_rate: 1.0 }
}

fn catalog(flights: Vec<Flight>, gap: Time) -> FlightCatalog {
    let n = flights.len();
    FlightCatalog::new(flights, SeparationMatrix::uniform(n, gap), 0.0).unwrap()
}

fn runways(n: usize) -> StaticConfig {
    StaticConfig { runways: n, ..Default::default() }
}

fn assert_windows(catalog: &FlightCatalog, solution: &Solution) {
    assert_eq!(solution.landings.len(), catalog.nb_flights());
    for l in solution.landings.iter() {
        let f = &catalog.flights[l.flight];
        assert!(f.earliest - EPS <= l.time && l.time <= f.latest + EPS, "flight {} at {}", l.flight, l.time);
    }
}

fn assert_separation(catalog: &FlightCatalog, solution: &Solution) {
    for a in solution.landings.iter() {
        for b in solution.landings.iter().filter(|b| b.flight != a.flight && b.runway == a.runway) {
            if a.time <= b.time {
                let gap = catalog.separation.get(a.flight, b.flight);
                assert!(b.time - a.time >= gap - EPS, "{} then {} only {} apart", a.flight, b.flight, b.time - a.time);
            }
        }
    }
}

#[test]
fn single_flight_lands_on_target() {
    let c = catalog(vec![flight(0, 0.0, 50.0, 100.0)], 0.0);
    let solution = schedule_static(&c, StaticConfig::default()).unwrap();
    assert!((solution.time_of(0).unwrap() - 50.0).abs() < EPS);
    assert!(solution.cost.abs() < EPS);
    assert_eq!(solution.landings[0].runway, None);
}

#[test]
fn two_flights_with_same_target_share_the_deviation() {
    let c = catalog(vec![flight(0, 0.0, 50.0, 100.0), flight(1, 0.0, 50.0, 100.0)], 10.0);
    let solution = schedule_static(&c, StaticConfig::default()).unwrap();

    let (x0, x1) = (solution.time_of(0).unwrap(), solution.time_of(1).unwrap());
    assert!(((x0 - x1).abs() - 10.0).abs() < EPS);
    assert!(x0.min(x1) <= 50.0 + EPS && x0.max(x1) >= 50.0 - EPS);
    assert!((solution.cost - 10.0).abs() < EPS);
    assert_windows(&c, &solution);
}

#[test]
fn asymmetric_separation_picks_the_cheaper_order() {
    let flights = vec![flight(0, 0.0, 50.0, 100.0), flight(1, 0.0, 50.0, 100.0)];
    // 0 before 1 needs 20, 1 before 0 needs 4
    let sep = SeparationMatrix::new(vec![vec![0.0, 20.0], vec![4.0, 0.0]]).unwrap();
    let c = FlightCatalog::new(flights, sep, 0.0).unwrap();
    let solution = schedule_static(&c, StaticConfig::default()).unwrap();

    assert!((solution.cost - 4.0).abs() < EPS);
    assert!(solution.time_of(1).unwrap() < solution.time_of(0).unwrap());
    assert_separation(&c, &solution);
}

#[test]
fn every_pair_gets_exactly_one_order() {
    let c = catalog((0..4).map(|i| flight(i, 0.0, 30.0 + 5.0 * i as f64, 200.0)).collect(), 8.0);
    let model = ModelBuilder::new(&c, c.ids()).build().unwrap();
    let assignment = MilpSolver.solve(&model).unwrap();

    for i in 0..4 {
        for j in (0..4).filter(|j| *j != i) {
            let dij = assignment.values[model.order[&(i, j)].0].round();
            let dji = assignment.values[model.order[&(j, i)].0].round();
            assert_eq!(dij + dji, 1.0);
            let (xi, xj) = (assignment.values[model.landing[&i].0], assignment.values[model.landing[&j].0]);
            if dij == 1.0 {
                assert!(xj - xi >= 8.0 - EPS);
            }
        }
    }
    for v in model.lateness.values().chain(model.earliness.values()) {
        assert!(assignment.values[v.0] >= -EPS);
    }
}

#[test]
fn congested_single_runway_is_infeasible() {
    let c = catalog((0..3).map(|i| flight(i, 40.0, 50.0, 60.0)).collect(), 30.0);

    let err = schedule_static(&c, runways(1)).unwrap_err();
    assert!(err.is_infeasible());
    assert!(matches!(err, ScheduleError::Solve(SolveError::Infeasible)));

    let err = schedule_static(&c, runways(2)).unwrap_err();
    assert!(err.is_infeasible());
}

#[test]
fn enough_runways_land_everyone_on_target() {
    let c = catalog((0..3).map(|i| flight(i, 40.0, 50.0, 60.0)).collect(), 30.0);
    let solution = schedule_static(&c, runways(3)).unwrap();

    assert!(solution.cost.abs() < EPS);
    let mut used = solution.landings.iter().map(|l| l.runway.unwrap()).collect::<Vec<_>>();
    used.sort_unstable();
    assert_eq!(used, vec![0, 1, 2]);
    assert_separation(&c, &solution);
}

#[test]
fn two_runways_split_three_flights() {
    let c = catalog((0..3).map(|i| flight(i, 0.0, 50.0, 100.0)).collect(), 10.0);
    let solution = schedule_static(&c, runways(2)).unwrap();

    assert!((solution.cost - 10.0).abs() < EPS);
    assert_windows(&c, &solution);
    assert_separation(&c, &solution);
    assert!(solution.landings.iter().all(|l| l.runway.is_some_and(|r| r < 2)));
}

#[test]
fn frozen_flight_blocks_a_late_arrival() {
    // B can only land in [22, 28]: before A needs <= 20, after A needs >= 40
    let c = catalog(vec![flight(0, 0.0, 30.0, 100.0), flight(1, 22.0, 25.0, 28.0)], 10.0);
    let model = ModelBuilder::new(&c, [0, 1]).frozen(BTreeMap::from([(0, 30.0)])).build().unwrap();
    assert_eq!(solve_model(&model, &MilpSolver).unwrap_err(), SolveError::Infeasible);
}

#[test]
fn frozen_time_outside_window_is_rejected() {
    let c = catalog(vec![flight(0, 0.0, 30.0, 100.0)], 10.0);
    let err = ModelBuilder::new(&c, [0]).frozen(BTreeMap::from([(0, 130.0)])).build().unwrap_err();
    assert!(matches!(err, ModelError::FrozenOutsideWindow { flight: 0, .. }));
}

#[test]
fn displacement_objective_decomposes() {
    let c = catalog(vec![flight(0, 0.0, 40.0, 200.0), flight(1, 0.0, 42.0, 200.0), flight(2, 0.0, 45.0, 200.0)], 10.0);
    let previous = BTreeMap::from([(0, 40.0), (1, 50.0)]);
    let model = ModelBuilder::new(&c, 0..3).previous(previous).build().unwrap();
    let solution = solve_model(&model, &MilpSolver).unwrap();

    assert!(solution.displacement_cost >= -EPS);
    assert!((solution.objective - (solution.landing_cost + solution.displacement_cost)).abs() < 1e-4);
    assert!(solution.landing_cost >= -EPS);
    for (i, t) in solution.times.iter() {
        assert!((-EPS..=200.0 + EPS).contains(t), "flight {i} at {t}");
    }
}
