//! Mixed-integer formulation of the aircraft landing problem.
//!
//! One continuous landing time `x_i` per flight with lateness/earliness
//! slacks, a pair of binary precedence indicators per pair of flights,
//! big-M disjunctive separation constraints and, for several runways,
//! runway assignment and same-runway indicators.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::ModelError;
use crate::instance::{Cost, FlightCatalog, Time};

/// Upper bound on the displacement cost variable of a single flight.
pub const DEFAULT_MAX_DISPLACEMENT: Cost = 50.0;

/// Slack tolerated when checking frozen times against flight windows.
const WINDOW_TOLERANCE: Time = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Continuous,
    Binary,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub kind: VarKind,
    pub lower: f64,
    /// `f64::INFINITY` when unbounded
    pub upper: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinExpr {
    pub terms: Vec<(VarId, f64)>,
    pub constant: f64,
}

impl LinExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn term(mut self, var: VarId, coef: f64) -> Self {
        if coef != 0.0 {
            self.terms.push((var, coef));
        }
        self
    }

    pub fn eval(&self, values: &[f64]) -> f64 {
        self.terms.iter().fold(self.constant, |acc, (v, c)| acc + c * values[v.0])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    LessEq,
    GreaterEq,
    Equal,
}

/// `expr <sense> rhs`
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub name: String,
    pub expr: LinExpr,
    pub sense: Sense,
    pub rhs: f64,
}

impl Constraint {
    pub fn is_satisfied(&self, values: &[f64], tolerance: f64) -> bool {
        let lhs = self.expr.eval(values);
        match self.sense {
            Sense::LessEq => lhs <= self.rhs + tolerance,
            Sense::GreaterEq => lhs >= self.rhs - tolerance,
            Sense::Equal => (lhs - self.rhs).abs() <= tolerance,
        }
    }
}

/// A complete, minimization MILP plus the indices needed to read a solution back.
#[derive(Debug, Clone, Default)]
pub struct MilpInstance {
    pub variables: Vec<Variable>,
    pub constraints: Vec<Constraint>,
    pub objective: LinExpr,
    /// Landing time of each flight
    pub landing: BTreeMap<usize, VarId>,
    pub lateness: BTreeMap<usize, VarId>,
    pub earliness: BTreeMap<usize, VarId>,
    /// `d[i,j] = 1` iff `i` lands before `j`
    pub order: BTreeMap<(usize, usize), VarId>,
    /// `y[i,r] = 1` iff `i` lands on runway `r`
    pub runway: BTreeMap<(usize, usize), VarId>,
    pub same_runway: BTreeMap<(usize, usize), VarId>,
    pub displacement: BTreeMap<usize, VarId>,
    /// The earliness/lateness part of the objective
    pub landing_cost: LinExpr,
    pub nb_runways: usize,
    pub big_m: f64,
}

impl MilpInstance {
    fn add_var(&mut self, name: String, kind: VarKind, lower: f64, upper: f64) -> VarId {
        let id = VarId(self.variables.len());
        self.variables.push(Variable { name, kind, lower, upper });
        id
    }

    fn add_constraint(&mut self, name: String, expr: LinExpr, sense: Sense, rhs: f64) {
        self.constraints.push(Constraint { name, expr, sense, rhs });
    }

    pub fn nb_binaries(&self) -> usize {
        self.variables.iter().filter(|v| v.kind == VarKind::Binary).count()
    }

    /// The runway of `flight` under `values`, 0 in the single runway case.
    pub fn runway_of(&self, flight: usize, values: &[f64]) -> Option<usize> {
        if self.nb_runways <= 1 {
            return self.landing.get(&flight).map(|_| 0);
        }
        (0..self.nb_runways)
            .filter_map(|r| self.runway.get(&(flight, r)).map(|v| (r, values[v.0])))
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(r, _)| r)
    }
}

/// Collects the inputs of one solve and emits the corresponding [`MilpInstance`].
pub struct ModelBuilder<'a> {
    catalog: &'a FlightCatalog,
    active: Vec<usize>,
    frozen: BTreeMap<usize, Time>,
    previous: Option<BTreeMap<usize, Time>>,
    nb_runways: usize,
    max_displacement: Cost,
}

impl<'a> ModelBuilder<'a> {
    pub fn new(catalog: &'a FlightCatalog, active: impl IntoIterator<Item = usize>) -> Self {
        let mut active: Vec<usize> = active.into_iter().collect();
        active.sort_unstable();
        active.dedup();
        ModelBuilder {
            catalog,
            active,
            frozen: BTreeMap::new(),
            previous: None,
            nb_runways: 1,
            max_displacement: DEFAULT_MAX_DISPLACEMENT,
        }
    }

    pub fn frozen(mut self, frozen: BTreeMap<usize, Time>) -> Self {
        self.frozen = frozen;
        self
    }

    /// Switches to the displacement objective of the dynamic case.
    pub fn previous(mut self, previous: BTreeMap<usize, Time>) -> Self {
        self.previous = Some(previous);
        self
    }

    pub fn runways(mut self, nb_runways: usize) -> Self {
        self.nb_runways = nb_runways;
        self
    }

    pub fn max_displacement(mut self, cap: Cost) -> Self {
        self.max_displacement = cap;
        self
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.active.is_empty() {
            return Err(ModelError::EmptyActiveSet);
        }
        if self.nb_runways == 0 {
            return Err(ModelError::NoRunway);
        }
        for id in self.active.iter().copied() {
            let f = self.catalog.flight(id).ok_or(ModelError::UnknownFlight(id))?;
            if f.earliest > f.latest {
                return Err(ModelError::InvalidWindow { flight: id, earliest: f.earliest, latest: f.latest });
            }
        }
        for (id, time) in self.frozen.iter() {
            if self.active.binary_search(id).is_err() {
                return Err(ModelError::UnknownFlight(*id));
            }
            let f = &self.catalog.flights[*id];
            if !f.contains(*time, WINDOW_TOLERANCE) {
                return Err(ModelError::FrozenOutsideWindow { flight: *id, time: *time, earliest: f.earliest, latest: f.latest });
            }
        }
        if let Some(previous) = self.previous.as_ref() {
            if let Some(id) = previous.keys().find(|id| self.active.binary_search(*id).is_err()) {
                return Err(ModelError::UnknownFlight(*id));
            }
        }
        Ok(())
    }

    pub fn build(&self) -> Result<MilpInstance, ModelError> {
        self.validate()?;

        let flights = &self.catalog.flights;
        let separation = &self.catalog.separation;
        let ids = &self.active;

        let max_latest = ids.iter().map(|i| flights[*i].latest).fold(f64::MIN, f64::max);
        let min_earliest = ids.iter().map(|i| flights[*i].earliest).fold(f64::MAX, f64::min);
        let mut max_separation = 0.0_f64;
        for i in ids.iter().copied() {
            for j in ids.iter().copied().filter(|j| *j != i) {
                max_separation = max_separation.max(separation.get(i, j));
            }
        }
        // the horizon span alone leaves `sep - M` above the smallest possible gap
        let big_m = (max_latest - min_earliest) + max_separation;

        let mut m = MilpInstance { nb_runways: self.nb_runways, big_m, ..Default::default() };

        for i in ids.iter().copied() {
            let f = &flights[i];
            let x = m.add_var(format!("x[{i}]"), VarKind::Continuous, f.earliest, f.latest);
            let zp = m.add_var(format!("z_p[{i}]"), VarKind::Continuous, 0.0, f64::INFINITY);
            let zn = m.add_var(format!("z_n[{i}]"), VarKind::Continuous, 0.0, f64::INFINITY);
            m.landing.insert(i, x);
            m.lateness.insert(i, zp);
            m.earliness.insert(i, zn);

            // z_p >= x - target, z_n >= target - x
            m.add_constraint(format!("late[{i}]"), LinExpr::new().term(zp, 1.0).term(x, -1.0), Sense::GreaterEq, -f.target);
            m.add_constraint(format!("early[{i}]"), LinExpr::new().term(zn, 1.0).term(x, 1.0), Sense::GreaterEq, f.target);

            m.landing_cost = std::mem::take(&mut m.landing_cost).term(zp, f.late_rate).term(zn, f.early_rate);
        }

        for i in ids.iter().copied() {
            for j in ids.iter().copied().filter(|j| *j != i) {
                let d = m.add_var(format!("d[{i},{j}]"), VarKind::Binary, 0.0, 1.0);
                m.order.insert((i, j), d);
            }
        }
        for i in ids.iter().copied() {
            for j in ids.iter().copied().filter(|j| *j > i) {
                let expr = LinExpr::new().term(m.order[&(i, j)], 1.0).term(m.order[&(j, i)], 1.0);
                m.add_constraint(format!("order[{i},{j}]"), expr, Sense::Equal, 1.0);
            }
        }

        if self.nb_runways > 1 {
            self.add_runways(&mut m);
        }

        // x_j - x_i >= sep[i,j] (* q[j,i]) - d[j,i] * M
        for i in ids.iter().copied() {
            for j in ids.iter().copied().filter(|j| *j != i) {
                let sep = separation.get(i, j);
                let mut expr = LinExpr::new()
                    .term(m.landing[&j], 1.0)
                    .term(m.landing[&i], -1.0)
                    .term(m.order[&(j, i)], big_m);
                let rhs = if self.nb_runways > 1 {
                    expr = expr.term(m.same_runway[&(j, i)], -sep);
                    0.0
                } else {
                    sep
                };
                m.add_constraint(format!("clearance[{i},{j}]"), expr, Sense::GreaterEq, rhs);
            }
        }

        for (i, time) in self.frozen.iter() {
            let f = &flights[*i];
            let time = time.clamp(f.earliest, f.latest);
            m.add_constraint(format!("frozen[{i}]"), LinExpr::new().term(m.landing[i], 1.0), Sense::Equal, time);
        }

        m.objective = m.landing_cost.clone();
        if let Some(previous) = self.previous.as_ref() {
            self.add_displacement(&mut m, previous);
        }

        debug!(
            flights = ids.len(),
            variables = m.variables.len(),
            binaries = m.nb_binaries(),
            constraints = m.constraints.len(),
            big_m,
            "built landing model"
        );

        Ok(m)
    }

    fn add_runways(&self, m: &mut MilpInstance) {
        let ids = &self.active;
        let runways = self.nb_runways;

        for i in ids.iter().copied() {
            let mut sum = LinExpr::new();
            for r in 0..runways {
                let y = m.add_var(format!("y[{i},{r}]"), VarKind::Binary, 0.0, 1.0);
                m.runway.insert((i, r), y);
                sum = sum.term(y, 1.0);
            }
            m.add_constraint(format!("one_runway[{i}]"), sum, Sense::Equal, 1.0);
        }

        for i in ids.iter().copied() {
            for j in ids.iter().copied().filter(|j| *j != i) {
                let q = m.add_var(format!("q[{i},{j}]"), VarKind::Binary, 0.0, 1.0);
                m.same_runway.insert((i, j), q);
            }
        }

        for i in ids.iter().copied() {
            for j in ids.iter().copied().filter(|j| *j != i) {
                let q = m.same_runway[&(i, j)];
                if i < j {
                    let expr = LinExpr::new().term(q, 1.0).term(m.same_runway[&(j, i)], -1.0);
                    m.add_constraint(format!("same_runway_sym[{i},{j}]"), expr, Sense::Equal, 0.0);
                }
                // q[i,j] >= y[i,r] + y[j,r] - 1
                for r in 0..runways {
                    let expr = LinExpr::new()
                        .term(q, 1.0)
                        .term(m.runway[&(i, r)], -1.0)
                        .term(m.runway[&(j, r)], -1.0);
                    m.add_constraint(format!("same_runway[{i},{j},{r}]"), expr, Sense::GreaterEq, -1.0);
                }
            }
        }
    }

    /// Prices a change of landing time the way a deviation from target is priced,
    /// depending on which side of its target the flight was previously scheduled.
    fn add_displacement(&self, m: &mut MilpInstance, previous: &BTreeMap<usize, Time>) {
        let flights = &self.catalog.flights;

        for (i, p) in previous.iter() {
            let (i, p) = (*i, *p);
            let f = &flights[i];
            let x = m.landing[&i];
            let disp = m.add_var(format!("D[{i}]"), VarKind::Continuous, 0.0, self.max_displacement);
            m.displacement.insert(i, disp);

            // D >= rate * (p - x)  <=>  D + rate * x >= rate * p
            let earlier = |rate: f64| (LinExpr::new().term(disp, 1.0).term(x, rate), rate * p);
            // D >= rate * (x - p)  <=>  D - rate * x >= -rate * p
            let later = |rate: f64| (LinExpr::new().term(disp, 1.0).term(x, -rate), -rate * p);

            if p < f.target {
                let (expr, rhs) = earlier(f.early_rate);
                m.add_constraint(format!("disp_before_target[{i}]"), expr, Sense::GreaterEq, rhs);
            } else if p > f.target {
                let (expr, rhs) = later(f.late_rate);
                m.add_constraint(format!("disp_after_target[{i}]"), expr, Sense::GreaterEq, rhs);
            } else {
                let (expr, rhs) = earlier(f.early_rate);
                m.add_constraint(format!("disp_at_target_early[{i}]"), expr, Sense::GreaterEq, rhs);
                let (expr, rhs) = later(f.late_rate);
                m.add_constraint(format!("disp_at_target_late[{i}]"), expr, Sense::GreaterEq, rhs);
            }

            m.objective = std::mem::take(&mut m.objective).term(disp, 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{Flight, SeparationMatrix};

    fn catalog(n: usize) -> FlightCatalog {
        let flights = (0..n)
            .map(|id| Flight {
                id,
                appearance: 0.0,
                earliest: 10.0 * id as f64,
                target: 10.0 * id as f64 + 50.0,
                latest: 10.0 * id as f64 + 100.0,
                early_rate: 1.0,
                late_rate: 2.0,
            })
            .collect();
        FlightCatalog::new(flights, SeparationMatrix::uniform(n, 10.0), 0.0).unwrap()
    }

    #[test]
    fn single_runway_structure() {
        let c = catalog(3);
        let m = ModelBuilder::new(&c, 0..3).build().unwrap();
        // x, z_p, z_n per flight + d per ordered pair
        assert_eq!(m.variables.len(), 3 * 3 + 6);
        assert_eq!(m.nb_binaries(), 6);
        // 2 slack links per flight + 3 exclusivity + 6 clearances
        assert_eq!(m.constraints.len(), 6 + 3 + 6);
        assert!(m.runway.is_empty() && m.same_runway.is_empty() && m.displacement.is_empty());
        assert_eq!(m.big_m, 120.0 - 0.0 + 10.0);
    }

    #[test]
    fn landing_bounds_are_the_windows() {
        let c = catalog(2);
        let m = ModelBuilder::new(&c, [1]).build().unwrap();
        let x = &m.variables[m.landing[&1].0];
        assert_eq!((x.lower, x.upper), (10.0, 110.0));
        assert_eq!(x.kind, VarKind::Continuous);
    }

    #[test]
    fn multi_runway_adds_assignment_variables() {
        let c = catalog(3);
        let m = ModelBuilder::new(&c, 0..3).runways(2).build().unwrap();
        assert_eq!(m.runway.len(), 6);
        assert_eq!(m.same_runway.len(), 6);
        let links = m.constraints.iter().filter(|c| c.name.starts_with("same_runway[")).count();
        assert_eq!(links, 6 * 2);
        let sym = m.constraints.iter().filter(|c| c.name.starts_with("same_runway_sym")).count();
        assert_eq!(sym, 3);
        let clearance = m.constraints.iter().find(|c| c.name == "clearance[0,1]").unwrap();
        assert_eq!(clearance.rhs, 0.0);
        assert!(clearance.expr.terms.contains(&(m.same_runway[&(1, 0)], -10.0)));
    }

    #[test]
    fn clearance_is_vacuous_when_order_is_reversed() {
        let c = catalog(2);
        let m = ModelBuilder::new(&c, 0..2).build().unwrap();
        let clearance = m.constraints.iter().find(|c| c.name == "clearance[0,1]").unwrap();
        let mut values = vec![0.0; m.variables.len()];
        // flight 1 at its earliest, flight 0 at its latest, 1 lands first
        values[m.landing[&0].0] = 100.0;
        values[m.landing[&1].0] = 10.0;
        values[m.order[&(1, 0)].0] = 1.0;
        assert!(clearance.is_satisfied(&values, 1e-9));
        values[m.order[&(1, 0)].0] = 0.0;
        assert!(!clearance.is_satisfied(&values, 1e-9));
    }

    #[test]
    fn frozen_and_displacement_constraints() {
        let c = catalog(3);
        let frozen = BTreeMap::from([(0, 55.0)]);
        let previous = BTreeMap::from([(1, 50.0), (2, 90.0)]);
        let m = ModelBuilder::new(&c, 0..3).frozen(frozen).previous(previous).build().unwrap();

        let f = m.constraints.iter().find(|c| c.name == "frozen[0]").unwrap();
        assert_eq!((f.sense, f.rhs), (Sense::Equal, 55.0));

        assert_eq!(m.displacement.len(), 2);
        let d = &m.variables[m.displacement[&1].0];
        assert_eq!((d.lower, d.upper), (0.0, DEFAULT_MAX_DISPLACEMENT));

        // flight 1 was early (target 60): only the early-side branch
        assert!(m.constraints.iter().any(|c| c.name == "disp_before_target[1]"));
        // flight 2 was late (target 70): only the late-side branch
        assert!(m.constraints.iter().any(|c| c.name == "disp_after_target[2]"));
        assert_eq!(m.objective.terms.len(), m.landing_cost.terms.len() + 2);
    }

    #[test]
    fn at_target_uses_both_branches() {
        let c = catalog(1);
        let m = ModelBuilder::new(&c, [0]).previous(BTreeMap::from([(0, 50.0)])).build().unwrap();
        let names: Vec<&str> = m.constraints.iter().map(|c| c.name.as_str()).collect();
        assert!(names.contains(&"disp_at_target_early[0]"));
        assert!(names.contains(&"disp_at_target_late[0]"));
    }

    #[test]
    fn construction_errors() {
        let mut c = catalog(2);
        assert_eq!(ModelBuilder::new(&c, []).build().unwrap_err(), ModelError::EmptyActiveSet);
        assert_eq!(ModelBuilder::new(&c, [5]).build().unwrap_err(), ModelError::UnknownFlight(5));
        assert_eq!(ModelBuilder::new(&c, [0]).runways(0).build().unwrap_err(), ModelError::NoRunway);

        let err = ModelBuilder::new(&c, 0..2).frozen(BTreeMap::from([(1, 200.0)])).build().unwrap_err();
        assert!(matches!(err, ModelError::FrozenOutsideWindow { flight: 1, .. }));

        c.flights[1].earliest = 500.0;
        let err = ModelBuilder::new(&c, 0..2).build().unwrap_err();
        assert!(matches!(err, ModelError::InvalidWindow { flight: 1, .. }));
    }
}
