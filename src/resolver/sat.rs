// src/resolver/sat.rs

//! Translation boundary to the SAT engine
//!
//! Variants are sparse [`VarId`]s; the engine wants dense 1-based variables.
//! [`SatAdapter`] assigns engine variables on first use and maps models and
//! failed cores back. It knows nothing about packages.

use super::clause::Literal;
use crate::error::{Error, Result};
use crate::snapshot::VarId;
use std::collections::HashMap;
use tracing::debug;
use varisat::lit::Lit;
use varisat::{ExtendFormula, Solver};

/// Result of one solver run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SatOutcome {
    /// Value of every variable the engine saw
    Satisfiable(HashMap<VarId, bool>),
    /// Variables of the assumptions that cannot hold together
    Unsatisfiable(Vec<VarId>),
}

pub struct SatAdapter {
    solver: Solver<'static>,
    to_engine: HashMap<VarId, usize>,
    from_engine: Vec<VarId>,
    assumptions: Vec<Lit>,
    /// Assumptions on variables no clause mentions
    free_assumptions: Vec<Literal>,
    clause_count: usize,
}

impl Default for SatAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SatAdapter {
    pub fn new() -> Self {
        Self {
            solver: Solver::new(),
            to_engine: HashMap::new(),
            from_engine: Vec::new(),
            assumptions: Vec::new(),
            free_assumptions: Vec::new(),
            clause_count: 0,
        }
    }

    /// Engine variable for `var`, 1-based
    fn engine_var(&mut self, var: VarId) -> usize {
        if let Some(&idx) = self.to_engine.get(&var) {
            return idx;
        }
        self.from_engine.push(var);
        let idx = self.from_engine.len();
        self.to_engine.insert(var, idx);
        idx
    }

    fn engine_lit(&mut self, lit: Literal) -> Lit {
        let idx = self.engine_var(lit.var) as isize;
        Lit::from_dimacs(if lit.negated { -idx } else { idx })
    }

    fn decode(&self, lit: Lit) -> Option<VarId> {
        let idx = lit.var().to_dimacs().unsigned_abs();
        idx.checked_sub(1).and_then(|i| self.from_engine.get(i)).copied()
    }

    pub fn add_clause(&mut self, clause: &[Literal]) {
        let lits: Vec<Lit> = clause.iter().map(|&l| self.engine_lit(l)).collect();
        self.solver.add_clause(&lits);
        self.clause_count += 1;
    }

    /// Fix literals for the next [`SatAdapter::solve`] call
    ///
    /// Assumptions are what an unsatisfiable result is explained in terms of.
    /// Variables no clause mentions never reach the engine; their value is
    /// the assumed one.
    pub fn assume(&mut self, lits: &[Literal]) {
        self.assumptions.clear();
        self.free_assumptions.clear();
        for &lit in lits {
            if self.to_engine.contains_key(&lit.var) {
                let engine = self.engine_lit(lit);
                self.assumptions.push(engine);
            } else {
                self.free_assumptions.push(lit);
            }
        }
    }

    pub fn var_count(&self) -> usize {
        self.from_engine.len()
    }

    pub fn clause_count(&self) -> usize {
        self.clause_count
    }

    pub fn solve(&mut self) -> Result<SatOutcome> {
        let mut free: HashMap<VarId, bool> = HashMap::with_capacity(self.free_assumptions.len());
        let mut contradicting = Vec::new();
        for lit in &self.free_assumptions {
            let value = lit.holds(true);
            if free.insert(lit.var, value).is_some_and(|old| old != value) {
                contradicting.push(lit.var);
            }
        }
        if !contradicting.is_empty() {
            contradicting.sort();
            contradicting.dedup();
            return Ok(SatOutcome::Unsatisfiable(contradicting));
        }

        self.solver.assume(&self.assumptions);
        let satisfiable = self
            .solver
            .solve()
            .map_err(|e| Error::SatError(e.to_string()))?;
        debug!(
            "SAT run over {} variables, {} clauses, {} assumptions: {}",
            self.var_count(),
            self.clause_count,
            self.assumptions.len(),
            if satisfiable { "satisfiable" } else { "unsatisfiable" }
        );

        if satisfiable {
            let model = self
                .solver
                .model()
                .ok_or_else(|| Error::SatError("solver returned no model".to_string()))?;
            let mut values: HashMap<VarId, bool> = self.from_engine.iter().map(|&v| (v, false)).collect();
            for lit in model {
                if let Some(var) = self.decode(lit) {
                    values.insert(var, lit.is_positive());
                }
            }
            values.extend(free);
            return Ok(SatOutcome::Satisfiable(values));
        }

        let mut conflicting: Vec<VarId> = self
            .solver
            .failed_core()
            .unwrap_or(&[])
            .iter()
            .filter_map(|&lit| self.decode(lit))
            .collect();
        conflicting.sort();
        conflicting.dedup();
        Ok(SatOutcome::Unsatisfiable(conflicting))
    }
}
