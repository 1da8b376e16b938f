// src/resolver/clause.rs

//! Boolean clauses over package variants

use crate::snapshot::{Snapshot, VarId};
use std::fmt;

/// A signed variable: `var` is installed, or (negated) is not
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Literal {
    pub var: VarId,
    pub negated: bool,
}

impl Literal {
    pub fn positive(var: VarId) -> Self {
        Self {
            var,
            negated: false,
        }
    }

    pub fn negative(var: VarId) -> Self {
        Self { var, negated: true }
    }

    /// Whether this literal holds when `var` takes `value`
    pub fn holds(&self, value: bool) -> bool {
        value != self.negated
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "!{}", self.var)
        } else {
            write!(f, "{}", self.var)
        }
    }
}

/// A disjunction of literals
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Clause {
    literals: Vec<Literal>,
}

impl Clause {
    pub fn new(literals: Vec<Literal>) -> Self {
        Self { literals }
    }

    pub fn unit(lit: Literal) -> Self {
        Self::new(vec![lit])
    }

    /// `var` implies at least one of `alternatives`
    pub fn requires(var: VarId, alternatives: &[VarId]) -> Self {
        let mut literals = Vec::with_capacity(alternatives.len() + 1);
        literals.push(Literal::negative(var));
        literals.extend(alternatives.iter().copied().map(Literal::positive));
        Self::new(literals)
    }

    /// Not both `a` and `b`
    pub fn at_most_one(a: VarId, b: VarId) -> Self {
        Self::new(vec![Literal::negative(a), Literal::negative(b)])
    }

    /// At least one of `a` and `b`
    pub fn at_least_one(a: VarId, b: VarId) -> Self {
        Self::new(vec![Literal::positive(a), Literal::positive(b)])
    }

    pub fn literals(&self) -> &[Literal] {
        &self.literals
    }

    pub fn vars(&self) -> impl Iterator<Item = VarId> + '_ {
        self.literals.iter().map(|l| l.var)
    }

    pub fn len(&self) -> usize {
        self.literals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    /// Evaluate under an assignment
    pub fn is_satisfied_by(&self, value: impl Fn(VarId) -> bool) -> bool {
        self.literals.iter().any(|l| l.holds(value(l.var)))
    }

    /// `!name-evr || name-evr` with variants spelled out
    pub fn render(&self, snapshot: &Snapshot) -> String {
        self.literals
            .iter()
            .map(|l| {
                let name = snapshot.describe(l.var);
                if l.negated { format!("!{}", name) } else { name }
            })
            .collect::<Vec<_>>()
            .join(" || ")
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, lit) in self.literals.iter().enumerate() {
            if i > 0 {
                f.write_str(" || ")?;
            }
            write!(f, "{}", lit)?;
        }
        Ok(())
    }
}

/// Render a clause set one clause per line, lines joined by `&&`
pub fn render_clauses<'a>(clauses: impl IntoIterator<Item = &'a Clause>, snapshot: &Snapshot) -> String {
    clauses
        .into_iter()
        .map(|c| format!("({})", c.render(snapshot)))
        .collect::<Vec<_>>()
        .join(" &&\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_clause() {
        let c = Clause::requires(VarId(1), &[VarId(2), VarId(3)]);
        assert_eq!(c.to_string(), "!v1 || v2 || v3");
        assert_eq!(c.len(), 3);

        assert!(c.is_satisfied_by(|_| false));
        assert!(!c.is_satisfied_by(|v| v == VarId(1)));
        assert!(c.is_satisfied_by(|v| v == VarId(1) || v == VarId(3)));
    }

    #[test]
    fn test_pairwise_clauses() {
        let c = Clause::at_most_one(VarId(4), VarId(5));
        assert!(!c.is_satisfied_by(|_| true));
        assert!(c.is_satisfied_by(|v| v == VarId(4)));

        let c = Clause::at_least_one(VarId(4), VarId(5));
        assert!(!c.is_satisfied_by(|_| false));
        assert_eq!(c.vars().collect::<Vec<_>>(), vec![VarId(4), VarId(5)]);
    }
}
