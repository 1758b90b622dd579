//! Physical constraint repair
//!
//! Composite and fractured reservoir models only make sense when the inner
//! region is more permeable than the outer one and when the fracture system
//! holds a larger storativity share than the matrix. Trial parameter sets
//! produced by the optimizer, manual edits and sensitivity sweeps can all
//! violate these orderings, so every such set is passed through
//! [`ConstraintRepairer::repair`] before it is used to evaluate a curve.
//!
//! The repairer also owns the derived-parameter relationships (currently the
//! fracture length ratio `LfD = Lf / L`).

use crate::parameters::parameter::DERIVED_LENGTH_RATIO;
use crate::parameters::parameters::ParameterSet;
use serde::{Deserialize, Serialize};

/// Requires `upper > lower` whenever both are present.
///
/// A violation is repaired by lifting `upper` to `lower * factor`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderingRule {
    pub upper: String,
    pub lower: String,
    pub factor: f64,
}

impl OrderingRule {
    pub fn new(upper: &str, lower: &str, factor: f64) -> Self {
        Self {
            upper: upper.to_string(),
            lower: lower.to_string(),
            factor,
        }
    }

    fn apply(&self, params: &mut ParameterSet) {
        if let (Some(upper), Some(lower)) = (params.get(&self.upper), params.get(&self.lower)) {
            if upper <= lower {
                params.set(&self.upper, lower * self.factor);
            }
        }
    }
}

/// `derived = numerator / denominator`, defined while the denominator exceeds
/// `min_denominator`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioRule {
    pub derived: String,
    pub numerator: String,
    pub denominator: String,
    pub min_denominator: f64,
}

impl RatioRule {
    pub fn new(derived: &str, numerator: &str, denominator: &str, min_denominator: f64) -> Self {
        Self {
            derived: derived.to_string(),
            numerator: numerator.to_string(),
            denominator: denominator.to_string(),
            min_denominator,
        }
    }

    fn depends_on(&self, name: &str) -> bool {
        self.numerator == name || self.denominator == name
    }

    fn apply(&self, params: &mut ParameterSet, mode: DerivedMode) {
        let num = params.get(&self.numerator);
        let den = params.get(&self.denominator);
        match (num, den) {
            (Some(num), Some(den)) if den > self.min_denominator => {
                params.set(&self.derived, num / den);
            }
            _ => {
                if mode == DerivedMode::ZeroWhenUndefined {
                    params.set(&self.derived, 0.0);
                }
            }
        }
    }
}

/// What to do with a derived value whose inputs are missing or degenerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedMode {
    /// Leave whatever value is already in the set (solver path).
    KeepWhenUndefined,

    /// Store zero (display path, so curves never see a stale ratio).
    ZeroWhenUndefined,
}

/// Enforces parameter orderings and recomputes derived parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintRepairer {
    pub orderings: Vec<OrderingRule>,
    pub ratios: Vec<RatioRule>,
}

impl Default for ConstraintRepairer {
    fn default() -> Self {
        Self {
            orderings: vec![
                OrderingRule::new("kf", "km", 1.01),
                OrderingRule::new("omega1", "omega2", 1.01),
            ],
            ratios: vec![RatioRule::new(DERIVED_LENGTH_RATIO, "Lf", "L", 1e-9)],
        }
    }
}

impl ConstraintRepairer {
    /// A repairer that changes nothing.
    pub fn none() -> Self {
        Self {
            orderings: Vec::new(),
            ratios: Vec::new(),
        }
    }

    /// Recompute derived parameters, then enforce the orderings.
    ///
    /// Derived values are left untouched when undefined.
    pub fn repair(&self, params: &mut ParameterSet) {
        self.update_derived(params, DerivedMode::KeepWhenUndefined);
        self.enforce_orderings(params);
    }

    /// Like [`repair`](Self::repair) but zeroes undefined derived values.
    pub fn repair_for_display(&self, params: &mut ParameterSet) {
        self.update_derived(params, DerivedMode::ZeroWhenUndefined);
        self.enforce_orderings(params);
    }

    pub fn enforce_orderings(&self, params: &mut ParameterSet) {
        for rule in &self.orderings {
            rule.apply(params);
        }
    }

    pub fn update_derived(&self, params: &mut ParameterSet, mode: DerivedMode) {
        for rule in &self.ratios {
            rule.apply(params, mode);
        }
    }

    /// Recompute only the derived values that depend on `changed`.
    pub fn update_derived_for(&self, changed: &str, params: &mut ParameterSet) {
        for rule in self.ratios.iter().filter(|r| r.depends_on(changed)) {
            rule.apply(params, DerivedMode::KeepWhenUndefined);
        }
    }

    /// Whether `name` is produced by a derived relationship.
    pub fn is_derived(&self, name: &str) -> bool {
        self.ratios.iter().any(|r| r.derived == name)
    }

    /// Check every ordering holds strictly.
    pub fn is_satisfied(&self, params: &ParameterSet) -> bool {
        self.orderings.iter().all(|rule| {
            match (params.get(&rule.upper), params.get(&rule.lower)) {
                (Some(upper), Some(lower)) => upper > lower,
                _ => true,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn set(pairs: &[(&str, f64)]) -> ParameterSet {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_inner_permeability_lifted_above_outer() {
        let repairer = ConstraintRepairer::default();
        let mut params = set(&[("kf", 5.0), ("km", 10.0)]);
        repairer.repair(&mut params);
        assert_relative_eq!(params.get("kf").unwrap(), 10.1, epsilon = 1e-12);

        // equal values violate the strict ordering too
        let mut params = set(&[("kf", 10.0), ("km", 10.0)]);
        repairer.repair(&mut params);
        assert!(params.get("kf").unwrap() > 10.0);
        assert!(repairer.is_satisfied(&params));
    }

    #[test]
    fn test_storativity_ratio_ordering() {
        let repairer = ConstraintRepairer::default();
        let mut params = set(&[("omega1", 0.01), ("omega2", 0.2)]);
        repairer.repair(&mut params);
        assert_relative_eq!(params.get("omega1").unwrap(), 0.202, epsilon = 1e-12);
        assert_eq!(params.get("omega2"), Some(0.2));
    }

    #[test]
    fn test_orderings_need_both_members() {
        let repairer = ConstraintRepairer::default();
        let mut params = set(&[("kf", 1.0), ("omega2", 0.5)]);
        let before = params.clone();
        repairer.repair(&mut params);
        assert_eq!(params, before);
    }

    #[test]
    fn test_length_ratio_recomputed() {
        let repairer = ConstraintRepairer::default();
        let mut params = set(&[("L", 1000.0), ("Lf", 250.0), ("LfD", 9.0)]);
        repairer.repair(&mut params);
        assert_relative_eq!(params.get("LfD").unwrap(), 0.25, epsilon = 1e-15);
    }

    #[test]
    fn test_length_ratio_undefined() {
        let repairer = ConstraintRepairer::default();

        let mut params = set(&[("L", 0.0), ("Lf", 250.0), ("LfD", 0.3)]);
        repairer.repair(&mut params);
        assert_eq!(params.get("LfD"), Some(0.3));

        repairer.repair_for_display(&mut params);
        assert_eq!(params.get("LfD"), Some(0.0));

        let mut params = set(&[("kf", 2.0)]);
        repairer.repair_for_display(&mut params);
        assert_eq!(params.get("LfD"), Some(0.0));
    }

    #[test]
    fn test_update_derived_for_only_touches_dependents() {
        let repairer = ConstraintRepairer::default();
        let mut params = set(&[("L", 100.0), ("Lf", 50.0), ("LfD", 7.0), ("kf", 1.0), ("km", 2.0)]);

        repairer.update_derived_for("kf", &mut params);
        assert_eq!(params.get("LfD"), Some(7.0));
        assert_eq!(params.get("kf"), Some(1.0));

        repairer.update_derived_for("Lf", &mut params);
        assert_relative_eq!(params.get("LfD").unwrap(), 0.5);
    }

    #[test]
    fn test_is_derived() {
        let repairer = ConstraintRepairer::default();
        assert!(repairer.is_derived("LfD"));
        assert!(!repairer.is_derived("Lf"));
        assert!(!ConstraintRepairer::none().is_derived("LfD"));
    }
}
