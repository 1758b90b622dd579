//! Parameter collections
//!
//! [`ParameterSet`] is the plain name → value map handed to the forward model
//! and moved by the optimizer. [`FitParameters`] is the ordered parameter
//! table the user edits, from which the initial set and the list of free
//! parameters are derived.

use crate::error::{FitError, Result};
use crate::parameters::bounds::Bounds;
use crate::parameters::parameter::{FitParameter, ParameterError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A snapshot of parameter values keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet {
    values: BTreeMap<String, f64>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Value of `name`, or [`FitError::ParameterNotFound`].
    pub fn value(&self, name: &str) -> Result<f64> {
        self.get(name)
            .ok_or_else(|| FitError::ParameterNotFound(name.to_string()))
    }

    /// Insert or overwrite a value.
    pub fn set(&mut self, name: &str, value: f64) {
        match self.values.get_mut(name) {
            Some(slot) => *slot = value,
            None => {
                self.values.insert(name.to_string(), value);
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<f64> {
        self.values.remove(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Check that every name in `required` is present and finite.
    ///
    /// The optimizer calls this once before iterating so a missing key fails
    /// the run up front instead of silently evaluating with a default.
    pub fn require<S: AsRef<str>>(&self, required: &[S]) -> Result<()> {
        for name in required {
            let name = name.as_ref();
            match self.get(name) {
                None => return Err(FitError::MissingParameter(name.to_string())),
                Some(v) if !v.is_finite() => {
                    return Err(FitError::InvalidParameter(format!(
                        "{} has non-finite value {}",
                        name, v
                    )))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

impl FromIterator<(String, f64)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl<'a> FromIterator<(&'a str, f64)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (&'a str, f64)>>(iter: I) -> Self {
        iter.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }
}

/// A parameter the optimizer is allowed to move.
#[derive(Debug, Clone, PartialEq)]
pub struct FreeParameter {
    pub name: String,
    pub bounds: Bounds,
}

/// Ordered parameter table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FitParameters {
    params: Vec<FitParameter>,
}

impl FitParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter, replacing any existing one with the same name.
    pub fn add(&mut self, param: FitParameter) {
        match self.params.iter_mut().find(|p| p.name() == param.name()) {
            Some(existing) => *existing = param,
            None => self.params.push(param),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FitParameter> {
        self.params.iter().find(|p| p.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut FitParameter> {
        self.params.iter_mut().find(|p| p.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FitParameter> {
        self.params.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut FitParameter> {
        self.params.iter_mut()
    }

    /// Current values of every parameter as a map.
    pub fn to_set(&self) -> ParameterSet {
        self.params.iter().map(|p| (p.name(), p.value())).collect()
    }

    /// Parameters that are fit-eligible and not derived, in table order.
    pub fn free_parameters(&self) -> Vec<FreeParameter> {
        self.params
            .iter()
            .filter(|p| p.is_fit() && !p.is_derived())
            .map(|p| FreeParameter {
                name: p.name().to_string(),
                bounds: p.bounds(),
            })
            .collect()
    }

    /// Mark exactly the named parameters as fit-eligible.
    ///
    /// Derived parameters are always left out, even when named.
    pub fn select_for_fit<S: AsRef<str>>(&mut self, names: &[S]) {
        for param in self.params.iter_mut() {
            let wanted = names.iter().any(|n| n.as_ref() == param.name());
            // set_fit only refuses derived parameters, which stay excluded.
            let _ = param.set_fit(wanted && !param.is_derived());
        }
    }

    /// Copy values from `values` into matching rows, ignoring unknown names.
    pub fn apply_values(&mut self, values: &ParameterSet) {
        for param in self.params.iter_mut() {
            if let Some(v) = values.get(param.name()) {
                param.set_value_unchecked(v);
            }
        }
    }

    /// Set one value by name, checking its bounds.
    pub fn set_value(&mut self, name: &str, value: f64) -> std::result::Result<(), ParameterError> {
        self.get_mut(name)
            .ok_or_else(|| ParameterError::ParameterNotFound {
                name: name.to_string(),
            })?
            .set_value(value)
    }
}

impl From<Vec<FitParameter>> for FitParameters {
    fn from(params: Vec<FitParameter>) -> Self {
        let mut out = FitParameters::new();
        for p in params {
            out.add(p);
        }
        out
    }
}

impl IntoIterator for FitParameters {
    type Item = FitParameter;
    type IntoIter = std::vec::IntoIter<FitParameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.into_iter()
    }
}
