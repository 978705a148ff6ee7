//! Hyperparameter values and search grids

use crate::error::{Result, TrainerError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single hyperparameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Int(i) => write!(f, "{}", i),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

impl ParamValue {
    fn invalid(&self, name: &str, reason: &str) -> TrainerError {
        TrainerError::InvalidParameter {
            name: name.to_string(),
            value: self.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Interpret as a non-negative integer
    pub fn as_usize(&self, name: &str) -> Result<usize> {
        match self {
            ParamValue::Int(i) if *i >= 0 => Ok(*i as usize),
            ParamValue::Int(_) => Err(self.invalid(name, "must be non-negative")),
            _ => Err(self.invalid(name, "expected an integer")),
        }
    }

    /// Interpret as a float; integers are widened
    pub fn as_f64(&self, name: &str) -> Result<f64> {
        match self {
            ParamValue::Float(v) => Ok(*v),
            ParamValue::Int(i) => Ok(*i as f64),
            _ => Err(self.invalid(name, "expected a number")),
        }
    }

    pub fn as_bool(&self, name: &str) -> Result<bool> {
        match self {
            ParamValue::Bool(b) => Ok(*b),
            _ => Err(self.invalid(name, "expected a boolean")),
        }
    }

    pub fn as_str(&self, name: &str) -> Result<&str> {
        match self {
            ParamValue::Text(s) => Ok(s.as_str()),
            _ => Err(self.invalid(name, "expected a string")),
        }
    }

    /// `None`-able integer: the text `"none"` maps to `None`
    pub fn as_optional_usize(&self, name: &str) -> Result<Option<usize>> {
        match self {
            ParamValue::Text(s) if s.eq_ignore_ascii_case("none") => Ok(None),
            _ => self.as_usize(name).map(Some),
        }
    }
}

/// One concrete assignment of hyperparameters, in grid order
pub type ParamSet = Vec<(String, ParamValue)>;

/// Render a parameter set as `name=value, ...`
pub fn format_params(params: &ParamSet) -> String {
    if params.is_empty() {
        return "defaults".to_string();
    }
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Ordered mapping from hyperparameter name to candidate values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    entries: Vec<(String, Vec<ParamValue>)>,
}

impl ParamGrid {
    /// Empty grid: no tuning
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a hyperparameter and its candidate values; replaces an existing key in place
    pub fn with<V: Into<ParamValue>>(mut self, name: impl Into<String>, values: Vec<V>) -> Self {
        let name = name.into();
        let values: Vec<ParamValue> = values.into_iter().map(Into::into).collect();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = values,
            None => self.entries.push((name, values)),
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Number of combinations the grid expands to (1 for an empty grid)
    pub fn n_combinations(&self) -> usize {
        self.entries.iter().map(|(_, v)| v.len()).product()
    }

    /// Cartesian product of all values; the last key varies fastest
    pub fn combinations(&self) -> Vec<ParamSet> {
        let mut combos: Vec<ParamSet> = vec![Vec::new()];
        for (name, values) in &self.entries {
            let mut next = Vec::with_capacity(combos.len() * values.len());
            for combo in &combos {
                for value in values {
                    let mut extended = combo.clone();
                    extended.push((name.clone(), value.clone()));
                    next.push(extended);
                }
            }
            combos = next;
        }
        combos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_grid_has_single_default_combination() {
        let grid = ParamGrid::new();
        assert!(grid.is_empty());
        assert_eq!(grid.n_combinations(), 1);
        assert_eq!(grid.combinations(), vec![Vec::new()]);
    }

    #[test]
    fn test_combination_order() {
        let grid = ParamGrid::new()
            .with("max_depth", vec![2usize, 4])
            .with("criterion", vec!["squared_error", "poisson"]);

        let combos = grid.combinations();
        assert_eq!(combos.len(), 4);
        assert_eq!(grid.n_combinations(), 4);
        assert_eq!(format_params(&combos[0]), "max_depth=2, criterion=squared_error");
        assert_eq!(format_params(&combos[1]), "max_depth=2, criterion=poisson");
        assert_eq!(format_params(&combos[3]), "max_depth=4, criterion=poisson");
    }

    #[test]
    fn test_empty_value_list_yields_nothing() {
        let grid = ParamGrid::new().with("n_neighbors", Vec::<usize>::new());
        assert_eq!(grid.n_combinations(), 0);
        assert!(grid.combinations().is_empty());
    }

    #[test]
    fn test_with_replaces_existing_key() {
        let grid = ParamGrid::new()
            .with("learning_rate", vec![0.1])
            .with("learning_rate", vec![0.01, 0.05]);
        assert_eq!(grid.keys().count(), 1);
        assert_eq!(grid.n_combinations(), 2);
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(ParamValue::Int(3).as_f64("lr").unwrap(), 3.0);
        assert_eq!(ParamValue::Int(7).as_usize("k").unwrap(), 7);
        assert!(ParamValue::Int(-1).as_usize("k").is_err());
        assert!(ParamValue::Float(0.5).as_usize("k").is_err());
        assert_eq!(ParamValue::from("None").as_optional_usize("max_depth").unwrap(), None);
        assert!(matches!(
            ParamValue::from("x").as_bool("bootstrap"),
            Err(TrainerError::InvalidParameter { .. })
        ));
    }
}
