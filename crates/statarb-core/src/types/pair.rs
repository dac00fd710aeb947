//! Pair identifiers, cointegration candidates and keyed pair matrices.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Two instrument symbols. Order is significant for display and regression
/// direction; use [`PairKey::unordered`] for direction-agnostic lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    pub first: String,
    pub second: String,
}

impl PairKey {
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self {
            first: first.into(),
            second: second.into(),
        }
    }

    /// Canonical form with symbols in lexical order.
    pub fn unordered(&self) -> Self {
        if self.first <= self.second {
            self.clone()
        } else {
            self.reversed()
        }
    }

    pub fn reversed(&self) -> Self {
        Self::new(self.second.clone(), self.first.clone())
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.first, self.second)
    }
}

/// MacKinnon critical values for a unit-root test statistic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriticalValues {
    pub one_pct: f64,
    pub five_pct: f64,
    pub ten_pct: f64,
}

/// A pair whose cointegrating residual rejected a unit root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairCandidate {
    /// Dependent symbol of the cointegrating regression.
    pub symbol_a: String,
    /// Independent symbol of the cointegrating regression.
    pub symbol_b: String,
    /// Engle-Granger ADF statistic (more negative = stronger).
    pub test_statistic: f64,
    /// MacKinnon approximate p-value in [0, 1].
    pub p_value: f64,
    pub critical_values: CriticalValues,
    /// Augmented lags used by the residual unit-root regression.
    pub adf_lags: usize,
    /// Observations in the cointegrating regression.
    pub nobs: usize,
    /// Slope of the cointegrating regression.
    pub hedge_ratio: f64,
}

impl PairCandidate {
    pub fn key(&self) -> PairKey {
        PairKey::new(self.symbol_a.clone(), self.symbol_b.clone())
    }

    pub fn is_significant(&self, significance: f64) -> bool {
        self.p_value < significance
    }
}

/// Symmetric pairwise values keyed by symbol pair rather than matrix position.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(into = "Vec<MatrixEntry>")]
pub struct PairMatrix {
    values: BTreeMap<PairKey, f64>,
}

/// Flat serialized form of one [`PairMatrix`] cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixEntry {
    pub symbol_a: String,
    pub symbol_b: String,
    pub value: f64,
}

impl PairMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value for a pair. Self-pairs are ignored.
    pub fn insert(&mut self, key: &PairKey, value: f64) {
        if key.first == key.second {
            return;
        }
        self.values.insert(key.unordered(), value);
    }

    /// Value for a pair in either order; `None` for self-pairs and untested pairs.
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        if a == b {
            return None;
        }
        self.values.get(&PairKey::new(a, b).unordered()).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PairKey, f64)> {
        self.values.iter().map(|(k, v)| (k, *v))
    }

    /// Positional view over `symbols`; the diagonal and untested cells are `None`.
    pub fn to_dense(&self, symbols: &[&str]) -> Vec<Vec<Option<f64>>> {
        symbols
            .iter()
            .map(|a| symbols.iter().map(|b| self.get(a, b)).collect())
            .collect()
    }
}

impl From<PairMatrix> for Vec<MatrixEntry> {
    fn from(matrix: PairMatrix) -> Self {
        matrix
            .values
            .into_iter()
            .map(|(key, value)| MatrixEntry {
                symbol_a: key.first,
                symbol_b: key.second,
                value,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_key_unordered() {
        let key = PairKey::new("NZDJPY", "CADJPY");
        assert_eq!(key.unordered(), PairKey::new("CADJPY", "NZDJPY"));
        assert_eq!(key.to_string(), "NZDJPY/CADJPY");
    }

    #[test]
    fn test_matrix_is_symmetric() {
        let mut m = PairMatrix::new();
        m.insert(&PairKey::new("B", "A"), 0.01);
        assert_eq!(m.get("A", "B"), Some(0.01));
        assert_eq!(m.get("B", "A"), Some(0.01));
        assert_eq!(m.get("A", "A"), None);
        assert_eq!(m.get("A", "C"), None);
    }

    #[test]
    fn test_matrix_ignores_self_pairs() {
        let mut m = PairMatrix::new();
        m.insert(&PairKey::new("A", "A"), 1.0);
        assert!(m.is_empty());
    }

    #[test]
    fn test_dense_view() {
        let mut m = PairMatrix::new();
        m.insert(&PairKey::new("A", "B"), 0.2);
        let dense = m.to_dense(&["A", "B"]);
        assert_eq!(dense, vec![vec![None, Some(0.2)], vec![Some(0.2), None]]);
    }

    #[test]
    fn test_matrix_serializes_as_entries() {
        let mut m = PairMatrix::new();
        m.insert(&PairKey::new("A", "B"), 0.5);
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json[0]["symbol_a"], "A");
        assert_eq!(json[0]["value"], 0.5);
    }
}
