use std::collections::HashMap;
use std::fmt;

use serde::{Serialize, Serializer};

/// Identity under which a histogram is tracked: the category's literal value,
/// or its 1-based position in the sorted set of distinct values. Stable for
/// the whole run; equality and ordering are structural.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CatKey {
    Name(String),
    Level(u32),
}

impl fmt::Display for CatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatKey::Name(s) => write!(f, "{}", s),
            CatKey::Level(n) => write!(f, "{}", n),
        }
    }
}

impl Serialize for CatKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CatKey::Name(s) => serializer.serialize_str(s),
            CatKey::Level(n) => serializer.serialize_u32(*n),
        }
    }
}

/// Caller-facing category configuration.
#[derive(Debug, Clone, Default)]
pub struct CategorySpec {
    /// Keep only these literal values.
    pub filter: Option<Vec<String>>,
    /// Keep only rows whose numeric category value is >= this.
    pub val_min: Option<f64>,
    /// Keep only rows whose numeric category value is <= this.
    pub val_max: Option<f64>,
    /// Discretize a numeric category into this many equal-width buckets.
    pub val_buckets: Option<u32>,
    /// Report literal values as keys even when they are numeric.
    pub force_names: bool,
}

impl CategorySpec {
    /// Row-level filtering, applied before categories are finalized.
    pub fn accepts(&self, raw: &str) -> bool {
        if let Some(allow) = &self.filter {
            if !allow.iter().any(|v| v == raw) {
                return false;
            }
        }
        if self.val_min.is_some() || self.val_max.is_some() {
            let v = match raw.parse::<f64>() {
                Ok(v) => v,
                Err(_) => return false,
            };
            if let Some(min) = self.val_min {
                if v < min {
                    return false;
                }
            }
            if let Some(max) = self.val_max {
                if v > max {
                    return false;
                }
            }
        }
        true
    }

    /// Whether key resolution needs the global value range of the category
    /// column (bucket boundaries depend on the whole dataset).
    pub fn needs_value_range(&self) -> bool {
        self.val_buckets.is_some()
    }
}

#[derive(Debug, Clone)]
enum Keying {
    /// Literal values as keys, assigned lazily on first encounter.
    Names,
    /// 1-based levels over the sorted distinct values, fixed up front.
    Levels(HashMap<String, u32>),
    /// Equal-width buckets over the global value range, each bucket a level.
    Buckets { lo: f64, width: f64, n: u32 },
}

/// Frozen category resolution for one run: filtering plus key assignment.
#[derive(Debug, Clone)]
pub struct Categorizer {
    spec: CategorySpec,
    keying: Keying,
}

impl Categorizer {
    /// Resolve key assignment against the globally sorted distinct values
    /// (and, for discretization, the global post-filter value range). Never
    /// computed per batch: level numbers would drift as new values appear.
    pub fn resolve(
        spec: &CategorySpec,
        distinct: &[String],
        value_range: Option<(f64, f64)>,
    ) -> Self {
        let keying = if let Some(n) = spec.val_buckets {
            let (lo, hi) = value_range.unwrap_or((0.0, 0.0));
            let range = hi - lo;
            let width = if range == 0.0 { 1.0 } else { range / n as f64 };
            Keying::Buckets { lo, width, n }
        } else if spec.force_names || !all_numeric(distinct) {
            Keying::Names
        } else {
            let mut sorted = sort_values(distinct);
            sorted.dedup();
            Keying::Levels(
                sorted
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| (v, i as u32 + 1))
                    .collect(),
            )
        };
        Self {
            spec: spec.clone(),
            keying,
        }
    }

    pub fn accepts(&self, raw: &str) -> bool {
        self.spec.accepts(raw)
    }

    /// Key for one row's category value; None when the row is filtered out
    /// or the value cannot be keyed.
    pub fn key_for(&self, raw: &str) -> Option<CatKey> {
        if !self.spec.accepts(raw) {
            return None;
        }
        match &self.keying {
            Keying::Names => Some(CatKey::Name(raw.to_string())),
            Keying::Levels(index) => index.get(raw).copied().map(CatKey::Level),
            Keying::Buckets { lo, width, n } => {
                let v = raw.parse::<f64>().ok()?;
                let idx = ((v - lo) / width).floor() as i64;
                let idx = idx.clamp(0, *n as i64 - 1) as u32;
                Some(CatKey::Level(idx + 1))
            }
        }
    }

    /// Keys that must exist in the output even with zero rows. Discretization
    /// emits every bucket; other modes only emit encountered values.
    pub fn seed_keys(&self) -> Vec<CatKey> {
        match &self.keying {
            Keying::Buckets { n, .. } => (1..=*n).map(CatKey::Level).collect(),
            Keying::Levels(index) => {
                let mut levels: Vec<u32> = index.values().copied().collect();
                levels.sort_unstable();
                levels.into_iter().map(CatKey::Level).collect()
            }
            Keying::Names => Vec::new(),
        }
    }
}

fn all_numeric(values: &[String]) -> bool {
    !values.is_empty() && values.iter().all(|v| v.parse::<f64>().is_ok())
}

/// Sort distinct values numerically when they all parse, lexically otherwise.
fn sort_values(values: &[String]) -> Vec<String> {
    let mut sorted: Vec<String> = values.to_vec();
    if all_numeric(values) {
        sorted.sort_by(|a, b| {
            let fa = a.parse::<f64>().unwrap();
            let fb = b.parse::<f64>().unwrap();
            fa.partial_cmp(&fb).unwrap_or(std::cmp::Ordering::Equal)
        });
    } else {
        sorted.sort();
    }
    sorted
}
