//! Per-scope text index configuration.
//!
//! A configuration call supplies a [`FieldSpecs`] map; [`IndexConfig::merge`]
//! folds it into the scope's existing weights and returns the new config.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Weight given to a field enabled with `true`.
pub const DEFAULT_WEIGHT: u32 = 1;

/// Largest accepted field weight. Heavier specs are malformed.
pub const MAX_WEIGHT: u32 = 1 << 20;

/// How a single field should be indexed, as supplied by a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldSpec {
    /// `true` enables the field at the default weight, `false` excludes it.
    Enabled(bool),
    Weighted { weight: u32 },
    /// Anything else. Treated as an exclusion.
    Invalid(serde_json::Value),
}

impl FieldSpec {
    /// Effective weight, or `None` when the field is excluded.
    pub fn weight(&self) -> Option<u32> {
        match self {
            FieldSpec::Enabled(true) => Some(DEFAULT_WEIGHT),
            FieldSpec::Weighted { weight } if (1..=MAX_WEIGHT).contains(weight) => Some(*weight),
            _ => None,
        }
    }
}

pub type FieldSpecs = BTreeMap<String, FieldSpec>;

/// Serialized form of one configured field, `{"weight": n}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightDescriptor {
    pub weight: u32,
}

/// Merged field → weight mapping for one scope. Every weight is positive.
///
/// Dumps in the same `{field: {"weight": n}}` shape callers configure with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    into = "BTreeMap<String, WeightDescriptor>",
    from = "BTreeMap<String, WeightDescriptor>"
)]
pub struct IndexConfig {
    fields: BTreeMap<String, u32>,
}

impl From<BTreeMap<String, WeightDescriptor>> for IndexConfig {
    fn from(map: BTreeMap<String, WeightDescriptor>) -> Self {
        let fields = map.into_iter().map(|(name, d)| (name, d.weight)).collect();
        IndexConfig { fields }
    }
}

impl From<IndexConfig> for BTreeMap<String, WeightDescriptor> {
    fn from(config: IndexConfig) -> Self {
        config
            .fields
            .into_iter()
            .map(|(name, weight)| (name, WeightDescriptor { weight }))
            .collect()
    }
}

impl IndexConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_specs(specs: &FieldSpecs) -> Self {
        Self::new().merge(specs)
    }

    /// Fold `specs` into this config. Mentioned fields are added, reweighted
    /// or excluded; fields not mentioned are carried over untouched.
    pub fn merge(&self, specs: &FieldSpecs) -> IndexConfig {
        let mut fields = self.fields.clone();
        for (name, spec) in specs {
            match spec.weight() {
                Some(w) => {
                    fields.insert(name.clone(), w);
                }
                None => {
                    if !matches!(spec, FieldSpec::Enabled(false)) {
                        tracing::debug!(field = %name, ?spec, "ignoring malformed field spec");
                    }
                    fields.remove(name);
                }
            }
        }
        IndexConfig { fields }
    }

    pub fn weight(&self, field: &str) -> Option<u32> {
        self.fields.get(field).copied()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
        self.fields.iter().map(|(k, w)| (k.as_str(), *w))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
