/// How the emissions of an action are flattened into the state feed once a newer action has
/// been dispatched.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FlattenPolicy {
    /// Every emission is delivered, even if newer actions are already queued.
    #[default]
    MergeAll,
    /// Remaining emissions of an action are dropped as soon as a newer action is queued. The
    /// action still runs to completion and its last value remains the next baseline.
    SwitchLatest,
}

/// Tuning knobs of a store's state pipeline.
#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StoreConfig {
    pub flatten: FlattenPolicy,
    /// Collapse emissions produced within the same scheduling tick into the last one.
    pub coalesce: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            flatten: FlattenPolicy::MergeAll,
            coalesce: true,
        }
    }
}

impl StoreConfig {
    pub fn with_flatten(self, flatten: FlattenPolicy) -> Self {
        Self { flatten, ..self }
    }

    pub fn with_coalesce(self, coalesce: bool) -> Self {
        Self { coalesce, ..self }
    }

    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
