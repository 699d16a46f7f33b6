use serde::{Deserialize, Serialize};

/// Default limit on nested groups. Real plugin files nest at most a handful of levels.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Knobs for unpacking.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Parse group children. When off, every group keeps its children as raw bytes until
    /// expanded.
    pub process_children: bool,
    /// Re-encode each typed record right after decoding it, and keep it as opaque fields if the
    /// bytes differ from the original payload.
    pub verify_round_trip: bool,
    /// Groups nested deeper than this are kept as raw bytes.
    pub max_depth: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            process_children: true,
            verify_round_trip: true,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ProcessorConfig {
    /// Top-level records only, groups left deferred.
    pub fn shallow() -> Self {
        Self {
            process_children: false,
            ..Self::default()
        }
    }

    pub fn with_process_children(mut self, process_children: bool) -> Self {
        self.process_children = process_children;
        self
    }

    pub fn with_verify_round_trip(mut self, verify_round_trip: bool) -> Self {
        self.verify_round_trip = verify_round_trip;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}
