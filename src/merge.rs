use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Position of local documents relative to harvested ones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeOrder {
    /// Harvested documents first, then local ones
    #[default]
    RemoteFirst,
    /// Local documents first, then harvested ones
    LocalFirst,
}

/// Combine harvested and local document paths.
///
/// Pure append in configured order. Local paths are not checked here.
pub fn merge(harvested: Vec<PathBuf>, local: &[PathBuf], order: MergeOrder) -> Vec<PathBuf> {
    if local.is_empty() {
        return harvested;
    }

    let mut combined = Vec::with_capacity(harvested.len() + local.len());
    match order {
        MergeOrder::RemoteFirst => {
            combined.extend(harvested);
            combined.extend_from_slice(local);
        }
        MergeOrder::LocalFirst => {
            combined.extend_from_slice(local);
            combined.extend(harvested);
        }
    }
    combined
}
