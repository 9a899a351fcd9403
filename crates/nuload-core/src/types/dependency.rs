//! Dependency edges and per-framework dependency groups.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::framework::TargetFramework;
use super::version::VersionRange;

/// A declared dependency: an id and the range it must fall in
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub id: String,
    #[serde(default)]
    pub range: VersionRange,
}

impl DependencyEdge {
    pub fn new(id: impl Into<String>, range: VersionRange) -> Self {
        Self {
            id: id.into(),
            range,
        }
    }
}

impl fmt::Display for DependencyEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.range)
    }
}

/// Dependencies declared for one target framework (`None` applies to all)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyGroup {
    #[serde(default)]
    pub target_framework: Option<TargetFramework>,
    #[serde(default)]
    pub dependencies: Vec<DependencyEdge>,
}

/// Dependencies that apply when the package is consumed by `framework`
///
/// The group with the nearest compatible framework wins. A group without a
/// framework is the fallback when no specific group matches.
pub fn select_group(groups: &[DependencyGroup], framework: &TargetFramework) -> Vec<DependencyEdge> {
    let specific = framework.nearest(groups.iter().filter_map(|g| g.target_framework.as_ref()));

    let chosen = match specific {
        Some(target) => groups
            .iter()
            .find(|g| g.target_framework.as_ref() == Some(target)),
        None => groups.iter().find(|g| g.target_framework.is_none()),
    };

    chosen.map(|g| g.dependencies.clone()).unwrap_or_default()
}
