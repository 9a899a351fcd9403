//! Version selection over a gathered universe
//!
//! Picks exactly one candidate per package id with a backtracking search.
//! Ids are decided in discovery order: the requested roots first, then the
//! dependency targets of each selected package in selection order.

use indexmap::{IndexMap, IndexSet};
use std::fmt;
use tracing::{debug, info, warn};

use nuload_core::error::NuloadError;
use nuload_core::types::normalize_id;
use nuload_core::{
    CandidatePackage, DependencyBehavior, PackageIdentity, PackageRequest, ResolvedSet, Version,
    VersionRange,
};

use crate::gather::Universe;
use crate::graph::ResolvedGraph;
use crate::ResolverResult;

/// Default cap on candidate selections tried in one resolution
pub const DEFAULT_STEP_LIMIT: usize = 100_000;

/// One constraint on the version of an id
#[derive(Debug, Clone, Copy)]
enum Requirement<'a> {
    Root(&'a PackageRequest),
    /// A root without a range takes the latest version gathered for it
    Latest(&'a Version),
    Edge {
        range: &'a VersionRange,
        from: &'a PackageIdentity,
    },
}

impl Requirement<'_> {
    fn admits(&self, version: &Version) -> bool {
        match self {
            Requirement::Root(request) => request.accepts(version),
            Requirement::Latest(latest) => version == *latest,
            Requirement::Edge { range, .. } => range.satisfies(version),
        }
    }
}

impl fmt::Display for Requirement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Root(request) => write!(f, "{} (requested)", request.range_display()),
            Requirement::Latest(latest) => write!(f, "[{}] (latest requested)", latest),
            Requirement::Edge { range, from } => write!(f, "{} (required by {})", range, from),
        }
    }
}

/// A decided id and the candidates left to try for it
#[derive(Debug)]
struct Frame {
    key: String,
    candidates: Vec<usize>,
    next: usize,
}

/// Search state: selected arena slots by lowercase id, in selection order
struct Search<'a> {
    universe: &'a Universe,
    roots: &'a [PackageRequest],
    root_keys: Vec<String>,
    selected: IndexMap<String, usize>,
    /// Ids blamed for dead ends, lowercase key -> display id
    conflicts: IndexMap<String, String>,
}

impl<'a> Search<'a> {
    fn new(universe: &'a Universe, roots: &'a [PackageRequest]) -> Self {
        let root_keys: IndexSet<String> = roots.iter().map(|r| normalize_id(&r.id)).collect();
        Self {
            universe,
            roots,
            root_keys: root_keys.into_iter().collect(),
            selected: IndexMap::new(),
            conflicts: IndexMap::new(),
        }
    }

    fn selected_package(&self, key: &str) -> Option<&'a CandidatePackage> {
        let universe = self.universe;
        self.selected.get(key).and_then(|&slot| universe.at(slot))
    }

    /// The first id in discovery order that still needs a version
    fn next_undecided(&self) -> Option<String> {
        let universe = self.universe;
        let from_roots = self.root_keys.iter().cloned();
        let from_edges = self
            .selected
            .values()
            .filter_map(|&slot| universe.at(slot))
            .flat_map(|package| package.dependencies.iter().map(|edge| normalize_id(&edge.id)));

        from_roots
            .chain(from_edges)
            .find(|key| !self.selected.contains_key(key) && universe.has_id(key))
    }

    /// Constraints the requests themselves place on `key`
    fn root_requirements(&self, key: &str) -> Vec<Requirement<'a>> {
        let universe = self.universe;
        let mut requirements = Vec::new();

        for request in self.roots.iter().filter(|request| normalize_id(&request.id) == key) {
            requirements.push(Requirement::Root(request));
            if request.version_range.is_none() {
                let latest = universe
                    .slots_for(key)
                    .into_iter()
                    .filter_map(|slot| universe.at(slot))
                    .map(CandidatePackage::version)
                    .filter(|version| request.accepts(version))
                    .max();
                requirements.extend(latest.map(Requirement::Latest));
            }
        }

        requirements
    }

    /// Every constraint currently placed on `key`
    fn requirements(&self, key: &str) -> Vec<Requirement<'a>> {
        let universe = self.universe;
        let mut requirements = self.root_requirements(key);

        for &slot in self.selected.values() {
            let Some(package) = universe.at(slot) else {
                continue;
            };
            requirements.extend(
                package
                    .dependencies
                    .iter()
                    .filter(|edge| normalize_id(&edge.id) == key)
                    .map(|edge| Requirement::Edge {
                        range: &edge.range,
                        from: &package.identity,
                    }),
            );
        }

        requirements
    }

    /// An already selected id that `candidate`'s own edges reject
    fn clash(&self, candidate: &CandidatePackage) -> Option<String> {
        candidate.dependencies.iter().find_map(|edge| {
            let chosen = self.selected_package(&normalize_id(&edge.id))?;
            (!edge.range.satisfies(chosen.version())).then(|| chosen.id().to_string())
        })
    }

    /// Slots for `key` that fit every constraint, in policy order
    fn candidates(&mut self, key: &str, policy: DependencyBehavior) -> Vec<usize> {
        let universe = self.universe;
        let requirements = self.requirements(key);

        let mut in_range: Vec<(usize, &CandidatePackage)> = universe
            .slots_for(key)
            .into_iter()
            .filter_map(|slot| universe.at(slot).map(|package| (slot, package)))
            .filter(|(_, package)| requirements.iter().all(|r| r.admits(package.version())))
            .collect();

        match policy {
            DependencyBehavior::Lowest => in_range.sort_by(|a, b| a.1.version().cmp(b.1.version())),
            DependencyBehavior::Highest => in_range.sort_by(|a, b| b.1.version().cmp(a.1.version())),
        }

        let mut viable = Vec::with_capacity(in_range.len());
        let mut blocked_by = Vec::new();
        for (slot, package) in &in_range {
            match self.clash(package) {
                Some(other) => blocked_by.push(other),
                None => viable.push(*slot),
            }
        }

        if viable.is_empty() {
            if in_range.is_empty() {
                let display = self.display_id(key);
                self.conflicts.entry(key.to_string()).or_insert(display);
            } else {
                for other in blocked_by {
                    self.conflicts.entry(normalize_id(&other)).or_insert(other);
                }
            }
        }

        viable
    }

    fn display_id(&self, key: &str) -> String {
        self.universe
            .slots_for(key)
            .first()
            .and_then(|&slot| self.universe.at(slot))
            .map(|package| package.id().to_string())
            .unwrap_or_else(|| key.to_string())
    }

    /// "B: [1.0.0] (required by A.1.0.0), [2.0.0] (required by C.1.0.0)"
    fn describe_conflicts(&self) -> String {
        self.conflicts
            .iter()
            .map(|(key, display)| {
                let mut requirements: Vec<String> = self
                    .root_requirements(key)
                    .iter()
                    .map(ToString::to_string)
                    .collect();

                for package in self.universe.iter() {
                    requirements.extend(
                        package
                            .dependencies
                            .iter()
                            .filter(|edge| normalize_id(&edge.id) == *key)
                            .map(|edge| {
                                Requirement::Edge {
                                    range: &edge.range,
                                    from: &package.identity,
                                }
                                .to_string()
                            }),
                    );
                }

                format!("{}: {}", display, requirements.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn unsatisfiable(&self, details: String) -> NuloadError {
        NuloadError::Unsatisfiable {
            ids: self.conflicts.values().cloned().collect(),
            details,
        }
    }
}

/// Chooses one version per package id
#[derive(Debug, Clone)]
pub struct Resolver {
    policy: DependencyBehavior,
    step_limit: usize,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(DependencyBehavior::default())
    }
}

impl Resolver {
    pub fn new(policy: DependencyBehavior) -> Self {
        Self {
            policy,
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }

    /// Give up with `Unsatisfiable` after this many selections
    pub fn with_step_limit(mut self, step_limit: usize) -> Self {
        self.step_limit = step_limit.max(1);
        self
    }

    pub fn policy(&self) -> DependencyBehavior {
        self.policy
    }

    /// Select one candidate per id reachable from `roots`
    ///
    /// Edges to ids missing from the universe are ignored. The result is
    /// ordered dependencies first unless the selection has a cycle.
    pub fn resolve(&self, roots: &[PackageRequest], universe: &Universe) -> ResolverResult<ResolvedSet> {
        if let Some(missing) = roots.iter().find(|request| !universe.has_id(&request.id)) {
            return Err(NuloadError::PackageNotFound {
                id: missing.id.clone(),
                range: missing.range_display(),
            });
        }

        let mut search = Search::new(universe, roots);
        let mut frames: Vec<Frame> = Vec::new();
        let mut steps = 0usize;

        while let Some(key) = search.next_undecided() {
            let candidates = search.candidates(&key, self.policy);
            frames.push(Frame {
                key,
                candidates,
                next: 0,
            });

            // Select the next untried candidate, unwinding exhausted frames
            loop {
                let Some(frame) = frames.last_mut() else {
                    let details = search.describe_conflicts();
                    return Err(search.unsatisfiable(details));
                };

                if search.selected.last().map(|(k, _)| k) == Some(&frame.key) {
                    search.selected.pop();
                }

                match frame.candidates.get(frame.next).copied() {
                    Some(slot) => {
                        frame.next += 1;
                        steps += 1;
                        if steps > self.step_limit {
                            return Err(search.unsatisfiable(format!(
                                "gave up after trying {} candidate selections",
                                self.step_limit
                            )));
                        }
                        search.selected.insert(frame.key.clone(), slot);
                        if let Some(package) = universe.at(slot) {
                            debug!("Trying {}", package.identity);
                        }
                        break;
                    },
                    None => {
                        frames.pop();
                    },
                }
            }
        }

        let selection: Vec<CandidatePackage> = search
            .selected
            .values()
            .filter_map(|&slot| universe.at(slot).cloned())
            .collect();

        info!(
            "Resolved {} packages ({} policy, {} selections tried)",
            selection.len(),
            self.policy,
            steps
        );

        Ok(ResolvedSet::new(Self::order(selection)))
    }

    /// Dependencies first; selection order when the graph has a cycle
    fn order(selection: Vec<CandidatePackage>) -> Vec<CandidatePackage> {
        let graph = ResolvedGraph::new(selection.clone());
        match graph.dependency_order() {
            Ok(ordered) => ordered.into_iter().cloned().collect(),
            Err(cycle) => {
                warn!("{}; keeping selection order", cycle);
                selection
            },
        }
    }
}
