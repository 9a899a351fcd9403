//! Dependency graph builder.
//!
//! Walks the registries from the requested roots and records every reachable
//! package version in a [`Universe`]. Lookups run concurrently on a
//! `JoinSet`; the loop that drains it is the only writer of the universe.

use dashmap::DashMap;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use nuload_core::error::NuloadError;
use nuload_core::types::normalize_id;
use nuload_core::{
    CandidatePackage, DependencyEdge, PackageIdentity, PackageRequest, TargetFramework, Version,
};
use nuload_registry::SourceSet;

use crate::host::HostEnvironment;
use crate::ResolverResult;

/// Default number of registry lookups in flight
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Every candidate discovered during one run; insert-only
#[derive(Debug, Default, Clone)]
pub struct Universe {
    packages: Vec<CandidatePackage>,
    index: HashMap<PackageIdentity, usize>,
}

impl Universe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a candidate; an identity already present keeps its first entry
    pub fn insert(&mut self, candidate: CandidatePackage) -> usize {
        if let Some(&existing) = self.index.get(&candidate.identity) {
            return existing;
        }

        let slot = self.packages.len();
        self.index.insert(candidate.identity.clone(), slot);
        self.packages.push(candidate);
        slot
    }

    pub fn contains(&self, identity: &PackageIdentity) -> bool {
        self.index.contains_key(identity)
    }

    pub fn get(&self, identity: &PackageIdentity) -> Option<&CandidatePackage> {
        self.index.get(identity).map(|&slot| &self.packages[slot])
    }

    /// Candidate by arena slot
    pub fn at(&self, slot: usize) -> Option<&CandidatePackage> {
        self.packages.get(slot)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CandidatePackage> {
        self.packages.iter()
    }

    /// Arena slots of every version of `id`, in discovery order
    pub fn slots_for(&self, id: &str) -> Vec<usize> {
        self.packages
            .iter()
            .enumerate()
            .filter(|(_, p)| p.identity.has_id(id))
            .map(|(slot, _)| slot)
            .collect()
    }

    pub fn has_id(&self, id: &str) -> bool {
        self.packages.iter().any(|p| p.identity.has_id(id))
    }
}

/// Outcome of one registry lookup
enum Lookup {
    Found {
        candidate: CandidatePackage,
        children: Vec<PackageIdentity>,
    },
    Missing {
        identity: PackageIdentity,
        is_root: bool,
    },
}

/// State shared with lookup tasks
#[derive(Debug)]
struct Shared {
    sources: SourceSet,
    host: HostEnvironment,
    /// Merged version listings by lowercase id
    versions: DashMap<String, Arc<Vec<Version>>>,
}

/// Builds the candidate universe for a set of requests
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    shared: Arc<Shared>,
    framework: TargetFramework,
    concurrency: usize,
}

impl GraphBuilder {
    pub fn new(sources: SourceSet, host: HostEnvironment, framework: TargetFramework) -> Self {
        Self {
            shared: Arc::new(Shared {
                sources,
                host,
                versions: DashMap::new(),
            }),
            framework,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Limit the number of concurrent lookups (minimum 1)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn framework(&self) -> &TargetFramework {
        &self.framework
    }

    /// Resolve roots and gather everything reachable from them
    pub async fn gather(
        &self,
        requests: &[PackageRequest],
        cancel: &CancellationToken,
    ) -> ResolverResult<Universe> {
        let roots = self.resolve_roots(requests, cancel).await?;
        let mut universe = Universe::new();
        let framework = self.framework.clone();

        self.expand_all(roots, &framework, &mut universe, cancel).await?;

        info!("Gathered {} candidate packages", universe.len());
        Ok(universe)
    }

    /// Concrete root identities for each request
    ///
    /// The first source listing a matching version wins. With a range, every
    /// satisfying version is a root candidate; without one, only the latest.
    pub async fn resolve_roots(
        &self,
        requests: &[PackageRequest],
        cancel: &CancellationToken,
    ) -> ResolverResult<Vec<PackageIdentity>> {
        let mut roots = Vec::new();

        for request in requests {
            let found = self
                .shared
                .sources
                .first_matching(&request.id, |v| request.accepts(v), cancel)
                .await?;

            let Some((origin, mut versions)) = found else {
                return Err(NuloadError::PackageNotFound {
                    id: request.id.clone(),
                    range: request.range_display(),
                });
            };

            versions.sort();
            versions.dedup();
            if request.version_range.is_none() {
                versions = versions.pop().into_iter().collect();
            }

            debug!(
                "{} ({}) has {} root candidates at {}",
                request.id,
                request.range_display(),
                versions.len(),
                origin
            );
            roots.extend(
                versions
                    .into_iter()
                    .map(|v| PackageIdentity::new(request.id.clone(), v)),
            );
        }

        Ok(roots)
    }

    /// Record `root` and everything reachable from it in `universe`
    ///
    /// Identities already in the universe are skipped, so expanding a
    /// populated universe again changes nothing.
    pub async fn expand(
        &self,
        root: &PackageIdentity,
        framework: &TargetFramework,
        universe: &mut Universe,
        cancel: &CancellationToken,
    ) -> ResolverResult<()> {
        self.expand_all(vec![root.clone()], framework, universe, cancel)
            .await
    }

    async fn expand_all(
        &self,
        roots: Vec<PackageIdentity>,
        framework: &TargetFramework,
        universe: &mut Universe,
        cancel: &CancellationToken,
    ) -> ResolverResult<()> {
        let mut queue: VecDeque<(PackageIdentity, bool)> =
            roots.into_iter().map(|root| (root, true)).collect();
        let mut claimed: HashSet<PackageIdentity> = HashSet::new();
        let mut tasks: JoinSet<ResolverResult<Lookup>> = JoinSet::new();

        loop {
            while tasks.len() < self.concurrency {
                let Some((identity, is_root)) = queue.pop_front() else {
                    break;
                };
                if universe.contains(&identity) || !claimed.insert(identity.clone()) {
                    continue;
                }

                tasks.spawn(lookup(
                    Arc::clone(&self.shared),
                    identity,
                    is_root,
                    framework.clone(),
                    cancel.clone(),
                ));
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };

            // Returning early drops the JoinSet, which aborts the remaining lookups
            let lookup = joined.map_err(|e| NuloadError::Internal {
                message: format!("dependency lookup task failed: {}", e),
            })??;

            match lookup {
                Lookup::Found {
                    candidate,
                    children,
                } => {
                    debug!(
                        "{} from {} with {} dependencies",
                        candidate.identity,
                        candidate.origin,
                        candidate.dependencies.len()
                    );
                    universe.insert(candidate);
                    queue.extend(children.into_iter().map(|child| (child, false)));
                },
                Lookup::Missing { identity, is_root } if is_root => {
                    return Err(NuloadError::PackageNotFound {
                        id: identity.id.clone(),
                        range: format!("[{}]", identity.version),
                    });
                },
                Lookup::Missing { identity, .. } => {
                    warn!("{} was not found at any source; skipping its dependencies", identity);
                },
            }
        }

        Ok(())
    }
}

/// Query one identity and map its edges to the identities to visit next
async fn lookup(
    shared: Arc<Shared>,
    identity: PackageIdentity,
    is_root: bool,
    framework: TargetFramework,
    cancel: CancellationToken,
) -> ResolverResult<Lookup> {
    let found = shared
        .sources
        .dependency_info(&identity, &framework, &cancel)
        .await?;

    let Some((origin, info)) = found else {
        return Ok(Lookup::Missing { identity, is_root });
    };

    let edges = shared.host.filter_edges(info.dependencies);

    let mut children = Vec::with_capacity(edges.len());
    for edge in &edges {
        match minimal_identity(&shared, edge, &cancel).await? {
            Some(child) => children.push(child),
            None => warn!(
                "No listed version of {} satisfies {} (required by {})",
                edge.id, edge.range, identity
            ),
        }
    }

    Ok(Lookup::Found {
        candidate: CandidatePackage {
            identity: info.identity,
            dependencies: edges,
            origin,
            content: info.content,
        },
        children,
    })
}

/// The lowest listed version of `edge.id` inside `edge.range`
///
/// Prereleases are only considered when the range names one or when no
/// stable version fits.
async fn minimal_identity(
    shared: &Shared,
    edge: &DependencyEdge,
    cancel: &CancellationToken,
) -> ResolverResult<Option<PackageIdentity>> {
    let key = normalize_id(&edge.id);
    let cached = shared.versions.get(&key).map(|entry| Arc::clone(entry.value()));

    let versions = match cached {
        Some(versions) => versions,
        None => {
            let listed = Arc::new(shared.sources.all_versions(&edge.id, cancel).await?);
            shared.versions.insert(key, Arc::clone(&listed));
            listed
        },
    };

    let chosen = edge
        .range
        .lowest_match(versions.iter(), edge.range.allows_prerelease())
        .or_else(|| edge.range.lowest_match(versions.iter(), true));

    Ok(chosen.map(|version| PackageIdentity::new(edge.id.clone(), version.clone())))
}
