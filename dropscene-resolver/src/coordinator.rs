//! Drives one drop through the whole pipeline: walk, materialize, rewrite, deliver.
//!
//! A [`ResolutionCoordinator`] is a small state machine whose current [`Phase`] can be observed
//! through a watch channel. Every call to [`ResolutionCoordinator::resolve`] starts a new
//! generation. A newer drop makes every older resolution stale: a stale resolution stops at its
//! next phase transition and can never be delivered, so it cannot overwrite what the newer drop
//! produced.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use itertools::Itertools;
use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::watch;

use crate::ResolverError;
use crate::entry::walker::{self, WalkOptions};
use crate::entry::{DirectoryHandle, EntryOf};
use crate::manifest::Manifest;
use crate::materializer::{self, MaterializedResource};
use crate::report::{MaterializationFailure, ResolutionReport};
use crate::resource::{HandleAllocator, ResourceHandle, ResourceIndex};
use crate::rewriter;
use crate::role::ResourceRole;
use crate::scene::ResolvedScene;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Phase {
    Idle,
    Walking,
    Materializing,
    Rewriting,
    /// A manifest was resolved.
    Ready,
    /// A self-contained package was loaded, no rewriting necessary.
    PackageReady,
    /// The drop contained neither a loadable manifest nor a package.
    NothingToLoad,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Phase::Ready | Phase::PackageReady | Phase::NothingToLoad
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PhaseUpdate {
    pub generation: u64,
    pub phase: Phase,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResolverOptions {
    pub walk: WalkOptions,
}

#[derive(Debug)]
pub enum ResolutionOutcome {
    Scene(ResolvedScene),
    Package(ResourceHandle),
    NothingToLoad,
}

#[derive(Debug)]
pub struct Resolution {
    pub generation: u64,
    pub outcome: ResolutionOutcome,
    pub report: ResolutionReport,
    /// Every phase this resolution published, in order.
    pub trail: Vec<Phase>,
}

impl Resolution {
    pub fn phase(&self) -> Phase {
        match self.outcome {
            ResolutionOutcome::Scene(_) => Phase::Ready,
            ResolutionOutcome::Package(_) => Phase::PackageReady,
            ResolutionOutcome::NothingToLoad => Phase::NothingToLoad,
        }
    }
}

/// The consumer of a resolution, typically a glTF parser feeding a renderer.
pub trait SceneParser {
    type Output;

    /// Entry point for a manifest whose references now point at the scene's resources.
    fn parse_manifest(&mut self, scene: &ResolvedScene) -> Result<Self::Output, ResolverError>;

    /// Entry point for the raw bytes of a self-contained package.
    fn parse_package(&mut self, package: &ResourceHandle) -> Result<Self::Output, ResolverError>;
}

/// Cloning yields another handle onto the same state machine.
#[derive(Clone)]
pub struct ResolutionCoordinator {
    options: ResolverOptions,
    generation: Arc<AtomicU64>,
    phase: Arc<watch::Sender<PhaseUpdate>>,
}

impl Default for ResolutionCoordinator {
    fn default() -> Self {
        Self::new(ResolverOptions::default())
    }
}

impl ResolutionCoordinator {
    pub fn new(options: ResolverOptions) -> Self {
        let (phase, _) = watch::channel(PhaseUpdate {
            generation: 0,
            phase: Phase::Idle,
        });

        Self {
            options,
            generation: Arc::new(AtomicU64::new(0)),
            phase: Arc::new(phase),
        }
    }

    pub fn phase(&self) -> PhaseUpdate {
        *self.phase.borrow()
    }

    /// Observe phase transitions. Only transitions of the current generation are ever published.
    pub fn subscribe(&self) -> watch::Receiver<PhaseUpdate> {
        self.phase.subscribe()
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.current_generation() == generation
    }

    /// Resolves one drop. Starting a resolution invalidates all resolutions still in flight.
    ///
    /// Per-file failures never fail the resolution, they end up in the report. The only error is
    /// [`ResolverError::Superseded`], when another drop started before this one finished.
    pub async fn resolve<D: DirectoryHandle>(&self, entries: Vec<EntryOf<D>>) -> Result<Resolution, ResolverError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!("Resolving drop #{} ({} entries)", generation, entries.len());
        let mut trail = Vec::new();
        self.transition(generation, Phase::Idle, &mut trail)?;

        let mut report = ResolutionReport::default();

        self.transition(generation, Phase::Walking, &mut trail)?;
        let walk = walker::expand::<D>(entries, self.options.walk).await;
        report.enumeration_failures = walk.failures;
        report.collisions = walk.collisions;
        debug!("Drop #{} contains {} files", generation, walk.files.len());

        self.transition(generation, Phase::Materializing, &mut trail)?;
        let allocator = Arc::new(HandleAllocator::new(generation));
        let batch = materializer::materialize_all(walk.files, allocator).await;
        report.materialization_failures = batch.failures;
        report.ignored = batch.ignored;

        let mut index = ResourceIndex::default();
        let mut manifests = Vec::new();
        let mut packages = Vec::new();
        for resource in batch.resources {
            match resource {
                MaterializedResource::Manifest { name, path, text } => manifests.push((name, path, text)),
                MaterializedResource::Buffer(handle) => {
                    index.insert_buffer(handle);
                }
                MaterializedResource::Image(handle) => {
                    index.insert_image(handle);
                }
                MaterializedResource::Package(handle) => packages.push(handle),
            }
        }

        // The batch is ordered by name, so the first manifest that parses is the scene root.
        let mut root = None;
        for (name, path, text) in manifests {
            if root.is_some() {
                report.skipped_roots.push(name);
                continue;
            }

            match Manifest::parse(&text) {
                Ok(manifest) => root = Some((name, manifest)),
                Err(err) => {
                    warn!("Manifest {} is not valid JSON: {}", name, err);
                    report.materialization_failures.push(MaterializationFailure {
                        name,
                        path,
                        role: ResourceRole::Manifest,
                        reason: err.to_string(),
                    });
                }
            }
        }

        if let Some((name, manifest)) = root {
            report
                .skipped_roots
                .extend(packages.iter().map(|package| package.name().to_string()));

            self.transition(generation, Phase::Rewriting, &mut trail)?;
            let (scene, unresolved) = rewriter::rewrite(manifest, index);
            report.unresolved_references = unresolved;

            self.finish(generation, Phase::Ready, &report, &mut trail)?;
            info!("Drop #{}: resolved {}", generation, name);
            return Ok(Resolution {
                generation,
                outcome: ResolutionOutcome::Scene(scene),
                report,
                trail,
            });
        }

        let mut packages = packages.into_iter();
        if let Some(package) = packages.next() {
            report
                .skipped_roots
                .extend(packages.map(|package| package.name().to_string()));
            if !index.is_empty() {
                debug!(
                    "Drop #{}: {} loose resources are not used by package {}",
                    generation,
                    index.len(),
                    package.name()
                );
            }

            self.finish(generation, Phase::PackageReady, &report, &mut trail)?;
            info!("Drop #{}: loaded package {}", generation, package.name());
            return Ok(Resolution {
                generation,
                outcome: ResolutionOutcome::Package(package),
                report,
                trail,
            });
        }

        self.finish(generation, Phase::NothingToLoad, &report, &mut trail)?;
        warn!("Drop #{} contained nothing to load (no .gltf or .glb file)", generation);
        Ok(Resolution {
            generation,
            outcome: ResolutionOutcome::NothingToLoad,
            report,
            trail,
        })
    }

    /// Hands a resolution to the scene parser, unless a newer drop has started in the meantime.
    ///
    /// Returns `None` for a drop that had nothing to load.
    pub fn deliver<P: SceneParser>(
        &self,
        resolution: &Resolution,
        parser: &mut P,
    ) -> Result<Option<P::Output>, ResolverError> {
        self.ensure_current(resolution.generation)?;

        match &resolution.outcome {
            ResolutionOutcome::Scene(scene) => parser.parse_manifest(scene).map(Some),
            ResolutionOutcome::Package(package) => parser.parse_package(package).map(Some),
            ResolutionOutcome::NothingToLoad => Ok(None),
        }
    }

    fn finish(
        &self,
        generation: u64,
        phase: Phase,
        report: &ResolutionReport,
        trail: &mut Vec<Phase>,
    ) -> Result<(), ResolverError> {
        if !report.is_clean() {
            warn!(
                "Drop #{} had problems: {} unlisted directories, failed files [{}], missing references [{}]",
                generation,
                report.enumeration_failures.len(),
                report.failed_files().join(", "),
                report.unresolved_uris().join(", ")
            );
        }
        self.transition(generation, phase, trail)
    }

    /// Publishes `phase`, unless `generation` is stale. The check happens while the channel is
    /// locked, so a newer drop can never be overwritten by an older one.
    fn transition(&self, generation: u64, phase: Phase, trail: &mut Vec<Phase>) -> Result<(), ResolverError> {
        let mut current = generation;
        self.phase.send_if_modified(|update| {
            current = self.current_generation();
            if current != generation {
                return false;
            }
            *update = PhaseUpdate { generation, phase };
            true
        });

        if current != generation {
            debug!("Drop #{} is stale, #{} is current", generation, current);
            return Err(ResolverError::Superseded { generation, current });
        }

        debug!("Drop #{}: {:?}", generation, phase);
        trail.push(phase);
        Ok(())
    }

    fn ensure_current(&self, generation: u64) -> Result<(), ResolverError> {
        let current = self.current_generation();
        if current != generation {
            debug!("Drop #{} is stale, #{} is current", generation, current);
            return Err(ResolverError::Superseded { generation, current });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
