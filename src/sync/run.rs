//! One sync pass over every dependent repository
//!
//! Setup (manifest aggregation, source identity) fails the run. After that,
//! targets are processed strictly one after another and their failures stay
//! inside their [`TargetReport`].

use std::path::Path;
use std::sync::Arc;

use tracing::{info, instrument, warn};

use super::{Conventions, SyncOrchestrator, SyncSettings, TargetOutcome, TargetReport};
use crate::config::Config;
use crate::error::Result;
use crate::git::{Vcs, WorkingCopy};
use crate::manifest::{self, InvalidManifestPolicy, TargetMap};
use crate::mirror::Mirror;
use crate::report::{Severity, emit};
use crate::review::ReviewApi;
use crate::target::{self, ResolvedTarget};

/// Range inspected for changed package paths
const CHANGE_RANGE: &str = "HEAD^..HEAD";

/// Result of one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub reports: Vec<TargetReport>,
}

impl RunSummary {
    pub fn synced(&self) -> usize {
        self.count(|o| matches!(o, TargetOutcome::Synced { .. }))
    }

    pub fn clean(&self) -> usize {
        self.count(|o| matches!(o, TargetOutcome::Clean))
    }

    pub fn failed(&self) -> usize {
        self.count(TargetOutcome::is_failure)
    }

    fn count(&self, pred: impl Fn(&TargetOutcome) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Aggregate manifests under the configured root
pub fn load_targets(config: &Config) -> Result<TargetMap> {
    let policy = if config.skip_invalid_manifests {
        InvalidManifestPolicy::Skip
    } else {
        InvalidManifestPolicy::Fail
    };
    manifest::aggregate(&config.manifest_search_root(), policy, config.dedupe_paths)
}

/// Resolve targets without touching any remote
pub fn plan(config: &Config) -> Result<Vec<ResolvedTarget>> {
    let map = load_targets(config)?;
    Ok(target::resolve(&map, &config.source_url()?))
}

/// Wires configuration and collaborators into one sync pass
pub struct SyncRun {
    config: Config,
    vcs: Arc<dyn Vcs>,
    review: Arc<dyn ReviewApi>,
    mirror: Arc<dyn Mirror>,
}

impl SyncRun {
    pub fn new(
        config: Config,
        vcs: Arc<dyn Vcs>,
        review: Arc<dyn ReviewApi>,
        mirror: Arc<dyn Mirror>,
    ) -> Self {
        Self {
            config,
            vcs,
            review,
            mirror,
        }
    }

    #[instrument(skip_all)]
    pub async fn execute(&self) -> Result<RunSummary> {
        let config = &self.config;
        let (_, source_name) = config.source_identity()?;
        let source_url = config.source_url()?;
        let settings = SyncSettings::from_config(config)?;

        let map = load_targets(config)?;
        emit(Severity::Info, format!("Package paths: {}", map.all_paths().join(", ")));
        emit(
            Severity::Info,
            format!(
                "Dependent repos: {}",
                map.iter().map(|e| e.url.as_str()).collect::<Vec<_>>().join(", ")
            ),
        );

        let source = self.vcs.open(&config.source_dir).await?;
        self.vcs
            .configure_identity(
                &source,
                &config.username,
                &config.email,
                config.identity_scope,
            )
            .await?;

        self.report_changes(&source, &map).await;

        let targets = target::resolve(&map, &source_url);
        if targets.is_empty() {
            emit(Severity::Info, "No dependent repositories to sync");
        }

        let orchestrator = SyncOrchestrator::new(
            Arc::clone(&self.vcs),
            Arc::clone(&self.review),
            Arc::clone(&self.mirror),
            settings,
            Conventions::new(source_name),
        );

        let mut summary = RunSummary::default();
        for target in &targets {
            let report = orchestrator.sync_target(target).await;
            summary.reports.push(report);
        }

        info!(
            "Sync finished: {} synced, {} clean, {} failed",
            summary.synced(),
            summary.clean(),
            summary.failed()
        );
        Ok(summary)
    }

    /// Log which package paths changed in the latest source commit
    async fn report_changes(&self, source: &WorkingCopy, map: &TargetMap) {
        let commits = match self.vcs.log(source).await {
            Ok(log) => log.total_commit_count,
            Err(e) => {
                warn!("Cannot read source history: {}", e);
                return;
            }
        };
        if commits < 2 {
            info!("Source has {} commit(s), skipping change detection", commits);
            return;
        }

        let changed = match self.vcs.diff(source, CHANGE_RANGE).await {
            Ok(changed) => changed,
            Err(e) => {
                warn!("Cannot diff source repository: {}", e);
                return;
            }
        };

        let (touched, untouched) = split_by_changes(&map.all_paths(), &changed);
        for path in touched {
            emit(Severity::Info, format!("Changes detected in package at {}", path));
        }
        for path in untouched {
            emit(Severity::Info, format!("No changes detected in {}", path));
        }
    }
}

/// Partition package paths into those containing a changed file and the rest
pub fn split_by_changes<'a>(
    paths: &[&'a str],
    changed: &[String],
) -> (Vec<&'a str>, Vec<&'a str>) {
    paths
        .iter()
        .copied()
        .partition(|path| changed.iter().any(|file| Path::new(file).starts_with(path)))
}
