//! Depth-first walk of the dependency closure.

use super::DeployError;
use super::classify::{BrokenDeps, broken_dependencies, trailing_segments};
use super::inspect::BinaryInspector;
use super::locate::SearchPaths;
use super::{copy, rewrite};
use crate::bundle::Bundle;
use crate::commands::{CommandQueue, PlannedCommand};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};

/// Walks the dependency closure of a bundle's binaries and plans every copy
/// and rewrite into its command queue.
///
/// All state of a run is owned here: the fixed set that guarantees each
/// library and framework is copied at most once, and the queue the plan
/// accumulates into. Dependencies are always fixed before their dependents,
/// and a reference is marked fixed on entry — before it is even resolved —
/// so that libraries depending on each other cannot recurse forever.
pub struct Deployer<'a> {
    bundle: &'a Bundle,
    search: &'a SearchPaths,
    inspector: &'a dyn BinaryInspector,
    fixed: HashSet<String>,
    queue: CommandQueue,
}

impl<'a> Deployer<'a> {
    /// A deployer with an empty plan.
    pub fn new(
        bundle: &'a Bundle,
        search: &'a SearchPaths,
        inspector: &'a dyn BinaryInspector,
    ) -> Self {
        Deployer {
            bundle,
            search,
            inspector,
            fixed: HashSet::new(),
            queue: CommandQueue::new(),
        }
    }

    /// The plan accumulated so far.
    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    /// Finish planning and hand over the queue for replay.
    pub fn into_queue(self) -> CommandQueue {
        self.queue
    }

    /// Queue the idempotent creation of the bundle subdirectories every later
    /// command relies on.
    pub fn stage_skeleton(&mut self) {
        for dir in [
            self.bundle.frameworks_dir(),
            self.bundle.resources_dir(),
            self.bundle.plugins_dir(),
        ] {
            self.queue.push(PlannedCommand::MkDir(dir.to_path_buf()));
        }
    }

    /// Fix a top-level executable in place: resolve its broken dependencies,
    /// then rewrite its references to point at their fixed locations. The
    /// executable itself is neither copied nor given a new identity.
    pub fn fix_binary(&mut self, binary: &Path) -> Result<(), DeployError> {
        println!("🔧 Fixing {}", binary.display());
        let broken = broken_dependencies(self.inspector, self.bundle, binary)?;
        self.fix_all(&broken)?;
        self.rewrite_references(&broken, binary);
        Ok(())
    }

    /// Fix a Qt plugin: resolve its dependencies, copy it under
    /// `PlugIns/<subdir>/`, rewrite its identity and its references.
    pub fn fix_plugin(&mut self, plugin: &Path, subdir: &str) -> Result<(), DeployError> {
        println!("🔌 Fixing plugin {}", plugin.display());
        let broken = broken_dependencies(self.inspector, self.bundle, plugin)?;
        self.fix_all(&broken)?;
        let staged = copy::stage_plugin(&mut self.queue, self.bundle, plugin, subdir);
        rewrite::fix_plugin_id(&mut self.queue, &staged);
        self.rewrite_references(&broken, &staged);
        Ok(())
    }

    /// Fix every broken dependency of one binary, frameworks first.
    fn fix_all(&mut self, broken: &BrokenDeps) -> Result<(), DeployError> {
        for framework in &broken.frameworks {
            self.fix_framework(framework)?;
        }
        for lib in &broken.libs {
            self.fix_library(lib)?;
        }
        Ok(())
    }

    /// Fix one framework reference. Frameworks are mandatory: an unresolvable
    /// reference aborts the run (with nothing executed yet).
    fn fix_framework(&mut self, reference: &str) -> Result<(), DeployError> {
        // copy/identity happen at most once per original reference string;
        // the caller still rewrites its own reference afterwards
        if !self.fixed.insert(reference.to_string()) {
            return Ok(());
        }
        let resolved = self.search.locate_framework(reference)?;
        let broken = broken_dependencies(self.inspector, self.bundle, &resolved)?;
        self.fix_all(&broken)?;

        let Some(staged) = copy::stage_framework(&mut self.queue, self.bundle, &resolved)? else {
            // already staged by an earlier run or reference form
            return Ok(());
        };
        let id = trailing_segments(&staged.to_string_lossy(), 4);
        rewrite::fix_framework_id(&mut self.queue, &staged, &id);
        self.rewrite_references(&broken, &staged);
        Ok(())
    }

    /// Fix one plain library reference. Libraries degrade gracefully: one
    /// that cannot be located is logged and left unresolved.
    fn fix_library(&mut self, reference: &str) -> Result<(), DeployError> {
        if self.fixed.contains(reference) {
            return Ok(());
        }
        let name = Path::new(reference)
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .into_owned();
        // a same-named system library satisfies the reference without copying;
        // the rewrite step will point at it
        if self.search.find_system_library(&name).is_some() {
            debug!("{reference} is system provided, not copying");
            return Ok(());
        }
        self.fixed.insert(reference.to_string());
        let Some(resolved) = self.search.locate_library(reference) else {
            warn!("could not resolve {reference}");
            eprintln!("⚠️  Could not resolve {reference}, not fixing");
            return Ok(());
        };
        let broken = broken_dependencies(self.inspector, self.bundle, &resolved)?;
        self.fix_all(&broken)?;

        let staged = copy::stage_library(&mut self.queue, self.bundle, &resolved);
        rewrite::fix_library_id(&mut self.queue, &staged);
        self.rewrite_references(&broken, &staged);
        Ok(())
    }

    /// Rewrite, in `binary`, every reference it had classified as broken,
    /// pointing it at the dependency's fixed location.
    fn rewrite_references(&mut self, broken: &BrokenDeps, binary: &Path) {
        for framework in &broken.frameworks {
            rewrite::fix_framework_install_path(&mut self.queue, framework, binary);
        }
        for lib in &broken.libs {
            rewrite::fix_library_install_path(&mut self.queue, self.search, lib, binary);
        }
    }
}
