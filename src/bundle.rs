//! The fixed directory layout of a macOS `.app` bundle.

use anyhow::{Context, Result};
use fs_err as fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Content of the `qt.conf` written into `Contents/Resources`, pointing the
/// Qt plugin search path at the bundled copies.
const QT_CONF: &str = "[Paths]\nPlugins = PlugIns\n";

/// A macOS application bundle and its well-known subdirectories.
///
/// Only `Contents/MacOS` has to exist up front (it holds the executables being
/// fixed); the other directories are created idempotently by the first queued
/// commands of a deployment run.
#[derive(Debug, Clone)]
pub struct Bundle {
    root: PathBuf,
    macos_dir: PathBuf,
    frameworks_dir: PathBuf,
    resources_dir: PathBuf,
    plugins_dir: PathBuf,
}

impl Bundle {
    /// Derive the bundle layout from the `.app` root directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let contents = root.join("Contents");
        Bundle {
            macos_dir: contents.join("MacOS"),
            frameworks_dir: contents.join("Frameworks"),
            resources_dir: contents.join("Resources"),
            plugins_dir: contents.join("PlugIns"),
            root,
        }
    }

    /// The `.app` root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `Contents/MacOS`: the executables, and the destination for copied-in
    /// plain dylibs.
    pub fn macos_dir(&self) -> &Path {
        &self.macos_dir
    }

    /// `Contents/Frameworks`: copied frameworks with their full
    /// version-directory and symlink topology.
    pub fn frameworks_dir(&self) -> &Path {
        &self.frameworks_dir
    }

    /// `Contents/Resources`: receives `qt.conf`.
    pub fn resources_dir(&self) -> &Path {
        &self.resources_dir
    }

    /// `Contents/PlugIns`: copied Qt plugins, one subdirectory per category.
    pub fn plugins_dir(&self) -> &Path {
        &self.plugins_dir
    }

    /// All executables in `Contents/MacOS`: regular files with an execute bit.
    pub fn executables(&self) -> Result<Vec<PathBuf>> {
        let mut executables = Vec::new();
        for entry in fs::read_dir(&self.macos_dir)? {
            let path = entry?.path();
            let metadata = fs::metadata(&path)?;
            if metadata.is_file() && metadata.permissions().mode() & 0o111 != 0 {
                executables.push(path);
            }
        }
        executables.sort();
        Ok(executables)
    }

    /// Write `Contents/Resources/qt.conf`, unconditionally, so the deployed
    /// app loads plugins from `PlugIns` instead of the Qt installation.
    pub fn write_qt_conf(&self) -> Result<()> {
        println!("Writing qt.conf...");
        let path = self.resources_dir.join("qt.conf");
        fs::write(&path, QT_CONF).with_context(|| format!("failed to write {}", path.display()))
    }
}
