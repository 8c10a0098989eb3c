//! Staging copies of resolved dependencies into the bundle.
//!
//! These functions only plan: they append copy commands to the queue and
//! return the destination path the dependency will have once the queue runs.

use super::DeployError;
use super::classify::is_framework_component;
use crate::bundle::Bundle;
use crate::commands::{CommandQueue, PlannedCommand};
use std::path::{Path, PathBuf};
use tracing::debug;

fn file_name(path: &Path) -> PathBuf {
    PathBuf::from(path.file_name().unwrap_or(path.as_os_str()))
}

/// Stage a plain library next to the executables.
pub(crate) fn stage_library(queue: &mut CommandQueue, bundle: &Bundle, src: &Path) -> PathBuf {
    let dst = bundle.macos_dir().join(file_name(src));
    queue.push(PlannedCommand::CopyDual {
        src: src.to_path_buf(),
        dst: dst.clone(),
    });
    queue.push(PlannedCommand::MakeWritable(dst.clone()));
    dst
}

/// Stage a Qt plugin under `Contents/PlugIns/<subdir>/`.
pub(crate) fn stage_plugin(
    queue: &mut CommandQueue,
    bundle: &Bundle,
    src: &Path,
    subdir: &str,
) -> PathBuf {
    let dst = bundle.plugins_dir().join(subdir).join(file_name(src));
    queue.push(PlannedCommand::MkDir(
        dst.parent().map(Path::to_path_buf).unwrap_or_default(),
    ));
    queue.push(PlannedCommand::CopyDual {
        src: src.to_path_buf(),
        dst: dst.clone(),
    });
    queue.push(PlannedCommand::MakeWritable(dst.clone()));
    dst
}

/// Stage a framework, reproducing the canonical framework bundle topology.
///
/// The destination mirrors every path segment from the `Name.framework` root
/// of `src` down to (but excluding) the framework binary; omitting any of the
/// `Current`/root-level symlinks breaks runtime loading. Returns `Ok(None)`
/// when the destination version directory already exists — framework version
/// directories are shared, so a second reference to the same framework is a
/// no-op.
pub(crate) fn stage_framework(
    queue: &mut CommandQueue,
    bundle: &Bundle,
    src: &Path,
) -> Result<Option<PathBuf>, DeployError> {
    debug!("staging framework from {}", src.display());
    let text = src.to_string_lossy();
    let parts: Vec<&str> = text.split('/').collect();
    let Some(root) = parts.iter().position(|part| is_framework_component(part)) else {
        return Err(DeployError::NotAFramework(src.to_path_buf()));
    };
    // need at least Name.framework/<...>/<binary>
    if parts.len() < root + 2 {
        return Err(DeployError::NotAFramework(src.to_path_buf()));
    }
    let framework = parts[root];
    let binary_name = parts[parts.len() - 1];
    let version = parts[parts.len() - 2];

    let mut version_dir = bundle.frameworks_dir().to_path_buf();
    for part in &parts[root..parts.len() - 1] {
        version_dir.push(part);
    }
    if version_dir.exists() {
        return Ok(None);
    }

    queue.push(PlannedCommand::MkDir(version_dir.clone()));
    queue.push(PlannedCommand::CopyDual {
        src: src.to_path_buf(),
        dst: version_dir.clone(),
    });
    queue.push(PlannedCommand::MakeWritable(version_dir.join(binary_name)));
    // Name.framework/Name -> Versions/Current/Name
    queue.push(PlannedCommand::Symlink {
        target: Path::new("Versions/Current").join(binary_name),
        link: version_dir.join("../..").join(binary_name),
    });
    // Versions/Current -> the concrete version directory
    queue.push(PlannedCommand::Symlink {
        target: PathBuf::from(version),
        link: version_dir.join("..").join("Current"),
    });

    let info_plist = src
        .parent()
        .map(|dir| dir.join("Resources").join("Info.plist"));
    if let Some(info_plist) = info_plist.filter(|plist| plist.exists()) {
        let resources = bundle
            .frameworks_dir()
            .join(framework)
            .join("Versions/Current/Resources");
        queue.push(PlannedCommand::MkDir(resources.clone()));
        queue.push(PlannedCommand::MakeWritable(resources.clone()));
        queue.push(PlannedCommand::CopyFile {
            src: info_plist,
            dst: resources,
        });
        queue.push(PlannedCommand::Symlink {
            target: PathBuf::from("Versions/Current/Resources"),
            link: version_dir.join("../..").join("Resources"),
        });
    }

    Ok(Some(version_dir.join(binary_name)))
}
