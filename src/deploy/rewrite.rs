//! Planning `install_name_tool` rewrites.
//!
//! Identities and references use the relocatable `@rpath` convention, with
//! one exception: a plain library reference that the OS can satisfy is
//! redirected to the absolute system path instead of a bundled copy.

use super::classify::{framework_tail, trailing_segments};
use super::locate::SearchPaths;
use crate::commands::{CommandQueue, PlannedCommand};
use std::path::Path;
use tracing::{debug, warn};

fn set_id(queue: &mut CommandQueue, target: &Path, name: &str) {
    debug!("fixing id of {} to @rpath/{name}", target.display());
    queue.push(PlannedCommand::SetId {
        id: format!("@rpath/{name}"),
        target: target.to_path_buf(),
    });
}

/// Plan the identity of a copied library: `@rpath/<basename>`.
pub(crate) fn fix_library_id(queue: &mut CommandQueue, library: &Path) {
    let name = library
        .file_name()
        .unwrap_or(library.as_os_str())
        .to_string_lossy();
    set_id(queue, library, &name);
}

/// Plan the identity of a copied plugin:
/// `@rpath/../PlugIns/<subdir>/<basename>`.
pub(crate) fn fix_plugin_id(queue: &mut CommandQueue, plugin: &Path) {
    let tail = trailing_segments(&plugin.to_string_lossy(), 2);
    set_id(queue, plugin, &format!("../PlugIns/{tail}"));
}

/// Plan the identity of a copied framework:
/// `@rpath/../Frameworks/<Name.framework/Versions/X/Name>`.
pub(crate) fn fix_framework_id(queue: &mut CommandQueue, framework: &Path, id: &str) {
    set_id(queue, framework, &format!("../Frameworks/{id}"));
}

/// Plan the rewrite of a plain library reference inside `binary`.
///
/// Prefers an existing system copy (absolute path) over the bundled one when
/// both could satisfy the reference.
pub(crate) fn fix_library_install_path(
    queue: &mut CommandQueue,
    search: &SearchPaths,
    reference: &str,
    binary: &Path,
) {
    let name = Path::new(reference)
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned();
    let new = match search.find_system_library(&name) {
        Some(system) => system.to_string_lossy().into_owned(),
        None => format!("@rpath/{name}"),
    };
    queue.push(PlannedCommand::ChangeInstallName {
        old: reference.to_string(),
        new,
        target: binary.to_path_buf(),
    });
}

/// Plan the rewrite of a framework reference inside `binary` to
/// `@rpath/../Frameworks/<from Name.framework onward>`.
pub(crate) fn fix_framework_install_path(
    queue: &mut CommandQueue,
    reference: &str,
    binary: &Path,
) {
    let Some(tail) = framework_tail(reference) else {
        warn!("no Name.framework component in {reference}, leaving the reference alone");
        return;
    };
    queue.push(PlannedCommand::ChangeInstallName {
        old: reference.to_string(),
        new: format!("@rpath/../Frameworks/{tail}"),
        target: binary.to_path_buf(),
    });
}
