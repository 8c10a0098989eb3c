//! The Qt side of the build environment: qmake queries and the required
//! plugin set.

use crate::deploy::DeployError;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// The Qt plugins every deployed bundle needs, as paths relative to the Qt
/// plugin directory. The subdirectory becomes the plugin's category under
/// `Contents/PlugIns`.
pub const QT_PLUGINS: &[&str] = &[
    "sqldrivers/libqsqlite.dylib",
    "platforms/libqcocoa.dylib",
    "imageformats/libqgif.dylib",
    "imageformats/libqico.dylib",
    "imageformats/libqicns.dylib",
    "imageformats/libqjpeg.dylib",
    "imageformats/libqsvg.dylib",
];

/// The install directories of the Qt installation the app was built against,
/// queried from its qmake once at startup.
#[derive(Debug, Clone)]
pub struct QtEnv {
    /// `QT_INSTALL_LIBS`: where Qt frameworks and libraries live.
    pub install_libs: PathBuf,
    /// `QT_INSTALL_PLUGINS`: where Qt plugins live.
    pub install_plugins: PathBuf,
}

impl QtEnv {
    /// Query the Qt installation behind `qmake`.
    pub fn discover(qmake: &Path) -> Result<Self, DeployError> {
        Ok(QtEnv {
            install_libs: query(qmake, "QT_INSTALL_LIBS")?,
            install_plugins: query(qmake, "QT_INSTALL_PLUGINS")?,
        })
    }

    /// The roots searched for Qt plugins, in priority order.
    pub fn plugin_roots(&self) -> Vec<PathBuf> {
        vec![self.install_plugins.clone()]
    }
}

/// `qmake -query <key>`, trimmed to the reported path.
fn query(qmake: &Path, key: &str) -> Result<PathBuf, DeployError> {
    let output = Command::new(qmake)
        .args(["-query", key])
        .output()
        .map_err(|err| DeployError::QmakeQuery {
            key: key.to_string(),
            reason: err.to_string(),
        })?;
    if !output.status.success() {
        return Err(DeployError::QmakeQuery {
            key: key.to_string(),
            reason: format!(
                "{}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }
    let path = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
    debug!("qmake -query {key} -> {path}");
    Ok(PathBuf::from(path))
}

/// Find a required plugin in the plugin search roots. Plugins are mandatory,
/// so an exhausted search is a hard failure.
pub fn find_qt_plugin(roots: &[PathBuf], name: &str) -> Result<PathBuf, DeployError> {
    for root in roots {
        if root.exists() {
            let candidate = root.join(name);
            if candidate.exists() {
                return Ok(candidate);
            }
        }
    }
    Err(DeployError::QtPluginNotFound(name.to_string()))
}
