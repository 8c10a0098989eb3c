//! The dependency closure resolver.
//!
//! [broken_dependencies] classifies every linked path of a binary,
//! [SearchPaths] finds the real file behind a broken reference, and
//! [Deployer] walks the closure depth-first, planning copies and rewrites
//! into the command queue.

mod classify;
mod copy;
mod inspect;
mod locate;
mod rewrite;
mod walker;

pub use classify::{BrokenDeps, LinkedPath, broken_dependencies, parse_linked_path};
pub use inspect::{BinaryInspector, Otool};
pub use locate::SearchPaths;
pub use walker::Deployer;

use std::path::PathBuf;
use thiserror::Error;

/// Failures that abort a deployment run.
///
/// Only mandatory resources are represented here: a plain library that cannot
/// be located is a logged warning, not an error (the app may load fine
/// without it), whereas a missing framework or Qt plugin makes the deployed
/// bundle unusable.
#[derive(Debug, Error)]
pub enum DeployError {
    /// A framework reference could not be resolved in any search location.
    #[error("could not find framework {0} in any search location")]
    FrameworkNotFound(String),
    /// A required Qt plugin is missing from the Qt installation.
    #[error("could not find required Qt plugin {0}")]
    QtPluginNotFound(String),
    /// `qmake -query` could not be run or exited non-zero.
    #[error("qmake query {key} failed: {reason}")]
    QmakeQuery {
        /// The queried property, e.g. `QT_INSTALL_LIBS`.
        key: String,
        /// Spawn error or exit status.
        reason: String,
    },
    /// The binary inspection tool could not be spawned.
    #[error("failed to inspect linked libraries of {}", binary.display())]
    Inspect {
        /// The binary being inspected.
        binary: PathBuf,
        /// The underlying spawn error.
        #[source]
        source: std::io::Error,
    },
    /// The binary inspection tool exited non-zero.
    #[error("otool -L {} failed: {stderr}", binary.display())]
    InspectFailed {
        /// The binary being inspected.
        binary: PathBuf,
        /// What the tool printed to stderr.
        stderr: String,
    },
    /// A path staged as a framework has no `Name.framework` component.
    #[error("{} does not contain a Name.framework path component", .0.display())]
    NotAFramework(PathBuf),
}
