//! Makes a compiled macOS application bundle standalone by bundling its Qt
//! framework and dylib dependency closure.
//!
//! The high-level api is [Deployer], which walks the dependency closure of the
//! bundle's executables and the required Qt plugins and plans every copy and
//! `install_name_tool` rewrite into a [CommandQueue]. Nothing in the bundle is
//! touched until the whole plan has been computed; the queue is then replayed
//! in order and the outcome reported as an [ExecutionReport].
//!
//! Binary inspection and link editing are delegated to the platform tools
//! (`otool`, `install_name_tool`, `ditto`) as opaque subprocesses; this crate
//! only decides *what* to run.

#![deny(missing_docs)]

pub use crate::bundle::Bundle;
pub use crate::commands::{CommandFailure, CommandQueue, ExecutionReport, PlannedCommand};
pub use crate::deploy::{
    BinaryInspector, BrokenDeps, DeployError, Deployer, LinkedPath, Otool, SearchPaths,
    broken_dependencies, parse_linked_path,
};
pub use crate::qt::{QT_PLUGINS, QtEnv, find_qt_plugin};

mod bundle;
mod commands;
mod deploy;
mod qt;
