//! The deferred command plan and its executor.
//!
//! All bundle mutation is expressed as [PlannedCommand]s appended to a
//! [CommandQueue] while the dependency closure is computed. Only once planning
//! has finished in full is the queue replayed, strictly in append order, so a
//! failure during planning leaves the bundle untouched and the whole plan can
//! be inspected as a single batch.

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, warn};

/// The two slices copied out of universal binaries by `ditto`.
const DITTO_ARCHS: [&str; 2] = ["x86_64", "arm64"];

/// One deferred external operation against the bundle.
///
/// Each variant renders to the argv of one platform tool invocation; the
/// tools themselves are opaque collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedCommand {
    /// `mkdir -p <path>`
    MkDir(PathBuf),
    /// `ditto --arch=x86_64 --arch=arm64 <src> <dst>` — an explicit
    /// dual-architecture copy so both slices of a universal binary survive.
    CopyDual {
        /// The resolved file or directory to copy.
        src: PathBuf,
        /// Destination inside the bundle.
        dst: PathBuf,
    },
    /// `cp -af <src> <dst>`
    CopyFile {
        /// Source file.
        src: PathBuf,
        /// Destination file or directory.
        dst: PathBuf,
    },
    /// `chmod u+w <path>` — copied files keep their source permissions and
    /// may not be writable by `install_name_tool` otherwise.
    MakeWritable(PathBuf),
    /// `ln -sf <target> <link>`
    Symlink {
        /// What the link points at (relative to the link's directory).
        target: PathBuf,
        /// Where the link is created.
        link: PathBuf,
    },
    /// `install_name_tool -id <id> <target>`
    SetId {
        /// The new install name.
        id: String,
        /// The dylib whose identity is rewritten.
        target: PathBuf,
    },
    /// `install_name_tool -change <old> <new> <target>`
    ChangeInstallName {
        /// The load path as currently recorded in the binary.
        old: String,
        /// The load path to record instead.
        new: String,
        /// The binary whose load command is rewritten.
        target: PathBuf,
    },
}

impl PlannedCommand {
    /// The argv this command replays as.
    pub fn argv(&self) -> Vec<OsString> {
        match self {
            PlannedCommand::MkDir(path) => {
                vec!["mkdir".into(), "-p".into(), path.clone().into()]
            }
            PlannedCommand::CopyDual { src, dst } => vec![
                "ditto".into(),
                format!("--arch={}", DITTO_ARCHS[0]).into(),
                format!("--arch={}", DITTO_ARCHS[1]).into(),
                src.clone().into(),
                dst.clone().into(),
            ],
            PlannedCommand::CopyFile { src, dst } => vec![
                "cp".into(),
                "-af".into(),
                src.clone().into(),
                dst.clone().into(),
            ],
            PlannedCommand::MakeWritable(path) => {
                vec!["chmod".into(), "u+w".into(), path.clone().into()]
            }
            PlannedCommand::Symlink { target, link } => vec![
                "ln".into(),
                "-sf".into(),
                target.clone().into(),
                link.clone().into(),
            ],
            PlannedCommand::SetId { id, target } => vec![
                "install_name_tool".into(),
                "-id".into(),
                id.clone().into(),
                target.clone().into(),
            ],
            PlannedCommand::ChangeInstallName { old, new, target } => vec![
                "install_name_tool".into(),
                "-change".into(),
                old.clone().into(),
                new.clone().into(),
                target.clone().into(),
            ],
        }
    }
}

impl fmt::Display for PlannedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let argv = self.argv();
        let rendered: Vec<_> = argv.iter().map(|arg| arg.to_string_lossy()).collect();
        write!(f, "{}", rendered.join(" "))
    }
}

/// A command that did not run or exited non-zero during replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFailure {
    /// The rendered command line.
    pub command: String,
    /// Exit status or spawn error.
    pub reason: String,
}

/// Outcome of replaying a whole [CommandQueue].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    /// Number of commands replayed (failures included).
    pub executed: usize,
    /// Every command that failed, in replay order.
    pub failures: Vec<CommandFailure>,
}

impl ExecutionReport {
    /// Whether every replayed command succeeded.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// The ordered, append-only plan of external operations.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CommandQueue {
    commands: Vec<PlannedCommand>,
}

impl CommandQueue {
    /// An empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one command to the plan.
    pub fn push(&mut self, command: PlannedCommand) {
        debug!("queued: {command}");
        self.commands.push(command);
    }

    /// Number of planned commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether nothing has been planned.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// The planned commands in append order.
    pub fn commands(&self) -> &[PlannedCommand] {
        &self.commands
    }

    /// Replay the plan in append order, printing each command before it runs.
    ///
    /// A failing command does not stop the replay (later commands are usually
    /// independent of it), but every failure is captured and surfaced in the
    /// aggregate report.
    pub fn execute(&self) -> ExecutionReport {
        let mut failures = Vec::new();
        for command in &self.commands {
            println!("{command}");
            let mut argv = command.argv().into_iter();
            let program = argv.next().unwrap_or_default();
            match Command::new(&program).args(argv).status() {
                Ok(status) if status.success() => {}
                Ok(status) => {
                    warn!("command failed ({status}): {command}");
                    eprintln!("⚠️  Command failed ({status}): {command}");
                    failures.push(CommandFailure {
                        command: command.to_string(),
                        reason: status.to_string(),
                    });
                }
                Err(err) => {
                    warn!("could not run {command}: {err}");
                    eprintln!("⚠️  Could not run {command}: {err}");
                    failures.push(CommandFailure {
                        command: command.to_string(),
                        reason: err.to_string(),
                    });
                }
            }
        }
        ExecutionReport {
            executed: self.commands.len(),
            failures,
        }
    }
}
