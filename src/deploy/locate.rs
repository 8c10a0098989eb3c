//! Locating the real files behind broken references.

use super::DeployError;
use super::classify::{strip_segments, trailing_segments};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Fallback roots searched for frameworks, after the Qt installation.
/// Sparkle is vendored through its Homebrew cask.
const FRAMEWORK_SEARCH_PATH: &[&str] = &[
    "/opt/homebrew/Caskroom/sparkle/2.6.4",
    "/Library/Frameworks",
    ".",
];

/// Fallback roots searched for plain libraries, after the Qt installation.
const LIBRARY_SEARCH_PATH: &[&str] = &["/usr/local/lib", "."];

/// Directories whose libraries are provided by the OS; a same-named file
/// here means a reference can point at the system copy instead of a bundled
/// one.
const SYSTEM_LIBRARY_DIRS: &[&str] = &["/lib", "/usr/lib"];

/// The ordered lists of roots the locator searches.
///
/// The Qt installation's library directory (queried from qmake) always takes
/// priority: it is stored once and occupies position 0 of every search.
/// Tests construct this directly with temp roots.
#[derive(Debug, Clone)]
pub struct SearchPaths {
    /// `QT_INSTALL_LIBS` of the active Qt installation.
    pub qt_install_libs: PathBuf,
    /// Roots searched for frameworks after the Qt installation.
    pub framework_roots: Vec<PathBuf>,
    /// Roots searched for plain libraries after the Qt installation.
    pub library_roots: Vec<PathBuf>,
    /// OS-provided library directories.
    pub system_library_dirs: Vec<PathBuf>,
}

impl SearchPaths {
    /// The default search lists for a given Qt installation.
    pub fn new(qt_install_libs: PathBuf) -> Self {
        SearchPaths {
            qt_install_libs,
            framework_roots: FRAMEWORK_SEARCH_PATH.iter().map(PathBuf::from).collect(),
            library_roots: LIBRARY_SEARCH_PATH.iter().map(PathBuf::from).collect(),
            system_library_dirs: SYSTEM_LIBRARY_DIRS.iter().map(PathBuf::from).collect(),
        }
    }

    /// Find the file behind a plain library reference.
    ///
    /// An absolute (or otherwise directly existing) reference is returned
    /// unchanged. Each root is tried with the full reference first, then with
    /// its bare file name (references that have lost their directory
    /// structure). `None` is a sentinel, not an error: the caller decides
    /// whether an unresolvable library is fatal.
    pub fn locate_library(&self, reference: &str) -> Option<PathBuf> {
        let direct = Path::new(reference);
        if direct.exists() {
            return Some(direct.to_path_buf());
        }
        let name = direct.file_name();
        for root in std::iter::once(&self.qt_install_libs).chain(&self.library_roots) {
            let candidate = root.join(reference);
            if candidate.exists() {
                return Some(candidate);
            }
            // try harder: look for the bare name in the library folder
            if let Some(name) = name {
                let candidate = root.join(name);
                if candidate.exists() {
                    return Some(candidate);
                }
            }
        }
        None
    }

    /// Find the file behind a framework reference. Frameworks are mandatory,
    /// so an exhausted search is a hard failure.
    ///
    /// `@rpath` references are stripped to their
    /// `Name.framework/Versions/X/Name` tail (or, for non-framework `@rpath`
    /// forms, to everything after the first segment); any other reference is
    /// used verbatim.
    pub fn locate_framework(&self, reference: &str) -> Result<PathBuf, DeployError> {
        let relative = if reference.contains("@rpath") {
            if reference.contains(".framework") {
                trailing_segments(reference, 4)
            } else {
                strip_segments(reference, 1)
            }
        } else {
            reference.to_string()
        };
        debug!("finding framework {reference} as {relative}");
        for root in std::iter::once(&self.qt_install_libs).chain(&self.framework_roots) {
            let candidate = root.join(&relative);
            if candidate.exists() {
                return Ok(candidate);
            }
        }
        Err(DeployError::FrameworkNotFound(reference.to_string()))
    }

    /// The OS-provided copy of `name`, if one exists.
    pub fn find_system_library(&self, name: &str) -> Option<PathBuf> {
        self.system_library_dirs
            .iter()
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.exists())
    }
}
