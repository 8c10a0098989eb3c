//! Classification of linked paths into system, already-fixed and broken
//! references.

use super::inspect::BinaryInspector;
use crate::bundle::Bundle;
use crate::deploy::DeployError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tracing::debug;

/// Matches a `Name.framework` anywhere in a linked path.
static FRAMEWORK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+\.framework").unwrap());

/// Matches a `Name.framework` path component (used to split a path at the
/// framework root).
static FRAMEWORK_COMPONENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\w+\.framework").unwrap());

/// The name of the crash reporter library the build system places into the
/// bundle itself; references to it must never be rewritten.
const PREBUNDLED_CRASH_REPORTER: &str = "Breakpad";

/// One linked path of a binary, parsed into the closed set of reference
/// forms the resolver distinguishes.
///
/// Produced by [parse_linked_path] and matched exhaustively; the rule order
/// matters (self and system checks come before any pattern check).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkedPath {
    /// The binary's own install name.
    SelfReference,
    /// Under `/System/` or `/usr/lib/`; provided by the OS, never touched.
    System,
    /// The crash reporter the build places into the bundle manually.
    Prebundled,
    /// `@rpath/...` — uses the relocatable-path convention, but may still
    /// point at something absent from the bundle.
    Rpath(String),
    /// `@executable_path/...` — potentially already fixed.
    ExecutableRelative(String),
    /// `@loader_path/...` — potentially already fixed.
    LoaderRelative(String),
    /// Anything else naming a `Name.framework`: a framework linked by its
    /// build-tree or install path.
    BareFramework(String),
    /// Everything else: a plain dylib linked by a non-relocatable path.
    BareLibrary(String),
}

/// Parse one linked path of `binary` into its [LinkedPath] form.
pub fn parse_linked_path(binary: &Path, entry: &str) -> LinkedPath {
    let entry = entry.trim();
    if Path::new(entry).file_name() == binary.file_name() {
        return LinkedPath::SelfReference;
    }
    if entry.starts_with("/System/") || entry.starts_with("/usr/lib/") {
        return LinkedPath::System;
    }
    if entry.starts_with(PREBUNDLED_CRASH_REPORTER) {
        return LinkedPath::Prebundled;
    }
    if entry.starts_with("@rpath") {
        return LinkedPath::Rpath(entry.to_string());
    }
    if entry.starts_with("@executable_path") {
        return LinkedPath::ExecutableRelative(entry.to_string());
    }
    if entry.starts_with("@loader_path") {
        return LinkedPath::LoaderRelative(entry.to_string());
    }
    if FRAMEWORK_RE.is_match(entry) {
        return LinkedPath::BareFramework(entry.to_string());
    }
    LinkedPath::BareLibrary(entry.to_string())
}

/// The last `n` `/`-separated segments of `path`, rejoined.
pub(crate) fn trailing_segments(path: &str, n: usize) -> String {
    let parts: Vec<&str> = path.split('/').collect();
    parts[parts.len().saturating_sub(n)..].join("/")
}

/// `path` with its first `n` `/`-separated segments dropped.
pub(crate) fn strip_segments(path: &str, n: usize) -> String {
    path.split('/').skip(n).collect::<Vec<_>>().join("/")
}

/// Whether a path component is a framework root (`Name.framework`).
pub(crate) fn is_framework_component(part: &str) -> bool {
    FRAMEWORK_COMPONENT_RE.is_match(part)
}

/// The suffix of `path` starting at its `Name.framework` component, or `None`
/// if the path has no such component.
pub(crate) fn framework_tail(path: &str) -> Option<String> {
    let parts: Vec<&str> = path.split('/').collect();
    let start = parts.iter().position(|part| is_framework_component(part))?;
    Some(parts[start..].join("/"))
}

/// The broken references of one binary, partitioned by kind.
///
/// Frameworks and plain libraries follow different search, copy and rewrite
/// rules, so they are kept apart from classification onwards.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BrokenDeps {
    /// Broken framework references. `@rpath` forms keep their full original
    /// string; executable- and loader-relative forms are stripped to the
    /// bundle-relative path.
    pub frameworks: Vec<String>,
    /// Broken plain library references, with the same string convention.
    pub libs: Vec<String>,
}

impl BrokenDeps {
    /// Whether the binary has nothing to fix.
    pub fn is_empty(&self) -> bool {
        self.frameworks.is_empty() && self.libs.is_empty()
    }
}

/// Enumerate the linked paths of `binary` and collect the ones that need
/// fixing.
///
/// An `@rpath`/`@executable_path`/`@loader_path` reference is broken only if
/// its target is absent from the bundle; everything the classifier cannot
/// prove fixed or system-provided is treated as broken.
pub fn broken_dependencies(
    inspector: &dyn BinaryInspector,
    bundle: &Bundle,
    binary: &Path,
) -> Result<BrokenDeps, DeployError> {
    debug!("checking libs for binary: {}", binary.display());
    let mut broken = BrokenDeps::default();
    for entry in inspector.linked_paths(binary)? {
        if entry.trim().is_empty() {
            continue;
        }
        match parse_linked_path(binary, &entry) {
            LinkedPath::SelfReference | LinkedPath::System | LinkedPath::Prebundled => {
                debug!("skipping {entry}");
            }
            LinkedPath::Rpath(reference) => {
                if reference.contains(".framework") {
                    let relative = trailing_segments(&reference, 4);
                    if !bundle.frameworks_dir().join(&relative).exists() {
                        broken.frameworks.push(reference);
                    }
                } else {
                    let relative = strip_segments(&reference, 1);
                    if !bundle.macos_dir().join(&relative).exists() {
                        broken.libs.push(reference);
                    }
                }
            }
            LinkedPath::ExecutableRelative(reference) | LinkedPath::LoaderRelative(reference) => {
                if reference.contains(".framework") {
                    let relative = strip_segments(&reference, 3);
                    if !bundle.frameworks_dir().join(&relative).exists() {
                        broken.frameworks.push(relative);
                    }
                } else {
                    let relative = strip_segments(&reference, 1);
                    if !bundle.macos_dir().join(&relative).exists() {
                        broken.libs.push(relative);
                    }
                }
            }
            LinkedPath::BareFramework(reference) => broken.frameworks.push(reference),
            LinkedPath::BareLibrary(reference) => broken.libs.push(reference),
        }
    }
    Ok(broken)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use tempfile::TempDir;

    struct FakeInspector(HashMap<String, Vec<String>>);

    impl FakeInspector {
        fn single(binary: &str, entries: &[&str]) -> Self {
            let mut map = HashMap::new();
            map.insert(
                binary.to_string(),
                entries.iter().map(|e| e.to_string()).collect(),
            );
            FakeInspector(map)
        }
    }

    impl BinaryInspector for FakeInspector {
        fn linked_paths(&self, binary: &Path) -> Result<Vec<String>, DeployError> {
            let name = binary.file_name().unwrap().to_string_lossy().to_string();
            Ok(self.0.get(&name).cloned().unwrap_or_default())
        }
    }

    #[test]
    fn test_parse_linked_path() {
        let binary = Path::new("/App.app/Contents/MacOS/owncloud");
        let entries = [
            (
                "/App.app/Contents/MacOS/owncloud",
                LinkedPath::SelfReference,
            ),
            ("owncloud", LinkedPath::SelfReference),
            (
                "/System/Library/Frameworks/Cocoa.framework/Versions/A/Cocoa",
                LinkedPath::System,
            ),
            ("/usr/lib/libSystem.B.dylib", LinkedPath::System),
            ("Breakpad", LinkedPath::Prebundled),
            (
                "@rpath/QtCore.framework/Versions/5/QtCore",
                LinkedPath::Rpath("@rpath/QtCore.framework/Versions/5/QtCore".into()),
            ),
            (
                "@rpath/libcrypto.3.dylib",
                LinkedPath::Rpath("@rpath/libcrypto.3.dylib".into()),
            ),
            (
                "@executable_path/../Frameworks/Sparkle.framework/Versions/B/Sparkle",
                LinkedPath::ExecutableRelative(
                    "@executable_path/../Frameworks/Sparkle.framework/Versions/B/Sparkle".into(),
                ),
            ),
            (
                "@loader_path/libssl.dylib",
                LinkedPath::LoaderRelative("@loader_path/libssl.dylib".into()),
            ),
            (
                "/usr/local/opt/qt/lib/QtGui.framework/Versions/5/QtGui",
                LinkedPath::BareFramework(
                    "/usr/local/opt/qt/lib/QtGui.framework/Versions/5/QtGui".into(),
                ),
            ),
            (
                "/usr/local/lib/libsqlite3.dylib",
                LinkedPath::BareLibrary("/usr/local/lib/libsqlite3.dylib".into()),
            ),
            ("libocsync.dylib", LinkedPath::BareLibrary("libocsync.dylib".into())),
        ];

        for (entry, expected) in entries {
            assert_eq!(parse_linked_path(binary, entry), expected, "{entry}");
        }
    }

    #[test]
    fn test_segment_helpers() {
        assert_eq!(
            trailing_segments("@rpath/QtCore.framework/Versions/5/QtCore", 4),
            "QtCore.framework/Versions/5/QtCore"
        );
        assert_eq!(strip_segments("@rpath/libfoo.dylib", 1), "libfoo.dylib");
        assert_eq!(
            strip_segments(
                "@executable_path/../Frameworks/QtCore.framework/Versions/5/QtCore",
                3
            ),
            "QtCore.framework/Versions/5/QtCore"
        );
        assert_eq!(
            framework_tail("/usr/local/opt/qt/lib/QtGui.framework/Versions/5/QtGui").as_deref(),
            Some("QtGui.framework/Versions/5/QtGui")
        );
        assert_eq!(framework_tail("/usr/local/lib/libfoo.dylib"), None);
    }

    #[test]
    fn test_system_and_self_references_are_never_broken() {
        let dir = TempDir::new().unwrap();
        let bundle = Bundle::new(dir.path().join("Test.app"));
        let inspector = FakeInspector::single(
            "owncloud",
            &[
                "/usr/lib/libSystem.B.dylib",
                "/System/Library/Frameworks/AppKit.framework/Versions/C/AppKit",
                "owncloud",
            ],
        );

        let broken = broken_dependencies(
            &inspector,
            &bundle,
            &bundle.macos_dir().join("owncloud"),
        )
        .unwrap();

        assert!(broken.is_empty());
    }

    #[test]
    fn test_relocated_reference_with_present_target_is_fixed() {
        let dir = TempDir::new().unwrap();
        let bundle = Bundle::new(dir.path().join("Test.app"));
        let present = bundle.frameworks_dir().join("QtCore.framework/Versions/5");
        std::fs::create_dir_all(&present).unwrap();
        std::fs::write(present.join("QtCore"), b"").unwrap();

        let inspector = FakeInspector::single(
            "owncloud",
            &[
                "@rpath/QtCore.framework/Versions/5/QtCore",
                "@rpath/QtGui.framework/Versions/5/QtGui",
            ],
        );

        let broken = broken_dependencies(
            &inspector,
            &bundle,
            &bundle.macos_dir().join("owncloud"),
        )
        .unwrap();

        // QtCore already lives in Contents/Frameworks, QtGui does not
        assert_eq!(
            broken.frameworks,
            vec!["@rpath/QtGui.framework/Versions/5/QtGui".to_string()]
        );
        assert!(broken.libs.is_empty());
    }

    #[test]
    fn test_executable_relative_reference_is_recorded_stripped() {
        let dir = TempDir::new().unwrap();
        let bundle = Bundle::new(dir.path().join("Test.app"));

        let inspector = FakeInspector::single(
            "owncloud",
            &[
                "@executable_path/../Frameworks/Sparkle.framework/Versions/B/Sparkle",
                "@loader_path/libocsync.dylib",
            ],
        );

        let broken = broken_dependencies(
            &inspector,
            &bundle,
            &bundle.macos_dir().join("owncloud"),
        )
        .unwrap();

        // unlike @rpath entries, these are recorded by their stripped form
        assert_eq!(
            broken.frameworks,
            vec!["Sparkle.framework/Versions/B/Sparkle".to_string()]
        );
        assert_eq!(broken.libs, vec!["libocsync.dylib".to_string()]);
    }

    #[test]
    fn test_bare_references_are_always_broken() {
        let dir = TempDir::new().unwrap();
        let bundle = Bundle::new(dir.path().join("Test.app"));

        let inspector = FakeInspector::single(
            "owncloud",
            &[
                "/usr/local/opt/qt/lib/QtSvg.framework/Versions/5/QtSvg",
                "libocsync.dylib",
            ],
        );

        let broken = broken_dependencies(
            &inspector,
            &bundle,
            &bundle.macos_dir().join("owncloud"),
        )
        .unwrap();

        assert_eq!(
            broken.frameworks,
            vec!["/usr/local/opt/qt/lib/QtSvg.framework/Versions/5/QtSvg".to_string()]
        );
        assert_eq!(broken.libs, vec!["libocsync.dylib".to_string()]);
    }
}
