//! End-to-end planning over a fixture bundle: the whole closure walk through
//! the public api, with a canned inspector standing in for `otool`.

use macdeployqt::{
    BinaryInspector, Bundle, DeployError, Deployer, PlannedCommand, SearchPaths,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct CannedOtool(HashMap<String, Vec<String>>);

impl BinaryInspector for CannedOtool {
    fn linked_paths(&self, binary: &Path) -> Result<Vec<String>, DeployError> {
        let name = binary.file_name().unwrap().to_string_lossy().to_string();
        Ok(self.0.get(&name).cloned().unwrap_or_default())
    }
}

fn canned(tables: &[(&str, &[&str])]) -> CannedOtool {
    CannedOtool(
        tables
            .iter()
            .map(|(name, entries)| {
                (
                    name.to_string(),
                    entries.iter().map(|e| e.to_string()).collect(),
                )
            })
            .collect(),
    )
}

fn bundle_with_executable(dir: &TempDir) -> (Bundle, PathBuf) {
    let bundle = Bundle::new(dir.path().join("ownCloud.app"));
    std::fs::create_dir_all(bundle.macos_dir()).unwrap();
    let app = bundle.macos_dir().join("owncloud");
    std::fs::write(&app, b"").unwrap();
    (bundle, app)
}

fn qt_search(dir: &TempDir) -> SearchPaths {
    let qt_libs = dir.path().join("qt/lib");
    std::fs::create_dir_all(&qt_libs).unwrap();
    SearchPaths {
        qt_install_libs: qt_libs,
        framework_roots: vec![],
        library_roots: vec![],
        system_library_dirs: vec![],
    }
}

#[test]
fn test_full_plan_for_framework_and_library_closure() {
    let dir = TempDir::new().unwrap();
    let (bundle, app) = bundle_with_executable(&dir);
    let search = qt_search(&dir);

    // Qt installation: QtCore.framework (linking libz) and a plain libz
    let version_dir = search.qt_install_libs.join("QtCore.framework/Versions/5");
    std::fs::create_dir_all(&version_dir).unwrap();
    std::fs::write(version_dir.join("QtCore"), b"").unwrap();
    std::fs::write(search.qt_install_libs.join("libz.dylib"), b"").unwrap();

    let inspector = canned(&[
        (
            "owncloud",
            &[
                "/usr/lib/libSystem.B.dylib",
                "@rpath/QtCore.framework/Versions/5/QtCore",
            ],
        ),
        ("QtCore", &["libz.dylib"]),
    ]);

    let mut deployer = Deployer::new(&bundle, &search, &inspector);
    deployer.stage_skeleton();
    deployer.fix_binary(&app).unwrap();
    let queue = deployer.into_queue();

    // skeleton first, then the depth-first plan: libz before QtCore before
    // the app's own rewrite
    let staged_lib = bundle.macos_dir().join("libz.dylib");
    let staged_framework = bundle
        .frameworks_dir()
        .join("QtCore.framework/Versions/5/QtCore");
    let commands = queue.commands();
    assert_eq!(
        commands[..3],
        [
            PlannedCommand::MkDir(bundle.frameworks_dir().to_path_buf()),
            PlannedCommand::MkDir(bundle.resources_dir().to_path_buf()),
            PlannedCommand::MkDir(bundle.plugins_dir().to_path_buf()),
        ]
    );
    let position = |needle: &PlannedCommand| {
        commands
            .iter()
            .position(|c| c == needle)
            .unwrap_or_else(|| panic!("missing from plan: {needle}"))
    };
    let lib_copy = position(&PlannedCommand::CopyDual {
        src: search.qt_install_libs.join("libz.dylib"),
        dst: staged_lib.clone(),
    });
    let framework_copy = position(&PlannedCommand::CopyDual {
        src: version_dir.join("QtCore"),
        dst: bundle.frameworks_dir().join("QtCore.framework/Versions/5"),
    });
    let framework_internal_rewrite = position(&PlannedCommand::ChangeInstallName {
        old: "libz.dylib".into(),
        new: "@rpath/libz.dylib".into(),
        target: staged_framework.clone(),
    });
    let app_rewrite = position(&PlannedCommand::ChangeInstallName {
        old: "@rpath/QtCore.framework/Versions/5/QtCore".into(),
        new: "@rpath/../Frameworks/QtCore.framework/Versions/5/QtCore".into(),
        target: app.clone(),
    });
    assert!(lib_copy < framework_copy);
    assert!(framework_copy < framework_internal_rewrite);
    assert!(framework_internal_rewrite < app_rewrite);
    assert_eq!(app_rewrite, commands.len() - 1);
}

#[test]
fn test_replanning_a_deployed_bundle_is_idempotent_for_copies() {
    let dir = TempDir::new().unwrap();
    let (bundle, app) = bundle_with_executable(&dir);
    let search = qt_search(&dir);

    let version_dir = search.qt_install_libs.join("QtCore.framework/Versions/5");
    std::fs::create_dir_all(&version_dir).unwrap();
    std::fs::write(version_dir.join("QtCore"), b"").unwrap();

    // simulate the first run's effect on the bundle
    let deployed = bundle.frameworks_dir().join("QtCore.framework/Versions/5");
    std::fs::create_dir_all(&deployed).unwrap();
    std::fs::write(deployed.join("QtCore"), b"").unwrap();

    let inspector = canned(&[(
        "owncloud",
        &["@rpath/QtCore.framework/Versions/5/QtCore"],
    )]);

    let mut deployer = Deployer::new(&bundle, &search, &inspector);
    deployer.fix_binary(&app).unwrap();

    assert!(deployer.queue().is_empty());
}
