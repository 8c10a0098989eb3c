//! Makes a compiled macOS app bundle standalone by copying its Qt framework
//! and dylib dependency closure into the bundle and rewriting every load
//! command to a relocatable `@rpath` form. This file contains the CLI.
//!
//! Run with --help for usage information

use anyhow::{Context, Result, bail};
use clap::Parser;
use macdeployqt::{Bundle, Deployer, Otool, QT_PLUGINS, QtEnv, SearchPaths, find_qt_plugin};
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(
    version,
    name = env!("CARGO_PKG_NAME"),
    after_help = "Every planned command is printed before it runs; set RUST_LOG=debug for the classification of each linked path."
)]
/// Bundle the Qt frameworks, plugins and dylibs an application links against
/// into its .app bundle and make all load paths relocatable
struct Opt {
    /// The .app bundle to deploy
    bundle: PathBuf,
    /// Path to the qmake of the Qt installation the bundle was built against
    qmake: PathBuf,
}

fn run() -> Result<()> {
    tracing_subscriber::fmt::init();

    let opt = Opt::parse();

    let qt = QtEnv::discover(&opt.qmake)
        .with_context(|| format!("failed to query Qt via {}", opt.qmake.display()))?;
    let bundle = Bundle::new(&opt.bundle);
    let search = SearchPaths::new(qt.install_libs.clone());
    let inspector = Otool;

    let mut deployer = Deployer::new(&bundle, &search, &inspector);
    deployer.stage_skeleton();

    for binary in bundle
        .executables()
        .context("failed to enumerate bundle executables")?
    {
        deployer.fix_binary(&binary)?;
    }

    for plugin in QT_PLUGINS {
        let resolved = find_qt_plugin(&qt.plugin_roots(), plugin)?;
        let subdir = Path::new(plugin)
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .to_string_lossy()
            .into_owned();
        deployer.fix_plugin(&resolved, &subdir)?;
    }

    let queue = deployer.into_queue();
    println!("🍎 Deploying {} ({} commands)", opt.bundle.display(), queue.len());
    let report = queue.execute();

    bundle.write_qt_conf().context("failed to write qt.conf")?;

    if !report.is_success() {
        bail!(
            "{} of {} commands failed, the bundle may be incomplete",
            report.failures.len(),
            report.executed
        );
    }

    println!("✨ Done");
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("💥 macdeployqt failed");
        for cause in e.chain() {
            eprintln!("  Caused by: {cause}");
        }
        std::process::exit(1);
    }
}
