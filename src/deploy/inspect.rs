//! Binary inspection through `otool`.

use super::DeployError;
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Enumerates the linked paths recorded in a binary's load commands.
///
/// This is the seam between the resolver and the platform: production code
/// uses [Otool], tests inject a fake returning canned link tables.
pub trait BinaryInspector {
    /// All linked paths of `binary`, in load-command order, without the
    /// leading self-header the inspection tool prints.
    fn linked_paths(&self, binary: &Path) -> Result<Vec<String>, DeployError>;
}

/// The production inspector, shelling out to `otool -L`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Otool;

impl BinaryInspector for Otool {
    fn linked_paths(&self, binary: &Path) -> Result<Vec<String>, DeployError> {
        debug!("otool -L {}", binary.display());
        let output = Command::new("otool")
            .arg("-L")
            .arg(binary)
            .output()
            .map_err(|source| DeployError::Inspect {
                binary: binary.to_path_buf(),
                source,
            })?;
        if !output.status.success() {
            return Err(DeployError::InspectFailed {
                binary: binary.to_path_buf(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(parse_link_table(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parse `otool -L` output. The first line repeats the inspected path; each
/// remaining line is "\t<path> (compatibility version ..., current
/// version ...)".
fn parse_link_table(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .skip(1)
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect()
}
