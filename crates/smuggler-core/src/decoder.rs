//! Response decoding from command output.
//!
//! Two strategies, tried in order: stdout as a JSON response object, then
//! marker files in the scratch output directory. A stdout parse failure is
//! the normal signal to use marker files, not an error.

use std::io::ErrorKind;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::domain::version::trim_marker;
use crate::domain::{Action, MetadataPair, ResourceResponse, Result, SmugglerError, Version};

/// Marker file listing versions, one per line.
pub const VERSIONS_FILE: &str = "versions";
/// Marker file holding the produced version; the first line wins.
pub const VERSION_FILE: &str = "version";
/// Marker file with `name=value` metadata lines.
pub const METADATA_FILE: &str = "metadata";

/// Response shape a command may print on stdout.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct StdoutResponse {
    #[serde(default)]
    version: Option<Version>,
    #[serde(default)]
    versions: Vec<Version>,
    #[serde(default)]
    metadata: Vec<MetadataPair>,
}

/// Versions and metadata gathered by either strategy.
#[derive(Debug, Default)]
struct Decoded {
    versions: Vec<Version>,
    metadata: Vec<MetadataPair>,
}

/// Decode a command's result into a response for `action`.
///
/// For `in`, a missing version falls back to `request_version`; for `out`
/// it is an error.
pub fn decode_response(
    stdout: &[u8],
    output_dir: &Path,
    action: Action,
    request_version: Option<&Version>,
) -> Result<ResourceResponse> {
    let decoded = match decode_stdout(stdout, action) {
        Some(decoded) => {
            debug!(action = %action, "Decoded response from stdout");
            decoded
        }
        None => {
            debug!(action = %action, dir = %output_dir.display(), "Decoding response from marker files");
            decode_output_dir(output_dir)?
        }
    };

    let mut response = ResourceResponse::empty(action);
    response.metadata = decoded.metadata;

    match action {
        Action::Check => response.versions = decoded.versions,
        Action::In | Action::Out => {
            response.version = decoded
                .versions
                .into_iter()
                .next()
                .or_else(|| match action {
                    Action::In => request_version.cloned(),
                    _ => None,
                });
            if action == Action::Out && response.version.is_none() {
                return Err(SmugglerError::NoVersionProduced(action));
            }
        }
    }

    Ok(response)
}

/// `check` reads only `versions`; `in`/`out` prefer `version`.
fn decode_stdout(stdout: &[u8], action: Action) -> Option<Decoded> {
    let parsed: StdoutResponse = serde_json::from_slice(stdout).ok()?;
    let mut versions = Vec::with_capacity(parsed.versions.len() + 1);
    if action != Action::Check {
        versions.extend(parsed.version);
    }
    versions.extend(parsed.versions);
    Some(Decoded {
        versions,
        metadata: parsed.metadata,
    })
}

fn decode_output_dir(output_dir: &Path) -> Result<Decoded> {
    let mut versions: Vec<Version> = read_marker_lines(&output_dir.join(VERSIONS_FILE))?
        .iter()
        .map(|line| Version::from_line(line))
        .collect();
    versions.extend(
        read_marker_lines(&output_dir.join(VERSION_FILE))?
            .iter()
            .map(|line| Version::from_line(line)),
    );

    let metadata = read_marker_lines(&output_dir.join(METADATA_FILE))?
        .iter()
        .map(|line| MetadataPair::from_line(line))
        .collect();

    Ok(Decoded { versions, metadata })
}

/// Non-blank lines of a marker file, trimmed; a missing file has none.
///
/// Invalid UTF-8 is replaced rather than rejected.
fn read_marker_lines(path: &Path) -> Result<Vec<String>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(SmugglerError::MarkerFile {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let content = String::from_utf8_lossy(&bytes);
    Ok(content
        .lines()
        .map(|line| trim_marker(line.trim_end_matches('\r')))
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}
