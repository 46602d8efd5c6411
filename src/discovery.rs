//! Package discovery.
//!
//! Scans the configured package directories for working copies and asks the
//! [`PackageTool`] for each one's declared name and version. The order of
//! `package_dirs`, then entry name within each directory, is the pipeline
//! order used by every later stage.

use crate::config::ProjectConfig;
use crate::error::{DiscoveryError, ReleaseError, Result};
use crate::state::PackageRecord;
use crate::tool::PackageTool;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Entry names never treated as packages
pub const GLOBAL_IGNORES: [&str; 6] = [".svn", "CVS", ".AppleDouble", ".git", ".hg", ".DS_Store"];

/// Canonical form of a declared package name
///
/// Every run of characters outside `[A-Za-z0-9.]` becomes a single `-`;
/// leading and trailing dashes are dropped.
pub fn normalize_name(declared: &str) -> String {
    let mut name = String::with_capacity(declared.len());
    let mut in_junk = false;
    for c in declared.chars() {
        if c.is_ascii_alphanumeric() || c == '.' {
            name.push(c);
            in_junk = false;
        } else if !in_junk {
            name.push('-');
            in_junk = true;
        }
    }
    name.trim_matches('-').to_string()
}

/// Working copy whose name or version could not be read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unresolved {
    /// Working copy
    pub path: PathBuf,
    /// Why resolution failed
    pub reason: String,
}

/// Result of a discovery scan
#[derive(Debug, Default)]
pub struct Discovery {
    /// Packages in pipeline order
    pub packages: Vec<PackageRecord>,
    /// Working copies excluded because they could not be resolved
    pub unresolved: Vec<Unresolved>,
}

/// Candidate directories under `package_dir`, sorted by name
fn candidates(package_dir: &Path, ignores: &[&str]) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(package_dir).map_err(|e| DiscoveryError::UnreadableDirectory {
        path: package_dir.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| DiscoveryError::UnreadableDirectory {
            path: package_dir.to_path_buf(),
            reason: e.to_string(),
        })?;
        let name = entry.file_name();
        if ignores.contains(&name.to_string_lossy().as_ref()) {
            log::debug!("ignoring {}", entry.path().display());
            continue;
        }
        // is_dir follows symlinks
        if entry.path().is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(dirs)
}

/// Scan `config.package_dirs` under `root`
pub async fn discover(config: &ProjectConfig, root: &Path, tool: &impl PackageTool) -> Result<Discovery> {
    let ignores: Vec<&str> = config
        .ignore_dirs
        .iter()
        .map(String::as_str)
        .chain(GLOBAL_IGNORES)
        .collect();

    let mut discovery = Discovery::default();
    let mut seen: HashMap<String, usize> = HashMap::new();

    for package_dir in &config.package_dirs {
        let package_dir = root.join(package_dir);
        for path in candidates(&package_dir, &ignores)? {
            let info = match tool.resolve(&path).await {
                Ok(info) => info,
                Err(ReleaseError::Discovery(DiscoveryError::Unresolvable { reason, .. })) => {
                    log::warn!("skipping {}: {}", path.display(), reason);
                    discovery.unresolved.push(Unresolved { path, reason });
                    continue;
                }
                Err(e) => {
                    log::warn!("skipping {}: {}", path.display(), e);
                    discovery.unresolved.push(Unresolved {
                        path,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let name = normalize_name(&info.name);
            if name.is_empty() {
                discovery.unresolved.push(Unresolved {
                    path,
                    reason: format!("declared name '{}' is empty after normalisation", info.name),
                });
                continue;
            }
            if name != info.name {
                log::info!("package name '{}' normalised to '{}'", info.name, name);
            }

            let (version_file, version_pattern) = config.version_location(&name);
            let record = PackageRecord {
                target: config.release_target(&name).to_string(),
                version_file,
                version_pattern,
                ..PackageRecord::new(name.clone(), path, info.version)
            };

            match seen.get(&name) {
                Some(&index) if config.allow_name_collisions => {
                    log::warn!(
                        "'{}' found in both {} and {}; using the latter",
                        name,
                        discovery.packages[index].path.display(),
                        record.path.display()
                    );
                    discovery.packages[index] = record;
                }
                Some(&index) => {
                    return Err(DiscoveryError::NameCollision {
                        name,
                        first: discovery.packages[index].path.clone(),
                        second: record.path,
                    }
                    .into());
                }
                None => {
                    seen.insert(name, discovery.packages.len());
                    discovery.packages.push(record);
                }
            }
        }
    }

    log::debug!(
        "discovered {} package(s), {} unresolved",
        discovery.packages.len(),
        discovery.unresolved.len()
    );
    Ok(discovery)
}
