//! Build/publish tool adapter.
//!
//! Packages are opaque to this crate: their declared name and version, and
//! the act of building and uploading a release, are all delegated to a
//! [`PackageTool`]. The production adapter runs configurable shell commands.

use crate::config::ToolConfig;
use crate::error::{DiscoveryError, Result};
use crate::process::{self, CommandOutput, shell_quote};
use std::future::Future;
use std::path::Path;
use std::time::Duration;

/// Name and version a working copy declares about itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    /// Declared package name, before normalisation
    pub name: String,
    /// Declared version
    pub version: String,
}

/// Capability for reading package metadata and publishing releases
pub trait PackageTool {
    /// Read the declared name and version of the working copy at `path`
    fn resolve(&self, path: &Path) -> impl Future<Output = Result<PackageInfo>>;

    /// Build, tag and upload `name` from `path` to `target`
    ///
    /// A failing tool is reported through the returned output, not as `Err`.
    fn release(
        &self,
        path: &Path,
        name: &str,
        target: &str,
    ) -> impl Future<Output = Result<CommandOutput>>;

    /// Human-readable form of the release invocation, used in diagnostics
    fn release_command(&self, _path: &Path, name: &str, target: &str) -> String {
        format!("release {} to {}", name, target)
    }
}

/// [`PackageTool`] running the commands configured under `[tool]`
#[derive(Debug, Clone)]
pub struct CommandPackageTool {
    config: ToolConfig,
}

impl CommandPackageTool {
    /// Adapter for the given tool settings
    pub fn new(config: ToolConfig) -> Self {
        Self { config }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    async fn query(&self, command: &str, path: &Path) -> Result<String> {
        let output = process::run_shell(command, path, Some(self.timeout())).await?;
        if !output.success {
            return Err(DiscoveryError::Unresolvable {
                path: path.to_path_buf(),
                reason: format!("'{}' failed: {}", command, output.failure_reason()),
            }
            .into());
        }
        // setup.py may print warnings before the answer
        output
            .stdout_lines()
            .pop()
            .ok_or_else(|| {
                DiscoveryError::Unresolvable {
                    path: path.to_path_buf(),
                    reason: format!("'{}' printed nothing", command),
                }
                .into()
            })
    }
}

impl PackageTool for CommandPackageTool {
    async fn resolve(&self, path: &Path) -> Result<PackageInfo> {
        let name = self.query(&self.config.name_command, path).await?;
        let version = self.query(&self.config.version_command, path).await?;
        Ok(PackageInfo { name, version })
    }

    async fn release(&self, path: &Path, name: &str, target: &str) -> Result<CommandOutput> {
        let command = self.release_command(path, name, target);
        log::info!("releasing {} to {}: {}", name, target, command);
        process::run_shell(&command, path, Some(self.timeout())).await
    }

    /// Release command line with placeholders filled in
    fn release_command(&self, path: &Path, name: &str, target: &str) -> String {
        self.config
            .release_command
            .replace("{path}", &shell_quote(&path.to_string_lossy()))
            .replace("{target}", &shell_quote(target))
            .replace("{name}", &shell_quote(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReleaseError;

    fn tool() -> CommandPackageTool {
        CommandPackageTool::new(ToolConfig {
            name_command: "cat NAME".into(),
            version_command: "echo 'warning: ignored'; cat VERSION".into(),
            ..ToolConfig::default()
        })
    }

    #[test]
    fn release_command_substitutes_placeholders() {
        let line = tool().release_command(Path::new("/work/src/acme theme"), "acme.theme", "public");
        assert_eq!(line, "mkrelease -C -d public '/work/src/acme theme'");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn resolve_reads_last_line_of_each_command() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("NAME"), "acme.theme\n").unwrap();
        std::fs::write(dir.path().join("VERSION"), "1.4\n").unwrap();
        let info = tool().resolve(dir.path()).await.unwrap();
        assert_eq!(
            info,
            PackageInfo {
                name: "acme.theme".into(),
                version: "1.4".into()
            }
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn resolve_failure_is_unresolvable() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            tool().resolve(dir.path()).await,
            Err(ReleaseError::Discovery(DiscoveryError::Unresolvable { .. }))
        ));
    }
}
