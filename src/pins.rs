//! Version pins file maintenance.
//!
//! The umbrella project pins every package in an INI-style file
//! (`profiles/versions.cfg` by default) with one `name = version` line each.

use crate::context::Context;
use crate::error::{Result, VersionError};
use crate::state::ReleasePhase;
use crate::vcs::{PINS_MESSAGE, VersionControl};
use regex::{NoExpand, Regex};
use std::path::Path;

/// Outcome of a pins update
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PinsUpdate {
    /// Packages whose existing pin line was rewritten
    pub replaced: Vec<String>,
    /// Packages pinned more than once; every pin line was rewritten
    pub ambiguous: Vec<String>,
    /// Packages that had no pin and were appended
    pub appended: Vec<String>,
}

impl PinsUpdate {
    /// Whether anything was written
    pub fn is_empty(&self) -> bool {
        self.replaced.is_empty() && self.appended.is_empty()
    }
}

fn pin_regex(name: &str) -> Result<Regex> {
    let pattern = format!(r"(?m)^[ \t]*{}[ \t]*=.*$", regex::escape(name));
    Regex::new(&pattern).map_err(|e| {
        VersionError::InvalidPattern {
            pattern,
            reason: e.to_string(),
        }
        .into()
    })
}

/// Rewrite `content` so each `(name, version)` is pinned exactly
///
/// Returns the new content and what happened to each package.
pub fn apply_pins(content: &str, pins: &[(String, String)]) -> Result<(String, PinsUpdate)> {
    let mut content = content.to_string();
    let mut update = PinsUpdate::default();
    let mut missing = Vec::new();

    for (name, version) in pins {
        let regex = pin_regex(name)?;
        let line = format!("{} = {}", name, version);
        match regex.find_iter(&content).count() {
            0 => {
                missing.push(line);
                update.appended.push(name.clone());
            }
            count => {
                if count > 1 {
                    log::warn!("{} is pinned {} times; rewriting every pin", name, count);
                    update.ambiguous.push(name.clone());
                }
                content = regex.replace_all(&content, NoExpand(&line)).into_owned();
                update.replaced.push(name.clone());
            }
        }
    }

    if !missing.is_empty() {
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        for line in missing {
            content.push_str(&line);
            content.push('\n');
        }
    }
    Ok((content, update))
}

/// Pin every released package in the pins file and commit it
pub async fn update_pins(ctx: &mut Context, vcs: &impl VersionControl) -> Result<PinsUpdate> {
    let pins: Vec<(String, String)> = ctx
        .state
        .released()
        .into_iter()
        .filter_map(|r| r.released_version.clone().map(|v| (r.name.clone(), v)))
        .collect();
    if pins.is_empty() {
        ctx.state.add_checkpoint("nothing to pin", ReleasePhase::PinsUpdate);
        ctx.persist().await?;
        return Ok(PinsUpdate::default());
    }

    let pins_file = ctx.path(&ctx.config.pins_file);
    ctx.output
        .section(&format!("Updating {}", ctx.config.pins_file.display()));
    let update = rewrite_pins_file(&pins_file, &pins).await?;
    for name in &update.ambiguous {
        ctx.output
            .warn(&format!("There were multiple pins for {}", name));
    }
    for name in &update.appended {
        ctx.output
            .warn(&format!("{} was not in the pins file. It was added.", name));
    }
    vcs.commit(&pins_file, PINS_MESSAGE).await?;

    ctx.state.add_checkpoint("pins updated", ReleasePhase::PinsUpdate);
    ctx.persist().await?;
    Ok(update)
}

async fn rewrite_pins_file(path: &Path, pins: &[(String, String)]) -> Result<PinsUpdate> {
    let update_failed = |reason: String| VersionError::FileUpdateFailed {
        path: path.to_path_buf(),
        reason,
    };
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| update_failed(e.to_string()))?;
    let (content, update) = apply_pins(&content, pins)?;
    tokio::fs::write(path, content)
        .await
        .map_err(|e| update_failed(e.to_string()))?;
    Ok(update)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectConfig;
    use crate::error::ReleaseError;
    use crate::state::{PackageRecord, ReleaseState};
    use crate::testing::{FakeVcs, VcsCall, context};

    const VERSIONS_CFG: &str = "[versions]\nacme.theme = 1.0\nacme.themes = 4.0\n\nacme.policy=2.3\n";

    fn pins(list: &[(&str, &str)]) -> Vec<(String, String)> {
        list.iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn replaces_exact_pin_lines_only() {
        let (content, update) = apply_pins(VERSIONS_CFG, &pins(&[("acme.theme", "1.1")])).unwrap();
        assert_eq!(
            content,
            "[versions]\nacme.theme = 1.1\nacme.themes = 4.0\n\nacme.policy=2.3\n"
        );
        assert_eq!(update.replaced, vec!["acme.theme"]);
        assert!(update.ambiguous.is_empty());
    }

    #[test]
    fn dots_in_names_are_literal() {
        let (content, _) = apply_pins("acmeXtheme = 1.0\n", &pins(&[("acme.theme", "1.1")])).unwrap();
        assert_eq!(content, "acmeXtheme = 1.0\nacme.theme = 1.1\n");
    }

    #[test]
    fn duplicates_are_all_rewritten_and_flagged() {
        let content = "[versions]\n  acme.policy = 2.0\n# later\nacme.policy = 2.1\n";
        let (content, update) = apply_pins(content, &pins(&[("acme.policy", "2.4")])).unwrap();
        assert_eq!(content, "[versions]\nacme.policy = 2.4\n# later\nacme.policy = 2.4\n");
        assert_eq!(update.ambiguous, vec!["acme.policy"]);
    }

    #[test]
    fn missing_pins_are_appended_on_a_new_line() {
        let (content, update) =
            apply_pins("[versions]\nother = 1", &pins(&[("a.b", "1.0"), ("c", "2")])).unwrap();
        assert_eq!(content, "[versions]\nother = 1\na.b = 1.0\nc = 2\n");
        assert_eq!(update.appended, vec!["a.b", "c"]);
    }

    #[tokio::test]
    async fn update_writes_and_commits_pins_file() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("profiles")).unwrap();
        let pins_file = root.path().join("profiles/versions.cfg");
        std::fs::write(&pins_file, VERSIONS_CFG).unwrap();

        let vcs = FakeVcs::default();
        let mut ctx = context(root.path(), ProjectConfig::default());
        let mut state = ReleaseState::from_discovery(vec![
            PackageRecord::new("acme.theme", root.path().join("src/theme"), "1.0"),
            PackageRecord::new("acme.new", root.path().join("src/new"), "0.1"),
        ]);
        state.set_selected("acme.theme", true);
        state.set_selected("acme.new", true);
        state.record_release("acme.theme", "1.1").unwrap();
        state.record_release("acme.new", "0.1").unwrap();
        ctx.state = state;

        let update = update_pins(&mut ctx, &vcs).await.unwrap();

        assert_eq!(update.replaced, vec!["acme.theme"]);
        assert_eq!(update.appended, vec!["acme.new"]);
        let written = std::fs::read_to_string(&pins_file).unwrap();
        assert!(written.contains("acme.theme = 1.1\n"));
        assert!(written.ends_with("acme.new = 0.1\n"));
        assert_eq!(vcs.calls(), vec![VcsCall::Commit(pins_file, PINS_MESSAGE.into())]);
        assert!(ctx.state.has_completed(ReleasePhase::PinsUpdate));
    }

    #[tokio::test]
    async fn nothing_released_leaves_file_untouched() {
        let root = tempfile::tempdir().unwrap();
        let vcs = FakeVcs::default();
        let mut ctx = context(root.path(), ProjectConfig::default());

        let update = update_pins(&mut ctx, &vcs).await.unwrap();
        assert!(update.is_empty());
        assert!(vcs.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_pins_file_is_reported() {
        let root = tempfile::tempdir().unwrap();
        let mut ctx = context(root.path(), ProjectConfig::default());
        let mut state = ReleaseState::from_discovery(vec![PackageRecord::new("a", root.path(), "1.0")]);
        state.set_selected("a", true);
        state.record_release("a", "1.0").unwrap();
        ctx.state = state;

        assert!(matches!(
            update_pins(&mut ctx, &FakeVcs::default()).await,
            Err(ReleaseError::Version(VersionError::FileUpdateFailed { .. }))
        ));
    }
}
