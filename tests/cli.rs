use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::tempdir;

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("mkdir");
    }
    fs::write(path, content).expect("write");
}

/// Umbrella project whose packages answer name/version queries from plain files
fn create_project(root: &Path) {
    write_file(
        &root.join("deploy.toml"),
        r#"
project_name = "acme"

[tool]
name_command = "cat NAME"
version_command = "cat VERSION"

[environments.qa]
hosts = ["qa01"]
base_path = "/var/db/zope/dev"
buildout_name = "acme"
supervisor_processes = ["instance"]

[environments.broken]
hosts = ["qa01"]
"#,
    );
    for (dir, name, version) in [("acme.theme", "acme.theme", "1.4"), ("policy", "acme policy", "0.9")] {
        write_file(&root.join("src").join(dir).join("NAME"), &format!("{}\n", name));
        write_file(&root.join("src").join(dir).join("VERSION"), &format!("{}\n", version));
    }
    fs::create_dir_all(root.join("src/.svn")).expect("mkdir");
    write_file(&root.join("src/README.txt"), "not a package\n");
}

fn release_rollout(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("release_rollout"));
    cmd.current_dir(dir)
        .env_remove("RELEASE_ROLLOUT_CONFIG")
        .env_remove("RELEASE_ROLLOUT_TAG")
        .env("NO_COLOR", "1");
    cmd
}

#[test]
fn help_lists_the_cycle_commands() {
    let td = tempdir().expect("tempdir");
    release_rollout(td.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("deploy"))
        .stdout(contains("bump-versions"))
        .stdout(contains("tag-umbrella"))
        .stdout(contains("rollout"));
}

#[test]
fn discover_lists_packages_in_name_order() {
    let td = tempdir().expect("tempdir");
    create_project(td.path());

    release_rollout(td.path())
        .arg("discover")
        .assert()
        .success()
        .stdout(contains("acme.theme 1.4"))
        .stdout(contains("acme-policy 0.9"))
        .stdout(contains(".svn").not())
        .stdout(contains("README").not());
}

#[test]
fn missing_configuration_is_a_config_error() {
    let td = tempdir().expect("tempdir");
    release_rollout(td.path())
        .arg("discover")
        .assert()
        .code(3)
        .stderr(contains("deploy.toml"));
}

#[test]
fn stage_without_saved_cycle_points_at_select() {
    let td = tempdir().expect("tempdir");
    create_project(td.path());

    release_rollout(td.path())
        .arg("release")
        .assert()
        .code(1)
        .stderr(contains("No release in progress"))
        .stdout(contains("Run `select` first"));
}

#[test]
fn unknown_environment_fails_before_any_host() {
    let td = tempdir().expect("tempdir");
    create_project(td.path());

    release_rollout(td.path())
        .args(["rollout", "staging", "--tag", "1.0"])
        .assert()
        .code(3)
        .stderr(contains("Unknown environment 'staging'"));
}

#[test]
fn incomplete_environment_is_a_config_error() {
    let td = tempdir().expect("tempdir");
    create_project(td.path());

    release_rollout(td.path())
        .args(["deploy", "broken"])
        .assert()
        .code(3)
        .stderr(contains("no base_path configured"));
}

#[test]
fn status_and_abandon_without_saved_cycle() {
    let td = tempdir().expect("tempdir");

    release_rollout(td.path())
        .arg("status")
        .assert()
        .success()
        .stdout(contains("No release cycle in progress"));

    release_rollout(td.path())
        .args(["status", "--json"])
        .assert()
        .success()
        .stdout(contains("no_active_release"));

    release_rollout(td.path())
        .args(["abandon", "--yes"])
        .assert()
        .success()
        .stdout(contains("No release cycle to abandon"));
}

#[test]
fn blank_target_is_rejected() {
    let td = tempdir().expect("tempdir");
    release_rollout(td.path())
        .args(["deploy", " "])
        .assert()
        .code(1)
        .stderr(contains("Invalid arguments"));
}
