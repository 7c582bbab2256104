mod common;

use std::fs;

use assert_cmd::prelude::*;
use predicates::str::contains;

use common::Fixture;

#[test]
fn reset_settings_prints_settings_path() {
    let fx = Fixture::new();
    let path = fx.top.join("buildsetup.conf");
    fx.cmd()
        .arg("reset-settings")
        .assert()
        .success()
        .stdout(contains(format!("Settings written to {}", path.display())));
    let written = fs::read_to_string(&path).expect("settings file");
    assert!(written.contains("default:"));
    assert!(written.contains("top-dir:"));
}

#[test]
fn change_setting_reports_new_value() {
    let fx = Fixture::new();
    let spec = fx.registry_spec();
    fx.cmd()
        .args(["change-setting", "default", "registry", &spec])
        .assert()
        .success()
        .stdout(contains(format!(
            "Setting 'registry' in section 'default' is changed to '{spec}'"
        )))
        .stdout(contains("New settings written to"));

    fx.cmd()
        .arg("show-settings")
        .assert()
        .success()
        .stdout(contains(format!("registry = {spec}")))
        .stdout(contains("Read from"));
}

#[test]
fn change_setting_can_create_a_new_profile() {
    let fx = Fixture::new();
    fx.cmd()
        .args(["--profile", "nightly", "change-setting", "nightly", "registry", "/srv/r"])
        .assert()
        .success();
    fx.cmd()
        .args(["--profile", "nightly", "show-settings"])
        .assert()
        .success()
        .stdout(contains("[nightly]"))
        .stdout(contains("registry = /srv/r"));
}

#[test]
fn show_settings_without_files_uses_defaults() {
    let fx = Fixture::new();
    fx.cmd()
        .arg("show-settings")
        .assert()
        .success()
        .stdout(contains("top-dir = "))
        .stdout(contains("No settings file found"));
}
