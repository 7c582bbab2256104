//! Shared fixture: a git layer repository with `sh` collaborators and a git
//! registry holding two documents.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

const SETUP_SCRIPT: &str = r#"#!/bin/sh
# setup -c <template> -b <builddir> --no-shell
template="$3"
builddir="$5"
layerdir="$(cd "$(dirname "$0")/.." && pwd)"
mkdir -p "$builddir/conf"
echo "Configuration summary for $template" > "$builddir/conf/conf-summary.txt"
cat > "$builddir/init-build-env" <<ENV
export BBPATH="$builddir"
export PATH="$layerdir/scripts:\$PATH"
ENV
"#;

const CONFIG_SCRIPT: &str = r#"#!/bin/sh
# enable-fragment <fragment>
echo "$2" > "$BBPATH/conf/$2"
"#;

const DOC: &str = r#"{
    "description": "Test configuration",
    "sources": {
        "test-repo": {
            "git-remote": {
                "remotes": {
                    "origin": {
                        "uri": "file://@LAYER@"
                    }
                },
                "rev": "master"
            },
            "path": "test-repo"
        }
    },
    "bitbake-setup": {
        "configuration": {
            "gadget": {
                "description": "Gadget build configuration",
                "oe-template": "test-configuration-gadget",
                "oe-fragments": ["test-fragment-1"],
                "targets": ["some-target-executable-1"]
            },
            "gizmo": {
                "description": "Gizmo build configuration",
                "oe-template": "test-configuration-gizmo",
                "oe-fragments": ["test-fragment-2"],
                "targets": ["some-target-executable-2"]
            }
        }
    },
    "version": "1.0"
}
"#;

pub fn git(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args([
            "-c",
            "user.name=Test",
            "-c",
            "user.email=test@example.com",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .output()
        .expect("run git");
    assert!(
        out.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).trim().to_string()
}

pub fn commit_all(dir: &Path, message: &str) -> String {
    git(dir, &["add", "-A"]);
    git(dir, &["commit", "--quiet", "-m", message]);
    git(dir, &["rev-parse", "HEAD"])
}

fn write_exec(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

fn init_repo(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    git(dir, &["init", "--quiet"]);
    git(dir, &["symbolic-ref", "HEAD", "refs/heads/master"]);
}

pub struct Fixture {
    pub tmp: TempDir,
    pub home: PathBuf,
    pub top: PathBuf,
    pub layer: PathBuf,
    pub registry: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let tmp = TempDir::new().expect("tmp");
        let home = tmp.path().join("home");
        fs::create_dir_all(&home).unwrap();

        let layer = tmp.path().join("test-repo");
        init_repo(&layer);
        write_exec(&layer.join("scripts/oe-setup-build"), SETUP_SCRIPT);
        write_exec(&layer.join("bin/bitbake-config-build"), CONFIG_SCRIPT);
        for n in 1..=2 {
            write_exec(
                &layer.join(format!("scripts/some-target-executable-{n}")),
                &format!(
                    "#!/bin/sh\necho \"This is some-target-executable-{n}\"\necho \"BBPATH is $BBPATH\"\n"
                ),
            );
        }
        fs::write(layer.join("test-file"), "initial\n").unwrap();
        commit_all(&layer, "initial");

        let registry = tmp.path().join("registry");
        init_repo(&registry);
        let doc = DOC.replace("@LAYER@", &layer.display().to_string());
        fs::write(registry.join("test-config-1.conf.json"), &doc).unwrap();
        fs::create_dir_all(registry.join("config-2")).unwrap();
        fs::write(registry.join("config-2/test-config-2.conf.json"), &doc).unwrap();
        fs::write(registry.join("README.md"), "not a document\n").unwrap();
        commit_all(&registry, "add configurations");

        let top = tmp.path().join("top");
        Self {
            home,
            top,
            layer,
            registry,
            tmp,
        }
    }

    pub fn registry_spec(&self) -> String {
        format!(
            "git://{};protocol=file;branch=master;rev=master",
            self.registry.display()
        )
    }

    /// `buildsetup --top-dir <top> …` with an isolated home.
    pub fn cmd(&self) -> Command {
        let mut cmd = self.bare_cmd();
        cmd.arg("--top-dir").arg(&self.top);
        cmd
    }

    /// `buildsetup …` with an isolated home, run from the temp root.
    pub fn bare_cmd(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("buildsetup"));
        cmd.env("HOME", &self.home)
            .env("XDG_CONFIG_HOME", self.home.join(".config"))
            .env("NO_COLOR", "1")
            .env_remove("BBPATH")
            .env_remove("RUST_LOG")
            .current_dir(self.tmp.path());
        cmd
    }

    /// Point the settings at the fixture registry.
    pub fn configure(&self) {
        let status = self
            .cmd()
            .args(["change-setting", "default", "registry", &self.registry_spec()])
            .output()
            .expect("change-setting");
        assert!(status.status.success());
    }

    pub fn build_dir(&self) -> PathBuf {
        self.top.join("test-config-1")
    }
}
