//! Git source gateway.
//!
//! Uses the system `git`, so SSH keys, credential helpers and anything else
//! configured in `~/.gitconfig` apply unchanged.
//!
//! ## `sync` protocol
//!
//! 1. Resolve the revision against the remote (`git ls-remote`). Branch names
//!    are never cached, so an unchanged branch name can resolve to a new commit.
//! 2. Absent working copy: `git clone --no-checkout`.
//!    Present working copy: refuse if tracked files are modified, point
//!    `origin` at the current URL and fetch.
//! 3. Make sure the commit object is present, fetching it explicitly if the
//!    remote's default refspec didn't bring it in.
//! 4. Refuse if the working copy sits on a local branch carrying commits that
//!    no remote ref or tag contains.
//! 5. `git checkout --detach <commit>`.
//!
//! A fresh clone that fails at any later step is removed again so that the
//! next run starts from scratch instead of tripping over a half-made copy.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use buildsetup_core::RemoteSpec;

use crate::error::{source_err, SyncError};

/// Result of [`sync`]: the commit before and after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    /// `None` when the working copy was freshly cloned.
    pub previous: Option<String>,
    pub current: String,
}

/// A revision resolved against a remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub commit: String,
    /// The remote ref the commit came from; `None` for raw commit ids.
    pub reference: Option<String>,
}

/// Clone or update `dest` to `revision` of `remote`.
pub fn sync(
    source_name: &str,
    remote: &RemoteSpec,
    revision: &str,
    dest: &Path,
) -> Result<SyncOutcome, SyncError> {
    let fresh = !dest.exists();
    let result = sync_inner(source_name, remote, revision, dest, fresh);
    if fresh && result.is_err() && dest.exists() {
        tracing::info!("removing incomplete clone {}", dest.display());
        let _ = std::fs::remove_dir_all(dest);
    }
    result
}

fn sync_inner(
    source_name: &str,
    remote: &RemoteSpec,
    revision: &str,
    dest: &Path,
    fresh: bool,
) -> Result<SyncOutcome, SyncError> {
    let err = |cause: String| source_err(source_name, cause);
    let resolved = resolve(source_name, remote, revision)?;

    let previous = if fresh {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| err(format!("cannot create {}: {e}", parent.display())))?;
        }
        tracing::info!("cloning {} into {}", remote.url, dest.display());
        run(
            None,
            &[
                os("clone"),
                os("--quiet"),
                os("--no-checkout"),
                os(&remote.url),
                dest.as_os_str().to_owned(),
            ],
            &[],
        )
        .map_err(err)?;
        None
    } else {
        if !dest.join(".git").exists() {
            return Err(err(format!(
                "{} exists but is not a git working copy",
                dest.display()
            )));
        }
        let dirty = run_in(dest, &["status", "--porcelain", "--untracked-files=no"]).map_err(err)?;
        if !dirty.trim().is_empty() {
            return Err(err(format!(
                "local working copy {} has uncommitted changes:\n{}",
                dest.display(),
                dirty.trim_end()
            )));
        }
        let head = head_commit(dest).map_err(err)?;
        run_in(dest, &["remote", "set-url", "origin", remote.url.as_str()])
            .or_else(|_| run_in(dest, &["remote", "add", "origin", remote.url.as_str()]))
            .map_err(err)?;
        tracing::info!("fetching {} into {}", remote.url, dest.display());
        run_in(dest, &["fetch", "--quiet", "--force", "--prune", "--tags", "origin"]).map_err(err)?;
        head
    };

    ensure_commit(dest, remote, &resolved, &[]).map_err(err)?;

    if !fresh && diverged(dest).map_err(err)? {
        return Err(err(format!(
            "local working copy {} has commits not present on {}",
            dest.display(),
            remote.url
        )));
    }

    if previous.as_deref() != Some(resolved.commit.as_str()) {
        tracing::info!("checking out {revision} ({}) in {}", resolved.commit, dest.display());
        run_in(dest, &["checkout", "--quiet", "--detach", resolved.commit.as_str()]).map_err(err)?;
    }

    Ok(SyncOutcome {
        previous,
        current: resolved.commit,
    })
}

/// Resolve `revision` on `remote` without touching any working copy.
///
/// A 40-hex revision is taken as a commit id. Otherwise `refs/heads/<rev>`
/// wins over a peeled tag, which wins over a plain tag.
pub fn resolve(
    source_name: &str,
    remote: &RemoteSpec,
    revision: &str,
) -> Result<Resolved, SyncError> {
    if is_commit_id(revision) {
        return Ok(Resolved {
            commit: revision.to_ascii_lowercase(),
            reference: None,
        });
    }
    let listing = run(None, &[os("ls-remote"), os(&remote.url), os(revision)], &[])
        .map_err(|cause| source_err(source_name, cause))?;
    pick_ref(&listing, revision).ok_or_else(|| {
        source_err(
            source_name,
            format!("revision '{revision}' not found on {}", remote.url),
        )
    })
}

/// `HEAD` of a working copy, or `None` if it has no commits checked out.
pub fn head_commit(repo: &Path) -> Result<Option<String>, String> {
    match run_in(repo, &["rev-parse", "--verify", "--quiet", "HEAD^{commit}"]) {
        Ok(out) if !out.trim().is_empty() => Ok(Some(out.trim().to_string())),
        Ok(_) => Ok(None),
        Err(_) if repo.join(".git").exists() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Files whose content differs between two commits, as repo-relative paths.
pub fn changed_files(
    repo: &Path,
    old: &str,
    new: &str,
    env: &[(OsString, OsString)],
) -> Result<Vec<PathBuf>, String> {
    let out = run(
        Some(repo),
        &[
            os("diff"),
            os("--name-only"),
            os("--no-renames"),
            os(old),
            os(new),
        ],
        env,
    )?;
    Ok(out
        .lines()
        .filter(|l| !l.is_empty())
        .map(PathBuf::from)
        .collect())
}

/// Content of `path` at `commit`, or `None` if it doesn't exist there.
pub fn file_at(
    repo: &Path,
    commit: &str,
    path: &Path,
    env: &[(OsString, OsString)],
) -> Result<Option<String>, String> {
    let spec = format!("{commit}:{}", path.to_string_lossy().replace('\\', "/"));
    let exists = run(
        Some(repo),
        &[os("cat-file"), os("-e"), os(&spec)],
        env,
    );
    if exists.is_err() {
        return Ok(None);
    }
    run(Some(repo), &[os("show"), os(&spec)], env).map(Some)
}

/// Make `resolved.commit` available in `repo`'s object database.
///
/// Only objects are fetched; no ref, `FETCH_HEAD` or working tree is touched.
pub fn ensure_commit(
    repo: &Path,
    remote: &RemoteSpec,
    resolved: &Resolved,
    env: &[(OsString, OsString)],
) -> Result<(), String> {
    let probe = format!("{}^{{commit}}", resolved.commit);
    if run(Some(repo), &[os("cat-file"), os("-e"), os(&probe)], env).is_ok() {
        return Ok(());
    }
    let want = resolved.reference.as_deref().unwrap_or(&resolved.commit);
    tracing::debug!("fetching {want} from {} into {}", remote.url, repo.display());
    run(
        Some(repo),
        &[
            os("-c"),
            os("gc.auto=0"),
            os("-c"),
            os("maintenance.auto=false"),
            os("fetch"),
            os("--quiet"),
            os("--no-tags"),
            os("--no-write-fetch-head"),
            os(&remote.url),
            os(want),
        ],
        env,
    )?;
    run(Some(repo), &[os("cat-file"), os("-e"), os(&probe)], env)
        .map(|_| ())
        .map_err(|_| format!("commit {} not available from {}", resolved.commit, remote.url))
}

/// A throwaway object store layered over a working copy's own.
///
/// Objects fetched through [`ScratchObjects::env`] land in a temp dir, so a
/// read-only comparison can inspect commits the working copy doesn't have yet
/// without modifying it.
pub struct ScratchObjects {
    dir: TempDir,
    alternates: PathBuf,
}

impl ScratchObjects {
    pub fn new(repo: &Path) -> std::io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("buildsetup-objects").tempdir()?;
        std::fs::create_dir_all(dir.path().join("pack"))?;
        std::fs::create_dir_all(dir.path().join("info"))?;
        Ok(Self {
            dir,
            alternates: repo.join(".git").join("objects"),
        })
    }

    pub fn env(&self) -> Vec<(OsString, OsString)> {
        vec![
            (
                os("GIT_OBJECT_DIRECTORY"),
                self.dir.path().as_os_str().to_owned(),
            ),
            (
                os("GIT_ALTERNATE_OBJECT_DIRECTORIES"),
                self.alternates.as_os_str().to_owned(),
            ),
        ]
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn is_commit_id(revision: &str) -> bool {
    revision.len() == 40 && revision.chars().all(|c| c.is_ascii_hexdigit())
}

/// Pick the best match for `revision` out of `git ls-remote` output
/// (`<sha>\t<ref>` per line).
fn pick_ref(listing: &str, revision: &str) -> Option<Resolved> {
    let refs: Vec<(&str, &str)> = listing
        .lines()
        .filter_map(|line| line.split_once('\t'))
        .map(|(sha, r)| (sha.trim(), r.trim()))
        .collect();
    let candidates = [
        revision.to_string(),
        format!("refs/heads/{revision}"),
        format!("refs/tags/{revision}^{{}}"),
        format!("refs/tags/{revision}"),
    ];
    candidates.iter().find_map(|wanted| {
        refs.iter().find(|(_, r)| r == wanted).map(|(sha, r)| Resolved {
            commit: sha.to_string(),
            reference: Some(r.trim_end_matches("^{}").to_string()),
        })
    })
}

/// On a local branch holding commits that no remote-tracking ref or tag
/// contains.
fn diverged(repo: &Path) -> Result<bool, String> {
    if run_in(repo, &["symbolic-ref", "--quiet", "HEAD"]).is_err() {
        return Ok(false);
    }
    if head_commit(repo)?.is_none() {
        return Ok(false);
    }
    let containing = run_in(
        repo,
        &[
            "for-each-ref",
            "--contains",
            "HEAD",
            "--format=%(refname)",
            "refs/remotes",
            "refs/tags",
        ],
    )?;
    Ok(containing.trim().is_empty())
}

fn os(s: &str) -> OsString {
    OsStr::new(s).to_owned()
}

fn run_in(repo: &Path, args: &[&str]) -> Result<String, String> {
    let args: Vec<OsString> = args.iter().map(|a| os(a)).collect();
    run(Some(repo), &args, &[])
}

/// Run git, returning stdout on success and a readable message on failure.
fn run(
    repo: Option<&Path>,
    args: &[OsString],
    env: &[(OsString, OsString)],
) -> Result<String, String> {
    let mut cmd = Command::new("git");
    if let Some(repo) = repo {
        cmd.arg("-C").arg(repo);
    }
    cmd.args(args).env("GIT_TERMINAL_PROMPT", "0");
    for (k, v) in env {
        cmd.env(k, v);
    }
    let rendered = format!(
        "git {}",
        args.iter()
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    );
    tracing::debug!("running {rendered}");

    let output = cmd
        .output()
        .map_err(|e| format!("failed to run `{rendered}`: {e}"))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("`{rendered}` failed: {}", stderr.trim()));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
1111111111111111111111111111111111111111\trefs/heads/master
2222222222222222222222222222222222222222\trefs/remotes/origin/master
3333333333333333333333333333333333333333\trefs/tags/v1
4444444444444444444444444444444444444444\trefs/tags/v1^{}
";

    #[test]
    fn branch_head_wins_over_remote_tracking_refs() {
        let r = pick_ref(LISTING, "master").unwrap();
        assert_eq!(r.commit, "1111111111111111111111111111111111111111");
        assert_eq!(r.reference.as_deref(), Some("refs/heads/master"));
    }

    #[test]
    fn annotated_tags_are_peeled() {
        let r = pick_ref(LISTING, "v1").unwrap();
        assert_eq!(r.commit, "4444444444444444444444444444444444444444");
        assert_eq!(r.reference.as_deref(), Some("refs/tags/v1"));
    }

    #[test]
    fn unknown_revision_resolves_to_nothing() {
        assert!(pick_ref(LISTING, "nope").is_none());
        assert!(pick_ref("", "master").is_none());
    }

    #[test]
    fn commit_ids_are_recognised() {
        assert!(is_commit_id("0123456789abcdef0123456789ABCDEF01234567"));
        assert!(!is_commit_id("master"));
        assert!(!is_commit_id("0123456"));
    }

    #[test]
    fn commit_id_revision_skips_the_remote() {
        let remote = RemoteSpec::parse("file:///does/not/exist").unwrap();
        let sha = "ABCDEF0123456789ABCDEF0123456789ABCDEF01";
        let r = resolve("s", &remote, sha).unwrap();
        assert_eq!(r.commit, sha.to_ascii_lowercase());
        assert!(r.reference.is_none());
    }
}
