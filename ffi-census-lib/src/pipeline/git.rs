use crate::Result;
use core::time::Duration;
use ohno::{IntoAppError, bail};
use std::fs;
use std::path::Path;
use std::process::{Output, Stdio};
use tokio::process::Command;

const LOG_TARGET: &str = "       git";

const GIT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Shallow, single-revision clone of the default branch.
pub async fn clone_full(repo_path: &Path, repo_url: &str) -> Result<()> {
    let path_str = repo_path.to_str().into_app_err("invalid UTF-8 in repository path")?;

    log::info!(target: LOG_TARGET, "Cloning '{repo_url}'");
    let output = run_git_with_timeout(&["clone", "--depth=1", "--single-branch", "--no-tags", repo_url, path_str]).await?;
    check_git_output(&output, "git clone")
}

/// Shallow clone that only materializes `paths`.
///
/// The clone starts blobless and without a checkout; the sparse patterns are then
/// written and the index is populated, so only the listed files are ever downloaded.
pub async fn clone_sparse(repo_path: &Path, repo_url: &str, paths: &[String]) -> Result<()> {
    let path_str = repo_path.to_str().into_app_err("invalid UTF-8 in repository path")?;

    log::info!(target: LOG_TARGET, "Sparse-cloning '{repo_url}' ({} paths)", paths.len());
    let output = run_git_with_timeout(&[
        "clone",
        "--filter=blob:none",
        "--no-checkout",
        "--depth=1",
        "--single-branch",
        "--no-tags",
        repo_url,
        path_str,
    ])
    .await?;
    check_git_output(&output, "git clone")?;

    let output = run_git_with_timeout(&["-C", path_str, "config", "core.sparseCheckout", "true"]).await?;
    check_git_output(&output, "git config")?;

    let info_dir = repo_path.join(".git").join("info");
    fs::create_dir_all(&info_dir).into_app_err_with(|| format!("could not create directory '{}'", info_dir.display()))?;

    let patterns: String = paths.iter().map(|p| sparse_pattern(p) + "\n").collect();
    let patterns_path = info_dir.join("sparse-checkout");
    fs::write(&patterns_path, patterns).into_app_err_with(|| format!("could not write '{}'", patterns_path.display()))?;

    let output = run_git_with_timeout(&["-C", path_str, "read-tree", "-mu", "HEAD"]).await?;
    check_git_output(&output, "git read-tree")
}

/// Turn a manifest path into a root-anchored, literal sparse-checkout pattern.
fn sparse_pattern(path: &str) -> String {
    let path = path.trim_start_matches('/');
    let mut pattern = String::with_capacity(path.len() + 1);
    pattern.push('/');

    for c in path.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\' | '!' | '#') {
            pattern.push('\\');
        }
        pattern.push(c);
    }

    pattern
}

fn check_git_output(output: &Output, operation: &str) -> Result<()> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("{operation} failed: {}", stderr.trim());
    }
    Ok(())
}

async fn run_git_with_timeout(args: &[&str]) -> Result<Output> {
    let child = Command::new("git")
        .args(args)
        .env_remove("GIT_DIR")
        .env_remove("GIT_WORK_TREE")
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .into_app_err("could not spawn git command")?;

    match tokio::time::timeout(GIT_TIMEOUT, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(e).into_app_err_with(|| format!("'git {}' failed to run", args.join(" "))),
        Err(_) => {
            bail!("'git {}' timed out after {} seconds", args.join(" "), GIT_TIMEOUT.as_secs());
        }
    }
}
