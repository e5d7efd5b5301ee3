//! Periodic update check against the deployment's git remote
//!
//! Compares the local HEAD with the remote branch tip via `git ls-remote`
//! and logs when a newer revision is available. With `auto_pull` enabled it
//! also runs `git pull`. Failures are logged and the loop keeps going; an
//! unreachable remote must never take the service down.

use std::path::PathBuf;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info, warn};

/// Update checker settings
#[derive(Debug, Clone)]
pub struct UpdateCheckerConfig {
    pub enabled: bool,
    /// Repository working directory to check
    pub repo_dir: PathBuf,
    /// Branch to compare against
    pub branch: String,
    /// Seconds between checks
    pub interval_secs: u64,
    /// Run `git pull` when behind
    pub auto_pull: bool,
}

impl Default for UpdateCheckerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            repo_dir: PathBuf::from("."),
            branch: "main".to_string(),
            interval_secs: 3600,
            auto_pull: false,
        }
    }
}

/// Outcome of a single check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    UpToDate,
    /// Remote tip differs from local HEAD
    Behind { local: String, remote: String },
}

/// Spawn the background check loop. No-op when disabled.
pub fn spawn_update_checker(config: UpdateCheckerConfig) {
    if !config.enabled {
        debug!("update checker disabled");
        return;
    }

    tokio::spawn(async move {
        let interval = Duration::from_secs(config.interval_secs.max(60));
        info!(
            repo = %config.repo_dir.display(),
            branch = %config.branch,
            interval_secs = interval.as_secs(),
            "update checker started"
        );
        loop {
            match check_for_update(&config).await {
                Ok(UpdateStatus::UpToDate) => debug!("deployment is up to date"),
                Ok(UpdateStatus::Behind { local, remote }) => {
                    info!(%local, %remote, "update available");
                    if config.auto_pull {
                        if let Err(err) = pull(&config).await {
                            warn!(error = %err, "auto pull failed");
                        }
                    }
                }
                Err(err) => warn!(error = %err, "update check failed"),
            }
            tokio::time::sleep(interval).await;
        }
    });
}

/// Compare local HEAD with the remote branch tip.
pub async fn check_for_update(config: &UpdateCheckerConfig) -> std::io::Result<UpdateStatus> {
    let local = git(&config.repo_dir, &["rev-parse", "HEAD"]).await?;
    let remote_line = git(
        &config.repo_dir,
        &["ls-remote", "origin", &config.branch],
    )
    .await?;
    let remote = remote_line
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string();

    if remote.is_empty() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("remote branch {} not found", config.branch),
        ));
    }

    if local == remote {
        Ok(UpdateStatus::UpToDate)
    } else {
        Ok(UpdateStatus::Behind { local, remote })
    }
}

async fn pull(config: &UpdateCheckerConfig) -> std::io::Result<()> {
    let output = git(&config.repo_dir, &["pull", "origin", &config.branch]).await?;
    info!(output = %output, "pulled latest revision");
    Ok(())
}

async fn git(repo_dir: &PathBuf, args: &[&str]) -> std::io::Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_dir)
        .output()
        .await?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(std::io::Error::other(format!(
            "git {} failed: {}",
            args.first().unwrap_or(&""),
            stderr.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
