use anyhow::{Context, Result};
use hc_core::InstallTarget;
use std::path::Path;
use tokio::process::Command;
use tracing::info;

/// Writes rulesets to their installed location and triggers the reload
pub struct RulesetInstaller;

impl RulesetInstaller {
    pub fn new() -> Self {
        Self
    }

    /// Currently installed ruleset, or `None` if nothing is installed yet
    pub async fn read_installed(&self, path: &Path) -> Result<Option<String>> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read installed ruleset {:?}", path)),
        }
    }

    /// Write the ruleset and run the reload command
    pub async fn install(&self, target: &InstallTarget, ruleset: &str) -> Result<()> {
        if let Some(parent) = target.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }

        tokio::fs::write(&target.path, ruleset)
            .await
            .with_context(|| format!("Failed to write ruleset to {:?}", target.path))?;
        info!(path = %target.path.display(), "wrote ruleset");

        self.reload(target).await
    }

    async fn reload(&self, target: &InstallTarget) -> Result<()> {
        let (program, args) = target
            .reload
            .split_first()
            .context("Reload command is empty")?;

        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .with_context(|| format!("Failed to spawn reload command '{}'", program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Reload command '{}' failed: {}", target.reload.join(" "), stderr.trim());
        }

        info!(command = %target.reload.join(" "), "reloaded ruleset");
        Ok(())
    }
}

impl Default for RulesetInstaller {
    fn default() -> Self {
        Self::new()
    }
}
