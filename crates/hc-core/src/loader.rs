use crate::config::HostConfig;
use crate::error::ConfigError;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load a single YAML fragment
    pub fn load_file(&self, path: &Path) -> Result<HostConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        HostConfig::from_yaml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load and merge every `*.yaml`/`*.yml` fragment in a directory, in file name order
    pub fn load_dir(&self, dir: &Path) -> Result<HostConfig, ConfigError> {
        let entries = std::fs::read_dir(dir).map_err(|source| ConfigError::Read {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut fragments: Vec<PathBuf> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| ConfigError::Read {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();

            if matches!(
                path.extension().and_then(|s| s.to_str()),
                Some("yaml") | Some("yml")
            ) {
                fragments.push(path);
            }
        }

        if fragments.is_empty() {
            return Err(ConfigError::Empty(dir.to_path_buf()));
        }

        fragments.sort();
        self.load_files(&fragments)
    }

    /// Load fragments in the given order, later ones layered over earlier ones
    pub fn load_files(&self, paths: &[PathBuf]) -> Result<HostConfig, ConfigError> {
        let mut config = HostConfig::default();
        for path in paths {
            debug!(path = %path.display(), "loading config fragment");
            config.merge(self.load_file(path)?);
        }
        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("hc-core-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn merges_fragments_in_name_order() {
        let dir = scratch_dir("loader-order");
        std::fs::write(
            dir.join("20-web.yaml"),
            "firewall:\n  iptables:\n    accept: [\"any\", \"443\"]\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("10-base.yml"),
            "firewall:\n  iptables:\n    accept: [\"any\", \"22\"]\n",
        )
        .unwrap();
        std::fs::write(dir.join("README.txt"), "not yaml").unwrap();

        let config = ConfigLoader::new().load_dir(&dir).expect("fragments load");
        assert_eq!(config.firewall.iptables.accept, vec!["any", "22", "any", "443"]);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn empty_dir_is_an_error() {
        let dir = scratch_dir("loader-empty");
        let err = ConfigLoader::new().load_dir(&dir).unwrap_err();
        assert!(matches!(err, ConfigError::Empty(_)));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn reports_parse_errors_with_path() {
        let dir = scratch_dir("loader-bad");
        let path = dir.join("bad.yaml");
        std::fs::write(&path, "firewall: [unterminated").unwrap();

        let err = ConfigLoader::new().load_file(&path).unwrap_err();
        match err {
            ConfigError::Parse { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("unexpected error: {:?}", other),
        }
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
