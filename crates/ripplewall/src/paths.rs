use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use directories_next::ProjectDirs;

pub const ENV_CONFIG_DIR: &str = "RIPPLEWALL_CONFIG_DIR";
pub const CONFIG_FILE_NAME: &str = "ripplewall.toml";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "ripplewall";
const APPLICATION: &str = "ripplewall";

#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
}

impl AppPaths {
    /// Resolves the config directory, preferring `RIPPLEWALL_CONFIG_DIR`.
    pub fn discover() -> Result<Self> {
        if let Some(config_dir) = env_override(ENV_CONFIG_DIR) {
            return Ok(Self { config_dir });
        }
        let project_dirs = ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
            .ok_or_else(|| anyhow!("failed to determine user directories"))?;
        Ok(Self {
            config_dir: project_dirs.config_dir().to_path_buf(),
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE_NAME)
    }

    /// The default config file, if one has been created.
    pub fn existing_config_file(&self) -> Option<PathBuf> {
        let path = self.config_file();
        path.is_file().then_some(path)
    }
}

#[cfg(test)]
impl AppPaths {
    pub fn from_raw(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }
}

fn env_override(var: &str) -> Option<PathBuf> {
    env::var_os(var)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_file_lives_in_config_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let paths = AppPaths::from_raw(dir.path().to_path_buf());
        assert_eq!(paths.config_file(), dir.path().join("ripplewall.toml"));
        assert_eq!(paths.existing_config_file(), None);

        std::fs::write(paths.config_file(), "version = 1").unwrap();
        assert_eq!(paths.existing_config_file(), Some(paths.config_file()));
        assert_eq!(paths.config_dir(), dir.path());
    }
}
