use crate::core::registry::{default_families, FamilySpec};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failure read file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid yaml in {path}: {source}")]
    Yaml {
        path: String,
        source: serde_yaml::Error,
    },
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Profiles {
    pub active: String,
}

// Shape of application.yml: only names the active profile.
#[derive(Serialize, Deserialize, Debug)]
pub struct EnvConfig {
    pub profiles: Profiles,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Bootstrap {
    pub server: Server,
    pub poll: Poll,
    pub notify_on_change: bool,
    pub families: Option<Vec<FamilySpec>>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Server {
    pub addr: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Poll {
    pub interval_secs: u64,
    pub freshness_secs: u64,
    pub timeout_secs: u64,
}

impl Default for Server {
    fn default() -> Self {
        Server {
            addr: "127.0.0.1:3000".to_string(),
        }
    }
}

impl Default for Poll {
    fn default() -> Self {
        Poll {
            interval_secs: 30,
            freshness_secs: 60,
            timeout_secs: 15,
        }
    }
}

impl Default for Bootstrap {
    fn default() -> Self {
        Bootstrap {
            server: Server::default(),
            poll: Poll::default(),
            notify_on_change: true,
            families: None,
        }
    }
}

impl Poll {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn freshness(&self) -> Duration {
        Duration::from_secs(self.freshness_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl Bootstrap {
    /// Configured families, or the built-in catalog when none are listed.
    pub fn families(&self) -> Vec<FamilySpec> {
        match &self.families {
            Some(families) if !families.is_empty() => families.clone(),
            _ => default_families(),
        }
    }
}

pub fn load_config<T>(path: impl AsRef<Path>) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    serde_yaml::from_str::<T>(&raw).map_err(|source| ConfigError::Yaml {
        path: path.display().to_string(),
        source,
    })
}

/// Resolve `application.yml` in `dir` to the active profile, then load
/// `application-{active}.yml`. Failures are logged and yield `None`.
pub fn load_bootstrap_config_from(dir: impl AsRef<Path>) -> Option<Bootstrap> {
    let dir = dir.as_ref();
    let env = match load_config::<EnvConfig>(dir.join("application.yml")) {
        Ok(env) => env,
        Err(err) => {
            info!("{}", err);
            return None;
        }
    };
    let path = dir.join(format!("application-{}.yml", env.profiles.active));
    match load_config::<Bootstrap>(path) {
        Ok(config) => Some(config),
        Err(err) => {
            info!("{}", err);
            None
        }
    }
}

pub fn load_bootstrap_config() -> Option<Bootstrap> {
    load_bootstrap_config_from(".")
}
