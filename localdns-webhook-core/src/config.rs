use std::{borrow::Cow, collections::BTreeSet, net::IpAddr, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{dns::DnsPolicySettings, NAMESPACE_PUBLIC, NAMESPACE_SYSTEM};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Couldn't read the config file! Reason: {}", .0)]
    Read(std::io::Error),
    #[error("Couldn't parse the config file! Reason: {}", .0)]
    Parse(serde_yaml::Error),
    #[error("Config contains invalid data ({})!", .0)]
    InvalidData(Cow<'static, str>),
}

/// Immutable webhook configuration, fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebhookConfig {
    pub ignored_namespaces: BTreeSet<String>,
    pub dns: DnsPolicySettings,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            ignored_namespaces: BTreeSet::from([
                NAMESPACE_SYSTEM.to_owned(),
                NAMESPACE_PUBLIC.to_owned(),
            ]),
            dns: DnsPolicySettings::default(),
        }
    }
}

impl WebhookConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(ConfigError::Read)?;

        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(raw).map_err(ConfigError::Parse)?;

        config.validated()
    }

    pub fn validated(self) -> Result<Self, ConfigError> {
        if self.dns.nameservers.is_empty() {
            return Err(ConfigError::InvalidData("at least one nameserver is required".into()));
        }

        if let Some(nameserver) = self
            .dns
            .nameservers
            .iter()
            .find(|nameserver| nameserver.parse::<IpAddr>().is_err())
        {
            return Err(ConfigError::InvalidData(
                format!("'{nameserver}' is not an IP address").into(),
            ));
        }

        if self.dns.cluster_domain.trim().is_empty() {
            return Err(ConfigError::InvalidData("cluster domain can't be empty".into()));
        }

        if self.dns.options.iter().any(|option| option.name.is_empty()) {
            return Err(ConfigError::InvalidData("DNS options must be named".into()));
        }

        Ok(self)
    }
}
