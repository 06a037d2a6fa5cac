use k8s_openapi::api::core::v1::{PodDNSConfig, PodDNSConfigOption};
use serde::{Deserialize, Serialize};

pub const DNS_POLICY_NONE: &str = "None";

/// Listening address of the node-local DNS cache.
pub const DEFAULT_NAMESERVER: &str = "169.254.20.10";
pub const DEFAULT_CLUSTER_DOMAIN: &str = "cluster.local";
pub const DEFAULT_NDOTS: &str = "2";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsOption {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DnsPolicySettings {
    pub nameservers: Vec<String>,
    pub cluster_domain: String,
    pub options: Vec<DnsOption>,
}

impl Default for DnsPolicySettings {
    fn default() -> Self {
        Self {
            nameservers: vec![DEFAULT_NAMESERVER.to_owned()],
            cluster_domain: DEFAULT_CLUSTER_DOMAIN.to_owned(),
            options: vec![DnsOption {
                name: "ndots".to_owned(),
                value: Some(DEFAULT_NDOTS.to_owned()),
            }],
        }
    }
}

/// DNS policy and config a pod should end up with.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredDnsConfig {
    pub policy: String,
    pub config: PodDNSConfig,
}

#[derive(Debug, Clone, Default)]
pub struct DnsPolicyProvider {
    settings: DnsPolicySettings,
}

impl DnsPolicyProvider {
    pub fn new(settings: DnsPolicySettings) -> Self {
        Self { settings }
    }

    pub fn desired_config(&self, namespace: &str) -> DesiredDnsConfig {
        let domain = &self.settings.cluster_domain;

        DesiredDnsConfig {
            policy: DNS_POLICY_NONE.to_owned(),
            config: PodDNSConfig {
                nameservers: Some(self.settings.nameservers.to_owned()),
                searches: Some(vec![
                    format!("{namespace}.svc.{domain}"),
                    format!("svc.{domain}"),
                    domain.to_owned(),
                ]),
                options: Some(
                    self.settings
                        .options
                        .iter()
                        .map(|option| PodDNSConfigOption {
                            name: Some(option.name.to_owned()),
                            value: option.value.to_owned(),
                        })
                        .collect(),
                ),
            },
        }
    }
}
