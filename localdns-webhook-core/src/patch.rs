use std::collections::BTreeMap;

use json_patch::{AddOperation, Patch, PatchOperation, ReplaceOperation};
use k8s_openapi::api::core::v1::{Pod, PodDNSConfig};
use serde_json::Value;
use thiserror::Error;

use crate::dns::DesiredDnsConfig;

pub const DNS_POLICY_PATH: &str = "/spec/dnsPolicy";
pub const DNS_CONFIG_PATH: &str = "/spec/dnsConfig";
pub const ANNOTATIONS_PATH: &str = "/metadata/annotations";

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("Couldn't serialize the patch value! Reason: {}", .0)]
    ValueSerialization(serde_json::Error),
}

/// Builds the JSON patch moving `pod` to the desired DNS setup and stamping
/// it with `new_annotations`.
///
/// Operations are emitted in a stable order: DNS policy, DNS config and
/// finally annotations.
pub fn build_patch(
    pod: &Pod,
    desired: &DesiredDnsConfig,
    new_annotations: &BTreeMap<String, String>,
) -> Result<Patch, PatchError> {
    let current_dns_config = pod.spec.as_ref().and_then(|spec| spec.dns_config.as_ref());

    let mut operations = Vec::new();
    operations.extend(update_dns_policy(&desired.policy));
    operations.extend(update_dns_config(current_dns_config, &desired.config)?);
    operations.extend(update_annotations(
        pod.metadata.annotations.as_ref(),
        new_annotations,
    ));

    Ok(Patch(operations))
}

// dnsPolicy always carries a default on admitted pods, so it's never absent
fn update_dns_policy(policy: &str) -> Vec<PatchOperation> {
    vec![PatchOperation::Replace(ReplaceOperation {
        path: DNS_POLICY_PATH.to_owned(),
        value: Value::String(policy.to_owned()),
    })]
}

fn update_dns_config(
    current: Option<&PodDNSConfig>,
    desired: &PodDNSConfig,
) -> Result<Vec<PatchOperation>, PatchError> {
    let path = DNS_CONFIG_PATH.to_owned();
    let value = serde_json::to_value(desired).map_err(PatchError::ValueSerialization)?;

    let operation = match current {
        None => PatchOperation::Add(AddOperation { path, value }),
        Some(_) => PatchOperation::Replace(ReplaceOperation { path, value }),
    };

    Ok(vec![operation])
}

/// Keys holding a non-empty value are replaced in place. Every other key is
/// added through a single `add` of the whole annotations object, carrying
/// over the annotations the pod already has, so the map gets created when
/// missing and unrelated keys survive when it isn't.
fn update_annotations(
    current: Option<&BTreeMap<String, String>>,
    added: &BTreeMap<String, String>,
) -> Vec<PatchOperation> {
    let mut merged = current.cloned().unwrap_or_default();
    let mut replaced = Vec::new();
    let mut needs_add = false;

    for (key, value) in added {
        let has_value = current
            .and_then(|annotations| annotations.get(key))
            .map_or(false, |value| !value.is_empty());

        if has_value {
            replaced.push(PatchOperation::Replace(ReplaceOperation {
                path: format!("{ANNOTATIONS_PATH}/{}", escape_pointer_token(key)),
                value: Value::String(value.to_owned()),
            }));
        } else {
            merged.insert(key.to_owned(), value.to_owned());
            needs_add = true;
        }
    }

    let mut operations = Vec::new();
    if needs_add {
        operations.push(PatchOperation::Add(AddOperation {
            path: ANNOTATIONS_PATH.to_owned(),
            value: Value::Object(
                merged
                    .into_iter()
                    .map(|(key, value)| (key, Value::String(value)))
                    .collect(),
            ),
        }));
    }
    operations.extend(replaced);

    operations
}

/// Escapes a single JSON pointer reference token (RFC 6901).
pub fn escape_pointer_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}
