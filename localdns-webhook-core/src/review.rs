//! Admission review handling.
//!
//! Glues the envelope decoding to the pure mutation core: the pod is
//! checked for eligibility, the desired DNS setup for its namespace is
//! computed and the difference is returned as a JSON patch.

use std::collections::BTreeSet;

use json_patch::Patch;
use k8s_openapi::api::core::v1::Pod;
use kube::core::{
    admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, SerializePatchError},
    DynamicObject,
};
use log::{error, info, warn};
use thiserror::Error;

use crate::{
    annotations::get_injected_status_annotations,
    config::WebhookConfig,
    dns::DnsPolicyProvider,
    eligibility::mutation_required,
    patch::{build_patch, PatchError},
    NAMESPACE_DEFAULT,
};

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("Admission request doesn't contain an object!")]
    MissingObject,
    #[error("Couldn't decode the pod! Reason: {}", .0)]
    PodDecode(serde_json::Error),
    #[error("Couldn't build the patch! Reason: {}", .0)]
    Patch(PatchError),
    #[error("Couldn't serialize the patch! Reason: {}", .0)]
    PatchSerialization(SerializePatchError),
}

/// Handles admission reviews. Built once at startup and shared between
/// requests; holds no mutable state.
#[derive(Debug, Clone)]
pub struct ReviewHandler {
    ignored_namespaces: BTreeSet<String>,
    dns_policy: DnsPolicyProvider,
}

impl Default for ReviewHandler {
    fn default() -> Self {
        Self::new(WebhookConfig::default())
    }
}

impl ReviewHandler {
    pub fn new(config: WebhookConfig) -> Self {
        Self {
            ignored_namespaces: config.ignored_namespaces,
            dns_policy: DnsPolicyProvider::new(config.dns),
        }
    }

    /// Decodes a raw admission review and produces the review to send back.
    ///
    /// Malformed input is answered with an explicitly denied response
    /// carrying the decoding error.
    pub fn review(&self, body: &[u8]) -> AdmissionReview<DynamicObject> {
        let review: AdmissionReview<DynamicObject> = match serde_json::from_slice(body) {
            Ok(review) => review,
            Err(err) => {
                error!("Couldn't decode the admission review! {err}");
                return AdmissionResponse::invalid(err.to_string()).into_review();
            }
        };

        let request: AdmissionRequest<DynamicObject> = match review.try_into() {
            Ok(request) => request,
            Err(err) => {
                error!("Invalid admission review! {err}");
                return AdmissionResponse::invalid(err.to_string()).into_review();
            }
        };

        self.mutate(&request).into_review()
    }

    pub fn mutate(&self, request: &AdmissionRequest<DynamicObject>) -> AdmissionResponse {
        match self.evaluate(request) {
            Ok(Some(patch)) => {
                match serde_json::to_string(&patch) {
                    Ok(encoded) => info!("AdmissionResponse for {}: patch={encoded}", request.uid),
                    Err(err) => warn!(
                        "Couldn't render the patch for {} in the log! {err}",
                        request.uid
                    ),
                }

                AdmissionResponse::from(request)
                    .with_patch(patch)
                    .unwrap_or_else(|err| {
                        let err = ReviewError::PatchSerialization(err);
                        error!("{err}");
                        AdmissionResponse::from(request).deny(err.to_string())
                    })
            }
            Ok(None) => AdmissionResponse::from(request),
            Err(err) => {
                error!("Couldn't process admission request {}! {err}", request.uid);
                AdmissionResponse::from(request).deny(err.to_string())
            }
        }
    }

    /// Returns the patch to apply, or `None` when the pod is left untouched.
    pub fn evaluate(
        &self,
        request: &AdmissionRequest<DynamicObject>,
    ) -> Result<Option<Patch>, ReviewError> {
        let pod = decode_pod(request)?;
        let namespace = resolve_namespace(&pod, request);
        let name = resolve_name(&pod, request);

        info!(
            "AdmissionReview for Kind={:?}, Namespace={:?} Name={:?} ({name}) UID={} Operation={:?} User={}",
            request.kind,
            request.namespace,
            request.name,
            request.uid,
            request.operation,
            request.user_info.username.as_deref().unwrap_or("---"),
        );

        if !mutation_required(
            &self.ignored_namespaces,
            &namespace,
            &name,
            pod.metadata.annotations.as_ref(),
        ) {
            info!("Skipping mutation for {namespace}/{name} due to policy check");
            return Ok(None);
        }

        let desired = self.dns_policy.desired_config(&namespace);
        let patch = build_patch(&pod, &desired, &get_injected_status_annotations())
            .map_err(ReviewError::Patch)?;

        Ok(Some(patch))
    }
}

fn decode_pod(request: &AdmissionRequest<DynamicObject>) -> Result<Pod, ReviewError> {
    let object = request.object.as_ref().ok_or(ReviewError::MissingObject)?;

    serde_json::to_value(object)
        .and_then(serde_json::from_value)
        .map_err(ReviewError::PodDecode)
}

// pods being created usually carry no namespace of their own
fn resolve_namespace(pod: &Pod, request: &AdmissionRequest<DynamicObject>) -> String {
    [pod.metadata.namespace.as_deref(), request.namespace.as_deref()]
        .into_iter()
        .flatten()
        .find(|namespace| !namespace.is_empty())
        .unwrap_or(NAMESPACE_DEFAULT)
        .to_owned()
}

fn resolve_name(pod: &Pod, request: &AdmissionRequest<DynamicObject>) -> String {
    [
        pod.metadata.name.as_deref(),
        pod.metadata.generate_name.as_deref(),
        Some(request.name.as_str()),
    ]
    .into_iter()
    .flatten()
    .find(|name| !name.is_empty())
    .unwrap_or("---")
    .to_owned()
}
