use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info};

use crate::annotations::{
    get_annotation, INJECT_ANNOTATION, INJECT_ENABLED_VALUES, STATUS_ANNOTATION, STATUS_INJECTED,
};

/// Decides whether a pod should have its DNS settings rewritten.
///
/// Pods in ignored namespaces are never touched. A pod already carrying the
/// `injected` status is skipped, otherwise the inject annotation has to be
/// explicitly enabled.
pub fn mutation_required(
    ignored_namespaces: &BTreeSet<String>,
    namespace: &str,
    name: &str,
    annotations: Option<&BTreeMap<String, String>>,
) -> bool {
    if ignored_namespaces.contains(namespace) {
        debug!("Skipping mutation of '{name}', '{namespace}' namespace is ignored");
        return false;
    }

    let status = get_annotation(annotations, STATUS_ANNOTATION);

    let required = if status.eq_ignore_ascii_case(STATUS_INJECTED) {
        false
    } else {
        let inject = get_annotation(annotations, INJECT_ANNOTATION).to_lowercase();
        INJECT_ENABLED_VALUES.contains(&inject.as_str())
    };

    info!("Mutation policy for {namespace}/{name}: status: {status:?} required: {required}");

    required
}
