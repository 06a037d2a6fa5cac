use std::collections::BTreeMap;

pub const INJECT_ANNOTATION: &str = "localdns-policy-webhook/inject";
pub const STATUS_ANNOTATION: &str = "localdns-policy-webhook/status";

pub const STATUS_INJECTED: &str = "injected";

/// Values of the inject annotation that opt a pod in, compared lowercase.
pub const INJECT_ENABLED_VALUES: [&str; 4] = ["y", "yes", "true", "on"];

pub fn get_injected_status_annotations() -> BTreeMap<String, String> {
    BTreeMap::from([(STATUS_ANNOTATION.to_owned(), STATUS_INJECTED.to_owned())])
}

/// Reads an annotation, treating a missing map or key as an empty value.
pub fn get_annotation<'a>(annotations: Option<&'a BTreeMap<String, String>>, key: &str) -> &'a str {
    annotations
        .and_then(|annotations| annotations.get(key))
        .map(String::as_str)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{get_annotation, get_injected_status_annotations, STATUS_ANNOTATION};

    #[test]
    fn injected_status_annotations_contain_only_status() {
        let annotations = get_injected_status_annotations();

        assert_eq!(annotations.len(), 1);
        assert_eq!(get_annotation(Some(&annotations), STATUS_ANNOTATION), "injected");
    }

    #[test]
    fn missing_annotations_read_as_empty() {
        let annotations = BTreeMap::from([("other".to_owned(), "value".to_owned())]);

        assert_eq!(get_annotation(None, STATUS_ANNOTATION), "");
        assert_eq!(get_annotation(Some(&annotations), STATUS_ANNOTATION), "");
        assert_eq!(get_annotation(Some(&annotations), "other"), "value");
    }
}
