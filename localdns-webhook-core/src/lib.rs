pub mod annotations;
pub mod config;
pub mod dns;
pub mod eligibility;
pub mod patch;
pub mod review;

pub const NAMESPACE_SYSTEM: &str = "kube-system";
pub const NAMESPACE_PUBLIC: &str = "kube-public";
pub const NAMESPACE_DEFAULT: &str = "default";
