//! Deterministic backing paths

use std::fmt;
use std::path::Path;

use crate::request::ProvisioningRequest;

/// Host directory that physically stores a provisioned volume.
///
/// Derived as `<base_dir>/<namespace>-<claim>-<volume>`. The derivation is a
/// pure function of its inputs, so re-provisioning the same request always
/// lands in the same directory.
///
/// The segments are joined with `-`, which names may contain too:
/// `a-b`/`c` and `a`/`b-c` produce the same leaf for the same volume name.
/// Distinct claims get distinct directories only because volume names are
/// unique (`pvc-<claim uid>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BackingPath(String);

impl BackingPath {
    /// Derive the backing path for a claim under `base_dir`
    #[must_use]
    pub fn new(base_dir: &str, namespace: &str, claim: &str, volume: &str) -> Self {
        let leaf = format!("{namespace}-{claim}-{volume}");
        Self(Path::new(base_dir).join(leaf).to_string_lossy().into_owned())
    }

    /// Derive the backing path for `request` under `base_dir`
    #[must_use]
    pub fn for_request(base_dir: &str, request: &ProvisioningRequest) -> Self {
        Self::new(
            base_dir,
            &request.claim_namespace,
            &request.claim_name,
            &request.volume_name,
        )
    }

    /// Wrap a path read back from an existing volume
    pub fn from_host_path(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Path as a string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Directory containing this path.
    ///
    /// Mounting the parent lets a remote command remove the entry itself.
    /// A root-level entry yields `/`, a bare relative name yields `.`.
    #[must_use]
    pub fn parent(&self) -> String {
        match Path::new(&self.0).parent() {
            Some(parent) if parent.as_os_str().is_empty() => ".".to_string(),
            Some(parent) => parent.to_string_lossy().into_owned(),
            None => "/".to_string(),
        }
    }
}

impl fmt::Display for BackingPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<Path> for BackingPath {
    fn as_ref(&self) -> &Path {
        Path::new(&self.0)
    }
}

impl From<BackingPath> for String {
    fn from(path: BackingPath) -> Self {
        path.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn joins_namespace_claim_and_volume() {
        let path = BackingPath::new("/data", "a", "c1", "pv-001");
        assert_eq!(path.as_str(), "/data/a-c1-pv-001");
    }

    #[test]
    fn trailing_slash_on_base_is_absorbed() {
        let path = BackingPath::new("/data/", "a", "c1", "pv-001");
        assert_eq!(path.as_str(), "/data/a-c1-pv-001");
    }

    #[test]
    fn dashed_names_collide_without_distinct_volume_names() {
        let left = BackingPath::new("/data", "a-b", "c", "pv-001");
        let right = BackingPath::new("/data", "a", "b-c", "pv-001");
        assert_eq!(left, right);

        let right = BackingPath::new("/data", "a", "b-c", "pv-002");
        assert_ne!(left, right);
    }

    #[test]
    fn volume_name_separates_paths() {
        let first = BackingPath::new("/data", "a", "c1", "pv-001");
        let second = BackingPath::new("/data", "a", "c1", "pv-002");
        assert_ne!(first, second);
    }

    #[test]
    fn request_override_is_not_applied_implicitly() {
        let request = ProvisioningRequest::new("pv-001", "a", "c1").with_parameter("pvDir", "/fast");
        let path = BackingPath::for_request("/data", &request);
        assert_eq!(path.as_str(), "/data/a-c1-pv-001");
    }

    #[rstest]
    #[case("/data/a-c1-pv-001", "/data")]
    #[case("/data/nested/dir", "/data/nested")]
    #[case("/top", "/")]
    #[case("/", "/")]
    #[case("relative", ".")]
    fn parent_of_host_path(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(BackingPath::from_host_path(path).parent(), expected);
    }
}
