//! Scheduling capability over execution units

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::DeleteParams;
use kube::{Api, Client, Resource};

/// Query string asking the API server to reject unknown or duplicate fields
pub const STRICT_FIELD_VALIDATION: &str = "fieldValidation=Strict";

/// Create, read and delete pods in one namespace.
///
/// The remote executor only ever needs these three calls. The production
/// implementation is [`ClusterPods`]; tests use
/// [`MockPods`](crate::testing::MockPods).
///
/// Implementations must tolerate eventual consistency: a pod that was just
/// created may not be readable yet, and callers treat a failed read as
/// transient.
#[async_trait]
pub trait PodApi: Send + Sync {
    /// Create a pod, returning the object the server stored (with its generated name)
    async fn create(&self, pod: &Pod) -> kube::Result<Pod>;

    /// Read a pod by name
    async fn get(&self, name: &str) -> kube::Result<Pod>;

    /// Delete a pod immediately (grace period zero)
    async fn delete(&self, name: &str) -> kube::Result<()>;
}

/// Pods in one namespace of a live cluster.
///
/// Creates are sent with strict field validation, which `PostParams` cannot
/// express, so they bypass `Api::create`.
#[derive(Clone)]
pub struct ClusterPods {
    client: Client,
    api: Api<Pod>,
    namespace: String,
}

impl ClusterPods {
    /// Pods in `namespace`
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        Self {
            api: Api::namespaced(client.clone(), &namespace),
            client,
            namespace,
        }
    }
}

impl std::fmt::Debug for ClusterPods {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterPods")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

/// Build the create request for `pod` in `namespace` with strict field validation
pub fn strict_create_request(namespace: &str, pod: &Pod) -> kube::Result<http::Request<Vec<u8>>> {
    let body = serde_json::to_vec(pod).map_err(kube::Error::SerdeError)?;
    let url = format!(
        "{}?{STRICT_FIELD_VALIDATION}",
        <Pod as Resource>::url_path(&(), Some(namespace))
    );
    http::Request::post(url)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body)
        .map_err(kube::Error::HttpError)
}

#[async_trait]
impl PodApi for ClusterPods {
    async fn create(&self, pod: &Pod) -> kube::Result<Pod> {
        let request = strict_create_request(&self.namespace, pod)?;
        self.client.request::<Pod>(request).await
    }

    async fn get(&self, name: &str) -> kube::Result<Pod> {
        self.api.get(name).await
    }

    async fn delete(&self, name: &str) -> kube::Result<()> {
        self.api
            .delete(name, &DeleteParams::default().grace_period(0))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use pretty_assertions::assert_eq;

    fn pod() -> Pod {
        Pod {
            metadata: ObjectMeta {
                generate_name: Some("hostpath-provisioner-node-a-".into()),
                ..ObjectMeta::default()
            },
            ..Pod::default()
        }
    }

    #[test]
    fn create_request_asks_for_strict_validation() {
        let request = strict_create_request("hostpath", &pod()).unwrap();

        assert_eq!(request.method(), http::Method::POST);
        assert_eq!(request.uri().path(), "/api/v1/namespaces/hostpath/pods");
        assert_eq!(request.uri().query(), Some("fieldValidation=Strict"));
        assert_eq!(
            request.headers()[http::header::CONTENT_TYPE],
            "application/json"
        );
    }

    #[test]
    fn create_request_carries_the_pod() {
        let request = strict_create_request("hostpath", &pod()).unwrap();
        let sent: Pod = serde_json::from_slice(request.body()).unwrap();
        assert_eq!(
            sent.metadata.generate_name.as_deref(),
            Some("hostpath-provisioner-node-a-")
        );
    }
}
