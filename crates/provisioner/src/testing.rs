//! In-memory [`PodApi`] for tests
//!
//! [`MockPods`] plays back a scripted sequence of phases to every `get`,
//! assigns nodes the way the scheduler would and records every call.
//!
//! ```rust,ignore
//! let pods = Arc::new(MockPods::new().with_phases(["Pending", "Succeeded"]));
//! let executor = RemoteExecutor::new(pods.clone(), config);
//! // ...
//! assert_eq!(pods.deletes().len(), 1);
//! ```

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Pod, PodStatus};
use kube::error::ErrorResponse;
use parking_lot::Mutex;

use hostpath_core::keys::HOSTNAME_LABEL;

use crate::pods::PodApi;

/// Node assigned to pods that have no node selector, unless overridden
pub const DEFAULT_NODE: &str = "node-default";

/// One recorded call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PodCall {
    /// `create`, with the name the mock generated
    Create {
        /// Generated name
        name: String,
    },
    /// `get`
    Get {
        /// Requested name
        name: String,
    },
    /// `delete`
    Delete {
        /// Requested name
        name: String,
    },
}

#[derive(Debug, Default)]
struct State {
    phases: VecDeque<String>,
    last_phase: Option<String>,
    failing_gets: u32,
    next_id: u32,
    pods: HashMap<String, Pod>,
    created: Vec<Pod>,
    calls: Vec<PodCall>,
}

/// Scripted in-memory pod API
#[derive(Debug)]
pub struct MockPods {
    namespace: String,
    default_node: String,
    fail_create: bool,
    fail_delete: bool,
    state: Mutex<State>,
}

impl Default for MockPods {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPods {
    /// Mock with no phases scripted; every read reports no phase
    #[must_use]
    pub fn new() -> Self {
        Self {
            namespace: "hostpath".to_string(),
            default_node: DEFAULT_NODE.to_string(),
            fail_create: false,
            fail_delete: false,
            state: Mutex::new(State::default()),
        }
    }

    /// Phases returned by successive reads; the last one repeats
    #[must_use]
    pub fn with_phases<I, S>(self, phases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.lock().phases = phases.into_iter().map(Into::into).collect();
        self
    }

    /// Node assigned to pods without a node selector
    #[must_use]
    pub fn scheduled_on(mut self, node: impl Into<String>) -> Self {
        self.default_node = node.into();
        self
    }

    /// Reject every `create`
    #[must_use]
    pub fn fail_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    /// Reject every `delete`
    #[must_use]
    pub fn fail_delete(mut self) -> Self {
        self.fail_delete = true;
        self
    }

    /// Reject the first `count` reads; rejected reads do not consume phases
    #[must_use]
    pub fn fail_first_gets(self, count: u32) -> Self {
        self.state.lock().failing_gets = count;
        self
    }

    /// Every call so far, in order
    #[must_use]
    pub fn calls(&self) -> Vec<PodCall> {
        self.state.lock().calls.clone()
    }

    /// Pods as submitted to `create`, before any name was assigned
    #[must_use]
    pub fn created(&self) -> Vec<Pod> {
        self.state.lock().created.clone()
    }

    /// Number of reads
    #[must_use]
    pub fn gets(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| matches!(call, PodCall::Get { .. }))
            .count()
    }

    /// Names passed to `delete`
    #[must_use]
    pub fn deletes(&self) -> Vec<String> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                PodCall::Delete { name } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    fn node_for(&self, pod: &Pod) -> String {
        pod.spec
            .as_ref()
            .and_then(|spec| spec.node_selector.as_ref())
            .and_then(|selector| selector.get(HOSTNAME_LABEL))
            .cloned()
            .unwrap_or_else(|| self.default_node.clone())
    }
}

fn api_error(code: u16, reason: &str, message: String) -> kube::Error {
    kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message,
        reason: reason.to_string(),
        code,
    })
}

#[async_trait]
impl PodApi for MockPods {
    async fn create(&self, pod: &Pod) -> kube::Result<Pod> {
        if self.fail_create {
            return Err(api_error(
                500,
                "InternalError",
                "pod creation rejected".to_string(),
            ));
        }

        let mut state = self.state.lock();
        state.next_id += 1;
        let name = format!(
            "{}{:05}",
            pod.metadata.generate_name.as_deref().unwrap_or("pod-"),
            state.next_id
        );

        let mut stored = pod.clone();
        stored.metadata.name = Some(name.clone());
        stored.metadata.namespace = Some(self.namespace.clone());
        if let Some(spec) = stored.spec.as_mut() {
            spec.node_name = Some(self.node_for(pod));
        }

        state.created.push(pod.clone());
        state.pods.insert(name.clone(), stored.clone());
        state.calls.push(PodCall::Create { name });
        Ok(stored)
    }

    async fn get(&self, name: &str) -> kube::Result<Pod> {
        let mut state = self.state.lock();
        state.calls.push(PodCall::Get {
            name: name.to_string(),
        });

        if state.failing_gets > 0 {
            state.failing_gets -= 1;
            return Err(api_error(
                503,
                "ServiceUnavailable",
                "apiserver unavailable".to_string(),
            ));
        }

        let phase = match state.phases.pop_front() {
            Some(phase) => {
                state.last_phase = Some(phase.clone());
                Some(phase)
            }
            None => state.last_phase.clone(),
        };

        let mut pod = state
            .pods
            .get(name)
            .cloned()
            .ok_or_else(|| api_error(404, "NotFound", format!("pods \"{name}\" not found")))?;
        pod.status = Some(PodStatus {
            phase,
            ..PodStatus::default()
        });
        Ok(pod)
    }

    async fn delete(&self, name: &str) -> kube::Result<()> {
        let mut state = self.state.lock();
        state.calls.push(PodCall::Delete {
            name: name.to_string(),
        });
        if self.fail_delete {
            return Err(api_error(
                500,
                "InternalError",
                "pod deletion rejected".to_string(),
            ));
        }
        state.pods.remove(name);
        Ok(())
    }
}
