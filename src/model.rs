//! Pod and container descriptors shared across the daemon.
//!
//! Descriptors are caller-supplied specifications: once handed to the
//! runtime client they are treated as immutable. The labels attached to
//! created containers are derived deterministically from these descriptors
//! and consumed downstream by discovery and ownership logic.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The namespace the runtime engine reserves for its own use.
///
/// Namespace listing never surfaces this value to callers; it is also the
/// namespace the client connects with for namespace-agnostic operations.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Label key carrying the namespace a container belongs to.
pub const NAMESPACE_LABEL: &str = "io.edged.namespace";

/// Label key carrying the owning pod's name.
pub const POD_NAME_LABEL: &str = "io.edged.pod.name";

/// Label key carrying the container's name within its pod.
pub const CONTAINER_NAME_LABEL: &str = "io.edged.container.name";

/// A pod: a named group of containers sharing a namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodDescriptor {
    /// The pod name, unique within its namespace.
    pub name: String,

    /// The namespace partitioning the pod's runtime resources.
    pub namespace: String,
}

impl PodDescriptor {
    /// Creates a pod descriptor in the given namespace.
    #[must_use]
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

/// A single container specification within a pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerDescriptor {
    /// The container id, used as the runtime container identity and as the
    /// name of its root filesystem snapshot view.
    pub id: String,

    /// The image reference (e.g. `registry/name:tag`) backing the container.
    pub image: String,
}

impl ContainerDescriptor {
    /// Creates a container descriptor from an id and image reference.
    #[must_use]
    pub fn new(id: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            image: image.into(),
        }
    }
}

/// Derives the labels attached to a runtime container at creation time.
///
/// The derivation is deterministic: the same pod and container descriptors
/// always yield the same label set. Discovery and ownership resolution
/// outside this crate key off these labels.
#[must_use]
pub fn container_labels(
    pod: &PodDescriptor,
    container: &ContainerDescriptor,
) -> HashMap<String, String> {
    HashMap::from([
        (String::from(NAMESPACE_LABEL), pod.namespace.clone()),
        (String::from(POD_NAME_LABEL), pod.name.clone()),
        (String::from(CONTAINER_NAME_LABEL), container.id.clone()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn pod() -> PodDescriptor {
        PodDescriptor::new("sensors", "edge")
    }

    #[fixture]
    fn container() -> ContainerDescriptor {
        ContainerDescriptor::new("c1", "reg/app:1")
    }

    #[rstest]
    fn labels_carry_namespace_pod_and_container_identity(
        pod: PodDescriptor,
        container: ContainerDescriptor,
    ) {
        let labels = container_labels(&pod, &container);
        assert_eq!(labels.get(NAMESPACE_LABEL), Some(&String::from("edge")));
        assert_eq!(labels.get(POD_NAME_LABEL), Some(&String::from("sensors")));
        assert_eq!(labels.get(CONTAINER_NAME_LABEL), Some(&String::from("c1")));
    }

    #[rstest]
    fn label_derivation_is_deterministic(pod: PodDescriptor, container: ContainerDescriptor) {
        assert_eq!(
            container_labels(&pod, &container),
            container_labels(&pod, &container)
        );
    }
}
