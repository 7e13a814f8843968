//! Integration tests driving the lifecycle client through its public API
//! with a scripted engine.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rstest::rstest;

use edged::engine::{
    EngineClient, EngineConnector, EngineContainer, EngineFuture, EngineImage, EngineTask,
    NewContainerRequest, RuntimeClient, RuntimeSpec, SNAPSHOTTER, TaskStatus, runtime_plugin_id,
};
use edged::error::RuntimeError;
use edged::model::{
    CONTAINER_NAME_LABEL, ContainerDescriptor, NAMESPACE_LABEL, POD_NAME_LABEL, PodDescriptor,
};

/// Shared scripted state for one test's engine.
#[derive(Default)]
struct ScriptedEngine {
    connects: AtomicUsize,
    pull_delay: Mutex<Option<Duration>>,
    fail_next_pull: AtomicBool,
    create_requests: Mutex<Vec<NewContainerRequest>>,
    task_running: AtomicBool,
}

impl ScriptedEngine {
    fn requests(&self) -> Vec<NewContainerRequest> {
        self.create_requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

struct ScriptedConnector {
    engine: Arc<ScriptedEngine>,
}

struct ScriptedClient {
    engine: Arc<ScriptedEngine>,
}

struct ScriptedImage {
    reference: String,
}

struct ScriptedContainer {
    engine: Arc<ScriptedEngine>,
    id: String,
    labels: HashMap<String, String>,
}

struct ScriptedTask {
    engine: Arc<ScriptedEngine>,
}

impl EngineConnector for ScriptedConnector {
    type Client = ScriptedClient;

    fn connect<'a>(&'a self, _namespace: &str) -> EngineFuture<'a, ScriptedClient> {
        self.engine.connects.fetch_add(1, Ordering::SeqCst);
        let engine = Arc::clone(&self.engine);
        Box::pin(async move { Ok(ScriptedClient { engine }) })
    }
}

impl EngineClient for ScriptedClient {
    fn list_namespaces(&self) -> EngineFuture<'_, Vec<String>> {
        Box::pin(async {
            Ok(vec![
                String::from("default"),
                String::from("edge"),
                String::from("prod"),
            ])
        })
    }

    fn containers(&self) -> EngineFuture<'_, Vec<Box<dyn EngineContainer>>> {
        let engine = Arc::clone(&self.engine);
        Box::pin(async move {
            let containers = engine
                .requests()
                .into_iter()
                .map(|request| {
                    Box::new(ScriptedContainer {
                        engine: Arc::clone(&engine),
                        id: request.id,
                        labels: request.labels,
                    }) as Box<dyn EngineContainer>
                })
                .collect();
            Ok(containers)
        })
    }

    fn pull_image<'a>(&'a self, reference: &str) -> EngineFuture<'a, Box<dyn EngineImage>> {
        let engine = Arc::clone(&self.engine);
        let reference = String::from(reference);
        Box::pin(async move {
            let delay = *engine
                .pull_delay
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if engine.fail_next_pull.swap(false, Ordering::SeqCst) {
                return Err(RuntimeError::Engine {
                    message: String::from("registry unreachable"),
                });
            }
            Ok(Box::new(ScriptedImage { reference }) as Box<dyn EngineImage>)
        })
    }

    fn generate_spec<'a>(&'a self, _image: &'a dyn EngineImage) -> EngineFuture<'a, RuntimeSpec> {
        Box::pin(async {
            Ok(RuntimeSpec::new(serde_json::json!({
                "process": { "args": ["/bin/app"], "cwd": "/" }
            })))
        })
    }

    fn create_container(
        &self,
        request: NewContainerRequest,
    ) -> EngineFuture<'_, Box<dyn EngineContainer>> {
        let engine = Arc::clone(&self.engine);
        Box::pin(async move {
            engine
                .create_requests
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(request.clone());
            Ok(Box::new(ScriptedContainer {
                engine: Arc::clone(&engine),
                id: request.id,
                labels: request.labels,
            }) as Box<dyn EngineContainer>)
        })
    }

    fn load_container<'a>(&'a self, id: &str) -> EngineFuture<'a, Box<dyn EngineContainer>> {
        let engine = Arc::clone(&self.engine);
        let id = String::from(id);
        Box::pin(async move {
            let request = engine
                .requests()
                .into_iter()
                .find(|request| request.id == id);
            match request {
                Some(request) => Ok(Box::new(ScriptedContainer {
                    engine,
                    id: request.id,
                    labels: request.labels,
                }) as Box<dyn EngineContainer>),
                None => Err(RuntimeError::NotFound {
                    resource: format!("container {id}"),
                }),
            }
        })
    }

    fn task_status<'a>(&'a self, _container_id: &str) -> EngineFuture<'a, TaskStatus> {
        let engine = Arc::clone(&self.engine);
        Box::pin(async move {
            if engine.task_running.load(Ordering::SeqCst) {
                Ok(TaskStatus::Running)
            } else {
                Ok(TaskStatus::Stopped)
            }
        })
    }
}

impl EngineImage for ScriptedImage {
    fn reference(&self) -> &str {
        &self.reference
    }

    fn digest(&self) -> &str {
        "sha256:scripted"
    }

    fn unpack<'a>(&'a self, _snapshotter: &str) -> EngineFuture<'a, ()> {
        Box::pin(async { Ok(()) })
    }
}

impl EngineContainer for ScriptedContainer {
    fn id(&self) -> &str {
        &self.id
    }

    fn labels(&self) -> &HashMap<String, String> {
        &self.labels
    }

    fn new_task(&self) -> EngineFuture<'_, Box<dyn EngineTask>> {
        let engine = Arc::clone(&self.engine);
        Box::pin(async move { Ok(Box::new(ScriptedTask { engine }) as Box<dyn EngineTask>) })
    }

    fn task(&self) -> EngineFuture<'_, Box<dyn EngineTask>> {
        let engine = Arc::clone(&self.engine);
        let id = self.id.clone();
        Box::pin(async move {
            if engine.task_running.load(Ordering::SeqCst) {
                Ok(Box::new(ScriptedTask { engine }) as Box<dyn EngineTask>)
            } else {
                Err(RuntimeError::NotFound {
                    resource: format!("task for container {id}"),
                })
            }
        })
    }

    fn delete(&self, _cleanup_snapshot: bool) -> EngineFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }
}

impl EngineTask for ScriptedTask {
    fn pid(&self) -> Option<u32> {
        Some(7)
    }

    fn start(&self) -> EngineFuture<'_, u32> {
        let engine = Arc::clone(&self.engine);
        Box::pin(async move {
            engine.task_running.store(true, Ordering::SeqCst);
            Ok(7)
        })
    }

    fn delete_with_kill(&self) -> EngineFuture<'_, ()> {
        let engine = Arc::clone(&self.engine);
        Box::pin(async move {
            engine.task_running.store(false, Ordering::SeqCst);
            Ok(())
        })
    }
}

fn scripted_client(
    timeout: Option<Duration>,
) -> (RuntimeClient<ScriptedConnector>, Arc<ScriptedEngine>) {
    let engine = Arc::new(ScriptedEngine::default());
    let client = RuntimeClient::new(
        ScriptedConnector {
            engine: Arc::clone(&engine),
        },
        timeout,
    );
    (client, engine)
}

#[rstest]
#[tokio::test]
async fn namespaces_exclude_the_reserved_default() {
    let (client, _engine) = scripted_client(None);
    let namespaces = client.list_namespaces().await.expect("listing should succeed");
    assert_eq!(namespaces, vec![String::from("edge"), String::from("prod")]);
}

#[rstest]
#[tokio::test]
async fn create_carries_descriptor_labels_and_fixed_runtime() {
    let (client, engine) = scripted_client(None);
    let pod = PodDescriptor::new("sensors", "edge");
    let container = ContainerDescriptor::new("sensors-temperature", "reg/sensor:2");

    client
        .create_container(&pod, &container)
        .await
        .expect("creation should succeed");

    let requests = engine.requests();
    assert_eq!(requests.len(), 1);
    let request = requests.first().expect("one create request");
    assert_eq!(request.labels.get(NAMESPACE_LABEL).map(String::as_str), Some("edge"));
    assert_eq!(
        request.labels.get(POD_NAME_LABEL).map(String::as_str),
        Some("sensors")
    );
    assert_eq!(
        request.labels.get(CONTAINER_NAME_LABEL).map(String::as_str),
        Some("sensors-temperature")
    );
    assert_eq!(request.snapshotter, SNAPSHOTTER);
    assert_eq!(request.snapshot_view, "sensors-temperature");
    assert_eq!(request.runtime, runtime_plugin_id());
}

#[rstest]
#[tokio::test]
async fn lifecycle_runs_end_to_end_through_the_public_surface() {
    let (client, _engine) = scripted_client(None);
    let pod = PodDescriptor::new("sensors", "edge");
    let descriptor = ContainerDescriptor::new("sensors-temperature", "reg/sensor:2");

    let container = client
        .create_container(&pod, &descriptor)
        .await
        .expect("creation should succeed");
    client
        .start_container(container.as_ref())
        .await
        .expect("start should succeed");
    assert!(
        client
            .is_container_running(container.as_ref())
            .await
            .expect("probe should succeed")
    );
    assert_eq!(client.container_task_status("sensors-temperature").await, "RUNNING");

    let loaded = client
        .load_container("edge", "sensors-temperature")
        .await
        .expect("load should succeed");
    client
        .stop_container(loaded.as_ref())
        .await
        .expect("stop should succeed");
    assert!(
        !client
            .is_container_running(container.as_ref())
            .await
            .expect("probe should succeed")
    );
}

#[rstest]
#[tokio::test]
async fn deadline_elapse_counts_as_failure_and_forces_reconnect() {
    let (client, engine) = scripted_client(Some(Duration::from_millis(20)));

    client
        .ensure_image_pulled("edge", "reg/app:1")
        .await
        .expect("pull should succeed");
    assert_eq!(engine.connects.load(Ordering::SeqCst), 1);

    *engine
        .pull_delay
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = Some(Duration::from_secs(5));
    let outcome = client.ensure_image_pulled("edge", "reg/app:1").await;
    assert!(matches!(outcome, Err(RuntimeError::DeadlineExceeded { .. })));

    *engine
        .pull_delay
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = None;
    client
        .ensure_image_pulled("edge", "reg/app:1")
        .await
        .expect("pull should succeed after reconnect");
    assert_eq!(engine.connects.load(Ordering::SeqCst), 2);
}

#[rstest]
#[tokio::test]
async fn pull_failure_is_reported_with_the_image_reference() {
    let (client, engine) = scripted_client(None);
    engine.fail_next_pull.store(true, Ordering::SeqCst);

    let outcome = client.ensure_image_pulled("edge", "reg/app:1").await;
    assert!(matches!(
        outcome,
        Err(RuntimeError::PullFailed { ref reference, .. }) if reference == "reg/app:1"
    ));
}

#[rstest]
#[tokio::test]
async fn loading_an_unknown_container_is_not_found() {
    let (client, _engine) = scripted_client(None);
    let outcome = client.load_container("edge", "missing").await;
    assert!(matches!(outcome, Err(ref error) if error.is_not_found()));
}
