//! End-to-end runs of the orchestrator against a mocked API server.

use std::path::{Path, PathBuf};

use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use kube_deploy::config::DeployConfig;
use kube_deploy::error::Stage;
use kube_deploy::manifest::{ManifestRenderer, RenderContext, ResourceKind};
use kube_deploy::orchestrator::{Orchestrator, RunState};
use kube_deploy::reconciler::ReconcileAction;
use kube_deploy::KubeClient;

const DEPLOYMENT: &str = r"apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
spec:
  replicas: 2
  template:
    spec:
      containers:
        - name: web
          image: registry.example/web:{{ build.number }}
";

const SERVICE: &str = r"apiVersion: v1
kind: Service
metadata:
  name: web
spec:
  ports:
    - port: 80
      targetPort: 8080
";

const DEPLOYMENT_PATH: &str = "/apis/apps/v1/namespaces/shop/deployments/web";
const SERVICE_PATH: &str = "/api/v1/namespaces/shop/services/web";

fn write_manifest(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("write manifest");
    path
}

fn config(workload: &Path, service: Option<&Path>) -> DeployConfig {
    let mut config = DeployConfig::default();
    config.namespace = String::from("shop");
    config.manifests.workload = Some(workload.to_path_buf());
    config.manifests.service = service.map(Path::to_path_buf);
    config
}

fn renderer() -> ManifestRenderer {
    ManifestRenderer::new(&RenderContext::from_lookup(|key| {
        (key == "DRONE_BUILD_NUMBER").then(|| String::from("42"))
    }))
}

fn not_found() -> ResponseTemplate {
    ResponseTemplate::new(404).set_body_json(json!({
        "kind": "Status",
        "reason": "NotFound",
        "message": "not found"
    }))
}

fn existing_service(target_port: u16) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": {"name": "web", "namespace": "shop", "resourceVersion": "11"},
        "spec": {
            "clusterIP": "10.0.0.12",
            "ports": [{"port": 80, "targetPort": target_port, "protocol": "TCP"}]
        }
    })
}

async fn requests(server: &MockServer) -> Vec<(String, String)> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| (r.method.to_string(), r.url.path().to_string()))
        .collect()
}

#[tokio::test]
async fn test_apply_replaces_workload_and_creates_service() {
    let server = MockServer::start().await;
    let dir = TempDir::new().expect("tempdir");
    let workload = write_manifest(&dir, "deployment.yaml", DEPLOYMENT);
    let service = write_manifest(&dir, "service.yaml", SERVICE);

    Mock::given(method("GET"))
        .and(path(DEPLOYMENT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "web", "namespace": "shop", "resourceVersion": "7"},
            "spec": {"replicas": 1}
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(DEPLOYMENT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(SERVICE_PATH))
        .respond_with(not_found())
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/namespaces/shop/services"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = KubeClient::new(&server.uri(), "secret", None).expect("client");
    let renderer = renderer();
    let run = Orchestrator::new(&client, &renderer)
        .run(&config(&workload, Some(&service)))
        .await
        .expect("run failed");

    assert!(run.success);
    assert_eq!(run.state(), RunState::Succeeded);
    assert_eq!(run.skipped, vec![ResourceKind::Ingress]);

    let actions: Vec<_> = run.outcomes.iter().map(|o| o.action).collect();
    assert_eq!(
        actions,
        vec![Some(ReconcileAction::Updated), Some(ReconcileAction::Created)]
    );

    assert_eq!(
        requests(&server).await,
        vec![
            (String::from("GET"), String::from(DEPLOYMENT_PATH)),
            (String::from("PUT"), String::from(DEPLOYMENT_PATH)),
            (String::from("GET"), String::from(SERVICE_PATH)),
            (String::from("POST"), String::from("/api/v1/namespaces/shop/services")),
        ]
    );

    let received = server.received_requests().await.unwrap_or_default();
    let body: Value = received[1].body_json().expect("PUT body");
    assert_eq!(body["metadata"]["resourceVersion"], "7");
    assert_eq!(
        body["spec"]["template"]["spec"]["containers"][0]["image"],
        "registry.example/web:42"
    );
}

#[tokio::test]
async fn test_unchanged_service_is_not_patched() {
    let server = MockServer::start().await;
    let dir = TempDir::new().expect("tempdir");
    let workload = write_manifest(&dir, "deployment.yaml", DEPLOYMENT);
    let service = write_manifest(&dir, "service.yaml", SERVICE);

    Mock::given(method("GET"))
        .and(path(DEPLOYMENT_PATH))
        .respond_with(not_found())
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/apis/apps/v1/namespaces/shop/deployments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(SERVICE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(existing_service(8080)))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let client = KubeClient::new(&server.uri(), "secret", None).expect("client");
    let renderer = renderer();
    let run = Orchestrator::new(&client, &renderer)
        .run(&config(&workload, Some(&service)))
        .await
        .expect("run failed");

    assert!(run.success);
    assert_eq!(run.count(ReconcileAction::Created), 1);
    assert_eq!(run.count(ReconcileAction::NoOp), 1);
}

#[tokio::test]
async fn test_changed_service_is_merge_patched() {
    let server = MockServer::start().await;
    let dir = TempDir::new().expect("tempdir");
    let workload = write_manifest(&dir, "deployment.yaml", DEPLOYMENT);
    let service = write_manifest(&dir, "service.yaml", SERVICE);

    Mock::given(method("GET"))
        .and(path(DEPLOYMENT_PATH))
        .respond_with(not_found())
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/apis/apps/v1/namespaces/shop/deployments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(SERVICE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(existing_service(9090)))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(SERVICE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = KubeClient::new(&server.uri(), "secret", None).expect("client");
    let renderer = renderer();
    let run = Orchestrator::new(&client, &renderer)
        .run(&config(&workload, Some(&service)))
        .await
        .expect("run failed");

    assert!(run.success);
    assert_eq!(run.count(ReconcileAction::Patched), 1);

    let received = server.received_requests().await.unwrap_or_default();
    let patch = received
        .iter()
        .find(|r| r.method.as_str() == "PATCH")
        .expect("PATCH request");
    let body: Value = patch.body_json().expect("patch body");
    assert_eq!(body["spec"]["ports"][0]["targetPort"], 8080);
    assert_eq!(body["spec"]["ports"][0]["protocol"], "TCP");
    assert!(body["spec"].get("clusterIP").is_none());
}

#[tokio::test]
async fn test_plan_makes_no_mutating_calls() {
    let server = MockServer::start().await;
    let dir = TempDir::new().expect("tempdir");
    let workload = write_manifest(&dir, "deployment.yaml", DEPLOYMENT);

    Mock::given(method("GET"))
        .and(path(DEPLOYMENT_PATH))
        .respond_with(not_found())
        .expect(1)
        .mount(&server)
        .await;

    let client = KubeClient::new(&server.uri(), "secret", None).expect("client");
    let renderer = renderer();
    let run = Orchestrator::new(&client, &renderer)
        .with_dry_run(true)
        .run(&config(&workload, None))
        .await
        .expect("run failed");

    assert!(run.success);
    assert!(run.dry_run);
    assert_eq!(run.outcomes[0].action, Some(ReconcileAction::Created));
    assert_eq!(
        run.skipped,
        vec![ResourceKind::NetworkService, ResourceKind::Ingress]
    );
    assert_eq!(requests(&server).await.len(), 1);
}

#[tokio::test]
async fn test_lookup_failure_stops_run() {
    let server = MockServer::start().await;
    let dir = TempDir::new().expect("tempdir");
    let workload = write_manifest(&dir, "deployment.yaml", DEPLOYMENT);
    let service = write_manifest(&dir, "service.yaml", SERVICE);

    Mock::given(method("GET"))
        .and(path(DEPLOYMENT_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "kind": "Status",
            "reason": "InternalError",
            "message": "etcd unavailable"
        })))
        .mount(&server)
        .await;

    let client = KubeClient::new(&server.uri(), "secret", None).expect("client");
    let renderer = renderer();
    let run = Orchestrator::new(&client, &renderer)
        .run(&config(&workload, Some(&service)))
        .await
        .expect("run failed");

    assert!(!run.success);
    assert_eq!(run.state(), RunState::Failed);

    let failure = run.failure.as_ref().expect("failure recorded");
    assert_eq!(failure.kind, ResourceKind::Workload);
    assert_eq!(failure.stage, Stage::Lookup);
    assert_eq!(failure.resource.as_deref(), Some("deployment/shop/web"));
    assert!(failure.message.contains("etcd unavailable"));

    assert_eq!(
        requests(&server).await,
        vec![(String::from("GET"), String::from(DEPLOYMENT_PATH))]
    );
}
