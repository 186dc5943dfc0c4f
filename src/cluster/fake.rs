//! In-memory cluster used by orchestration tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::error::ClusterError;
use crate::manifest::ResourceKind;

use super::api::ClusterApi;

type Key = (ResourceKind, String, String);

/// A cluster that stores objects in a map and logs every call.
#[derive(Debug, Default)]
pub(crate) struct FakeCluster {
    objects: Mutex<BTreeMap<Key, Value>>,
    calls: Mutex<Vec<String>>,
    failures: Mutex<BTreeMap<String, ClusterError>>,
}

impl FakeCluster {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Makes the call described by `call` (as it appears in the call log)
    /// fail with `error`.
    pub(crate) fn fail_on(self, call: &str, error: ClusterError) -> Self {
        self.failures
            .lock()
            .expect("failures lock")
            .insert(call.to_string(), error);
        self
    }

    /// Calls issued so far, as `"<op> <kind>/<namespace>/<name>"`.
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    /// Stored object, if any.
    pub(crate) fn object(&self, kind: ResourceKind, namespace: &str, name: &str) -> Option<Value> {
        self.objects
            .lock()
            .expect("objects lock")
            .get(&(kind, namespace.to_string(), name.to_string()))
            .cloned()
    }

    fn record(&self, op: &str, kind: ResourceKind, namespace: &str, name: &str) -> Result<(), ClusterError> {
        let call = format!("{op} {kind}/{namespace}/{name}");
        self.calls.lock().expect("calls lock").push(call.clone());

        match self.failures.lock().expect("failures lock").get(&call) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn store(&self, kind: ResourceKind, namespace: &str, name: &str, mut object: Value) -> Value {
        let mut objects = self.objects.lock().expect("objects lock");
        let key = (kind, namespace.to_string(), name.to_string());
        let version = objects
            .get(&key)
            .and_then(|o| o.pointer("/metadata/resourceVersion"))
            .and_then(Value::as_str)
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or_default();

        if let Some(metadata) = object.get_mut("metadata").and_then(Value::as_object_mut) {
            metadata.insert(
                String::from("resourceVersion"),
                Value::String((version + 1).to_string()),
            );
        }
        objects.insert(key, object.clone());
        object
    }
}

fn name_of(object: &Value) -> String {
    object
        .pointer("/metadata/name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn get(&self, kind: ResourceKind, name: &str, namespace: &str) -> Result<Value, ClusterError> {
        self.record("get", kind, namespace, name)?;
        self.object(kind, namespace, name).ok_or_else(|| ClusterError::NotFound {
            kind,
            name: name.to_string(),
            namespace: namespace.to_string(),
        })
    }

    async fn create(&self, kind: ResourceKind, namespace: &str, object: &Value) -> Result<Value, ClusterError> {
        let name = name_of(object);
        self.record("create", kind, namespace, &name)?;
        if self.object(kind, namespace, &name).is_some() {
            return Err(ClusterError::Api {
                status: 409,
                reason: String::from("AlreadyExists"),
                message: format!("{kind} '{name}' already exists"),
            });
        }
        Ok(self.store(kind, namespace, &name, object.clone()))
    }

    async fn update(&self, kind: ResourceKind, namespace: &str, object: &Value) -> Result<Value, ClusterError> {
        let name = name_of(object);
        self.record("update", kind, namespace, &name)?;
        if self.object(kind, namespace, &name).is_none() {
            return Err(ClusterError::NotFound {
                kind,
                name,
                namespace: namespace.to_string(),
            });
        }
        Ok(self.store(kind, namespace, &name, object.clone()))
    }

    async fn patch(&self, kind: ResourceKind, namespace: &str, name: &str, patch: &[u8]) -> Result<Value, ClusterError> {
        self.record("patch", kind, namespace, name)?;
        let mut current = self.object(kind, namespace, name).ok_or_else(|| ClusterError::NotFound {
            kind,
            name: name.to_string(),
            namespace: namespace.to_string(),
        })?;
        let patch: Value = serde_json::from_slice(patch).map_err(|e| ClusterError::Api {
            status: 400,
            reason: String::from("BadRequest"),
            message: e.to_string(),
        })?;
        json_patch::merge(&mut current, &patch);
        Ok(self.store(kind, namespace, name, current))
    }
}
