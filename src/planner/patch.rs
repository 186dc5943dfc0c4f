//! Merge-patch computation.
//!
//! Computes the JSON merge patch (RFC 7386) that takes the object stored in
//! the cluster to the result of merging the desired manifest onto it.
//! Fields absent from the desired manifest are left untouched; maps merge
//! key by key; lists are replaced unless a [`MergeKey`] names them, in
//! which case elements are matched by that key and merged.

use serde_json::{Map, Value};
use tracing::trace;

use crate::error::{PatchError, PatchSide};

use super::kinds::MergeKey;

/// Stateless merge-patch calculator.
#[derive(Debug, Default, Clone, Copy)]
pub struct PatchComputer;

impl PatchComputer {
    /// Creates a new patch computer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the merge patch as serialized JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if either side is not an object, the desired text
    /// does not parse, or the two documents are of different kinds.
    pub fn compute_patch(
        &self,
        existing: &Value,
        desired_raw: &str,
        merge_keys: &[MergeKey],
    ) -> Result<Vec<u8>, PatchError> {
        let patch = self.compute_patch_value(existing, desired_raw, merge_keys)?;
        serde_json::to_vec(&patch).map_err(|e| PatchError::Serialize {
            message: e.to_string(),
        })
    }

    /// Computes the merge patch as a JSON value.
    ///
    /// An empty object means the existing object already satisfies the
    /// desired manifest.
    ///
    /// # Errors
    ///
    /// See [`PatchComputer::compute_patch`].
    pub fn compute_patch_value(
        &self,
        existing: &Value,
        desired_raw: &str,
        merge_keys: &[MergeKey],
    ) -> Result<Value, PatchError> {
        let existing = existing.as_object().ok_or(PatchError::NotAnObject {
            side: PatchSide::Existing,
        })?;

        let desired = normalize(desired_raw)?;
        let desired = desired.as_object().ok_or(PatchError::NotAnObject {
            side: PatchSide::Desired,
        })?;

        check_kinds(existing, desired)?;

        let mut merged = existing.clone();
        merge_objects(&mut merged, desired, "", merge_keys);

        let patch = diff_objects(existing, &merged);
        trace!("Computed merge patch with {} top-level fields", patch.len());

        Ok(Value::Object(patch))
    }
}

/// Parses manifest text (YAML or JSON) into its JSON form.
fn normalize(raw: &str) -> Result<Value, PatchError> {
    let parsed = if raw.trim_start().starts_with('{') {
        serde_json::from_str::<Value>(raw).map_err(|e| e.to_string())
    } else {
        serde_yaml::from_str::<Value>(raw).map_err(|e| e.to_string())
    };

    parsed.map_err(|message| PatchError::Parse {
        side: PatchSide::Desired,
        message,
    })
}

/// Rejects documents whose `kind` fields disagree.
fn check_kinds(existing: &Map<String, Value>, desired: &Map<String, Value>) -> Result<(), PatchError> {
    let kind_of = |doc: &Map<String, Value>| doc.get("kind").and_then(Value::as_str).map(str::to_string);

    match (kind_of(existing), kind_of(desired)) {
        (Some(existing), Some(desired)) if !existing.eq_ignore_ascii_case(&desired) => {
            Err(PatchError::IncompatibleKinds { existing, desired })
        }
        _ => Ok(()),
    }
}

fn join_path(parent: &str, field: &str) -> String {
    if parent.is_empty() {
        field.to_string()
    } else {
        format!("{parent}.{field}")
    }
}

fn merge_key_for<'k>(merge_keys: &'k [MergeKey], path: &str) -> Option<&'k str> {
    merge_keys
        .iter()
        .find(|k| k.path == path)
        .map(|k| k.key.as_str())
}

/// Merges `desired` onto `target` in place.
fn merge_objects(
    target: &mut Map<String, Value>,
    desired: &Map<String, Value>,
    path: &str,
    merge_keys: &[MergeKey],
) {
    for (field, want) in desired {
        if want.is_null() {
            target.remove(field);
            continue;
        }

        let field_path = join_path(path, field);
        let merged = match (target.get_mut(field), want) {
            (Some(Value::Object(have)), Value::Object(want)) => {
                merge_objects(have, want, &field_path, merge_keys);
                true
            }
            (Some(Value::Array(have)), Value::Array(want)) => {
                if let Some(key) = merge_key_for(merge_keys, &field_path) {
                    merge_lists(have, want, key, &field_path, merge_keys);
                } else {
                    have.clone_from(want);
                }
                true
            }
            _ => false,
        };

        if !merged {
            target.insert(field.clone(), want.clone());
        }
    }
}

/// Merges list elements matched by `key`; unmatched elements are appended.
fn merge_lists(
    target: &mut Vec<Value>,
    desired: &[Value],
    key: &str,
    path: &str,
    merge_keys: &[MergeKey],
) {
    for item in desired {
        let position = item
            .get(key)
            .filter(|id| !id.is_null())
            .and_then(|id| target.iter().position(|have| have.get(key) == Some(id)));

        match (position, item) {
            (Some(index), Value::Object(want)) => {
                if let Value::Object(have) = &mut target[index] {
                    merge_objects(have, want, path, merge_keys);
                } else {
                    target[index] = item.clone();
                }
            }
            _ => target.push(item.clone()),
        }
    }
}

/// Minimal merge patch turning `existing` into `target`.
fn diff_objects(existing: &Map<String, Value>, target: &Map<String, Value>) -> Map<String, Value> {
    let mut patch = Map::new();

    for (field, want) in target {
        match (existing.get(field), want) {
            (Some(have), want) if have == want => {}
            (Some(Value::Object(have)), Value::Object(want)) => {
                patch.insert(field.clone(), Value::Object(diff_objects(have, want)));
            }
            _ => {
                patch.insert(field.clone(), want.clone());
            }
        }
    }

    for field in existing.keys() {
        if !target.contains_key(field) {
            patch.insert(field.clone(), Value::Null);
        }
    }

    patch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ResourceKind;
    use crate::planner::KindProfile;
    use serde_json::json;

    fn patch_of(existing: &Value, desired: &str) -> Value {
        PatchComputer::new()
            .compute_patch_value(existing, desired, &[])
            .expect("patch failed")
    }

    fn apply(existing: &Value, patch: &Value) -> Value {
        let mut doc = existing.clone();
        json_patch::merge(&mut doc, patch);
        doc
    }

    #[test]
    fn test_patch_overrides_only_desired_fields() {
        let existing = json!({ "a": 1, "b": 2 });
        let patch = patch_of(&existing, "b: 3");

        assert_eq!(patch, json!({ "b": 3 }));
        assert_eq!(apply(&existing, &patch), json!({ "a": 1, "b": 3 }));
    }

    #[test]
    fn test_patch_bytes_are_json() {
        let existing = json!({ "a": 1, "b": 2 });
        let bytes = PatchComputer::new()
            .compute_patch(&existing, "b: 3", &[])
            .expect("patch failed");

        assert_eq!(bytes, br#"{"b":3}"#.to_vec());
    }

    #[test]
    fn test_nested_maps_merge_by_key() {
        let existing = json!({
            "metadata": {
                "name": "api",
                "labels": { "app": "api", "team": "core" },
                "resourceVersion": "41"
            }
        });
        let desired = "metadata:\n  name: api\n  labels:\n    app: api\n    tier: backend\n";

        let patch = patch_of(&existing, desired);
        assert_eq!(patch, json!({ "metadata": { "labels": { "tier": "backend" } } }));

        let merged = apply(&existing, &patch);
        assert_eq!(merged["metadata"]["labels"]["team"], "core");
        assert_eq!(merged["metadata"]["labels"]["tier"], "backend");
        assert_eq!(merged["metadata"]["resourceVersion"], "41");
    }

    #[test]
    fn test_lists_without_merge_key_are_replaced() {
        let existing = json!({ "spec": { "rules": [{ "host": "a" }, { "host": "b" }] } });
        let patch = patch_of(&existing, "spec:\n  rules:\n    - host: c\n");

        assert_eq!(patch, json!({ "spec": { "rules": [{ "host": "c" }] } }));
    }

    #[test]
    fn test_lists_with_merge_key_merge_elements() {
        let existing = json!({
            "kind": "Service",
            "spec": {
                "clusterIP": "10.0.0.7",
                "ports": [
                    { "name": "http", "port": 80, "targetPort": 8080, "protocol": "TCP" },
                    { "name": "metrics", "port": 9090, "protocol": "TCP" }
                ]
            }
        });
        let desired = "kind: Service\nspec:\n  ports:\n    - port: 80\n      targetPort: 8081\n    - port: 443\n";
        let profile = KindProfile::builtin(ResourceKind::NetworkService);

        let patch = PatchComputer::new()
            .compute_patch_value(&existing, desired, &profile.merge_keys)
            .expect("patch failed");
        let merged = apply(&existing, &patch);

        let ports = merged["spec"]["ports"].as_array().expect("ports list");
        assert_eq!(ports.len(), 3);
        assert_eq!(ports[0]["targetPort"], 8081);
        assert_eq!(ports[0]["name"], "http");
        assert_eq!(ports[1]["port"], 9090);
        assert_eq!(ports[2]["port"], 443);
        assert_eq!(merged["spec"]["clusterIP"], "10.0.0.7");
    }

    #[test]
    fn test_nested_merge_keys_in_containers() {
        let existing = json!({
            "spec": { "template": { "spec": { "containers": [{
                "name": "app",
                "image": "shop:41",
                "env": [{ "name": "MODE", "value": "prod" }, { "name": "DEBUG", "value": "0" }]
            }]}}}
        });
        let desired = r#"{"spec":{"template":{"spec":{"containers":[{"name":"app","image":"shop:42","env":[{"name":"DEBUG","value":"1"}]}]}}}}"#;
        let profile = KindProfile::builtin(ResourceKind::Workload);

        let patch = PatchComputer::new()
            .compute_patch_value(&existing, desired, &profile.merge_keys)
            .expect("patch failed");
        let merged = apply(&existing, &patch);

        let container = &merged["spec"]["template"]["spec"]["containers"][0];
        assert_eq!(container["image"], "shop:42");
        assert_eq!(container["env"][0], json!({ "name": "MODE", "value": "prod" }));
        assert_eq!(container["env"][1], json!({ "name": "DEBUG", "value": "1" }));
    }

    #[test]
    fn test_merge_law_holds() {
        let existing = json!({
            "kind": "Service",
            "metadata": { "name": "api", "annotations": { "owner": "ops" } },
            "spec": { "type": "ClusterIP", "selector": { "app": "api" } }
        });
        let desired = "kind: Service\nmetadata:\n  name: api\nspec:\n  type: NodePort\n  selector:\n    app: api-v2\n";

        let merged = apply(&existing, &patch_of(&existing, desired));

        assert_eq!(merged["spec"]["type"], "NodePort");
        assert_eq!(merged["spec"]["selector"]["app"], "api-v2");
        assert_eq!(merged["metadata"]["annotations"]["owner"], "ops");
        assert_eq!(merged["metadata"]["name"], "api");
    }

    #[test]
    fn test_explicit_null_removes_field() {
        let existing = json!({ "a": 1, "b": 2 });
        let patch = patch_of(&existing, "b: null");

        assert_eq!(patch, json!({ "b": null }));
        assert_eq!(apply(&existing, &patch), json!({ "a": 1 }));
    }

    #[test]
    fn test_unchanged_document_yields_empty_patch() {
        let existing = json!({ "kind": "Service", "metadata": { "name": "api", "uid": "x" } });
        let patch = patch_of(&existing, "kind: Service\nmetadata:\n  name: api\n");

        assert_eq!(patch, json!({}));
    }

    #[test]
    fn test_incompatible_kinds_rejected() {
        let existing = json!({ "kind": "Service", "metadata": { "name": "api" } });
        let result = PatchComputer::new().compute_patch(&existing, "kind: Ingress\n", &[]);

        assert!(matches!(result, Err(PatchError::IncompatibleKinds { .. })));
    }

    #[test]
    fn test_unparsable_desired_rejected() {
        let existing = json!({ "a": 1 });
        let result = PatchComputer::new().compute_patch(&existing, "a: [1, 2", &[]);

        assert!(matches!(
            result,
            Err(PatchError::Parse {
                side: PatchSide::Desired,
                ..
            })
        ));
    }

    #[test]
    fn test_non_object_sides_rejected() {
        let computer = PatchComputer::new();

        assert!(matches!(
            computer.compute_patch(&json!([1, 2]), "a: 1", &[]),
            Err(PatchError::NotAnObject {
                side: PatchSide::Existing
            })
        ));
        assert!(matches!(
            computer.compute_patch(&json!({ "a": 1 }), "- 1\n- 2\n", &[]),
            Err(PatchError::NotAnObject {
                side: PatchSide::Desired
            })
        ));
    }
}
