// Copyright 2024 The Kubernetes Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! JSON protocol spoken with the policy host.
//!
//! The host sends a `ValidationRequest` carrying the admission request and the
//! policy settings, and expects a `ValidationResponse` back. Settings submitted
//! on their own are answered with a `SettingsValidationResponse`.

use crate::admission::{
    AdmissionResult, AttributesRecord, GroupVersionKind, GroupVersionResource, MutationInterface,
    Operation,
};
use crate::api::core::{ApiObject, Workload};
use crate::plugins::containerresources::{ContainerResources, RawSettings, Settings};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Code attached to every rejected request.
pub const REJECT_CODE: u16 = 400;

/// The admission request as forwarded by the host.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AdmissionRequest {
    pub uid: String,
    pub kind: GroupVersionKind,
    pub resource: GroupVersionResource,
    pub sub_resource: String,
    pub operation: String,
    pub name: String,
    pub namespace: String,
    pub object: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidationRequest {
    pub request: AdmissionRequest,
    #[serde(default)]
    pub settings: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResponse {
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mutated_object: Option<Value>,
}

impl ValidationResponse {
    pub fn accept() -> Self {
        Self {
            accepted: true,
            message: None,
            code: None,
            mutated_object: None,
        }
    }

    /// Accept the request, replacing its object with `object`.
    pub fn mutate(object: Value) -> Self {
        Self {
            mutated_object: Some(object),
            ..Self::accept()
        }
    }

    pub fn reject(message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            message: Some(message.into()),
            code: Some(REJECT_CODE),
            mutated_object: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsValidationResponse {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SettingsValidationResponse {
    pub fn accept() -> Self {
        Self {
            valid: true,
            message: None,
        }
    }

    pub fn reject(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: Some(message.into()),
        }
    }
}

/// Validate a settings document submitted by the host.
pub fn validate_settings(payload: &[u8]) -> SettingsValidationResponse {
    info!("validating settings");
    match RawSettings::from_slice(payload).and_then(|raw| raw.validate()) {
        Ok(settings) => {
            debug!(ignored_images = settings.ignore_images().len(), "settings are valid");
            SettingsValidationResponse::accept()
        }
        Err(err) => {
            warn!(
                field = err.field().map(|field| field.as_str()),
                error = %err,
                "rejecting settings"
            );
            SettingsValidationResponse::reject(format!(
                "Provided settings are not valid: {}",
                err
            ))
        }
    }
}

/// Evaluate an admission request against the settings it carries.
pub fn validate(payload: &[u8]) -> ValidationResponse {
    let request: ValidationRequest = match serde_json::from_slice(payload) {
        Ok(request) => request,
        Err(err) => {
            warn!(error = %err, "rejecting undecodable request");
            return ValidationResponse::reject(err.to_string());
        }
    };

    let settings = match RawSettings::from_value(request.settings).and_then(|raw| raw.validate()) {
        Ok(settings) => settings,
        Err(err) => {
            warn!(
                uid = %request.request.uid,
                field = err.field().map(|field| field.as_str()),
                error = %err,
                "rejecting request with invalid settings"
            );
            return ValidationResponse::reject(err.to_string());
        }
    };

    let uid = request.request.uid.clone();
    match evaluate_request(request.request, settings) {
        Ok(Some(object)) => {
            debug!(%uid, "mutating request");
            ValidationResponse::mutate(object)
        }
        Ok(None) => ValidationResponse::accept(),
        Err(err) => {
            warn!(
                %uid,
                field = err.field_error().map(|field_error| field_error.field.as_str()),
                error = %err,
                "rejecting request"
            );
            ValidationResponse::reject(err.to_string())
        }
    }
}

/// Run the plugin over the request, returning the mutated object if any.
fn evaluate_request(
    request: AdmissionRequest,
    settings: Settings,
) -> AdmissionResult<Option<Value>> {
    let operation: Operation = request.operation.parse()?;
    let object = if request.object.is_null() {
        None
    } else {
        let workload = Workload::new(&request.kind.kind, request.object)?;
        Some(Box::new(workload) as Box<dyn ApiObject>)
    };

    let mut attributes = AttributesRecord::new(
        &request.name,
        &request.namespace,
        request.resource,
        &request.sub_resource,
        operation,
        object,
        request.kind,
    );
    ContainerResources::new(settings).admit(&mut attributes)?;

    Ok(attributes
        .get_workload()
        .filter(|workload| workload.is_modified())
        .map(|workload| workload.object().clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(settings: Value, object: Value) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "request": {
                "uid": "705ab4f5-6393-11e8-b7cc-42010a800002",
                "kind": {"group": "", "version": "v1", "kind": "Pod"},
                "resource": {"group": "", "version": "v1", "resource": "pods"},
                "operation": "CREATE",
                "name": "nginx",
                "namespace": "default",
                "object": object,
            },
            "settings": settings,
        }))
        .unwrap()
    }

    fn pod(resources: Value) -> Value {
        json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {"name": "nginx"},
            "spec": {"containers": [{"name": "nginx", "image": "nginx", "resources": resources}]},
        })
    }

    #[test]
    fn test_validate_settings_accepts() {
        let response = validate_settings(br#"{"maxCpuLimit": "500m"}"#);
        assert_eq!(response, SettingsValidationResponse::accept());
    }

    #[test]
    fn test_validate_settings_rejects() {
        let response = validate_settings(b"{}");
        assert!(!response.valid);
        assert_eq!(
            response.message.as_deref(),
            Some("Provided settings are not valid: no settings provided. At least one resource limit or request must be verified")
        );

        let response = validate_settings(br#"{"maxMemoryRequest": "1Zi"}"#);
        assert!(!response.valid);
        assert!(response
            .message
            .unwrap()
            .starts_with("Provided settings are not valid: failed to parse memory request quantity"));

        assert!(!validate_settings(b"[1, 2").valid);
    }

    #[test]
    fn test_validate_accepts_within_limits() {
        let payload = request(
            json!({"maxCpuLimit": "1"}),
            pod(json!({"limits": {"cpu": "250m"}})),
        );
        assert_eq!(validate(&payload), ValidationResponse::accept());
    }

    #[test]
    fn test_validate_mutates() {
        let payload = request(
            json!({"maxCpuLimit": "1", "maxMemoryRequest": "128Mi"}),
            pod(json!({"limits": {"cpu": "3"}})),
        );
        let response = validate(&payload);
        assert!(response.accepted);
        let object = response.mutated_object.unwrap();
        assert_eq!(
            object["spec"]["containers"][0]["resources"],
            json!({"limits": {"cpu": "1"}, "requests": {"memory": "128Mi"}})
        );
        assert_eq!(object["metadata"]["name"], "nginx");
    }

    #[test]
    fn test_validate_rejects_invalid_container_value() {
        let payload = request(
            json!({"maxCpuLimit": "1"}),
            pod(json!({"limits": {"cpu": "1.2.3"}})),
        );
        let response = validate(&payload);
        assert!(!response.accepted);
        assert_eq!(response.code, Some(REJECT_CODE));
        assert!(response
            .message
            .unwrap()
            .contains("spec.containers[0].resources.limits.cpu"));
    }

    #[test]
    fn test_validate_rejects_invalid_settings() {
        let payload = request(json!({}), pod(json!({})));
        let response = validate(&payload);
        assert!(!response.accepted);
        assert_eq!(response.code, Some(REJECT_CODE));
    }

    #[test]
    fn test_validate_rejects_garbage() {
        let response = validate(b"not json");
        assert!(!response.accepted);
        assert_eq!(response.code, Some(REJECT_CODE));
    }

    #[test]
    fn test_validate_ignores_delete() {
        let mut payload: Value =
            serde_json::from_slice(&request(json!({"maxCpuLimit": "1"}), Value::Null)).unwrap();
        payload["request"]["operation"] = json!("DELETE");
        let response = validate(&serde_json::to_vec(&payload).unwrap());
        assert_eq!(response, ValidationResponse::accept());
    }

    #[test]
    fn test_response_serialization() {
        assert_eq!(
            serde_json::to_value(ValidationResponse::reject("nope")).unwrap(),
            json!({"accepted": false, "message": "nope", "code": 400})
        );
        assert_eq!(
            serde_json::to_value(ValidationResponse::mutate(json!({"kind": "Pod"}))).unwrap(),
            json!({"accepted": true, "mutated_object": {"kind": "Pod"}})
        );
        assert_eq!(
            serde_json::to_value(SettingsValidationResponse::accept()).unwrap(),
            json!({"valid": true})
        );
    }
}
