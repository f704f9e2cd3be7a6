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

//! Core Kubernetes API types (PodSpec, Container, ResourceRequirements) and the
//! workload objects that embed a pod spec.
//!
//! Only the fields the policy inspects are typed. Every other field is carried
//! through untouched so a mutated object serializes back with its original content.

use crate::admission::{AdmissionError, AdmissionResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::any::Any;
use std::fmt;

/// ApiObject is a trait for Kubernetes API objects that can be used in admission.
pub trait ApiObject: Send + Sync {
    /// Returns the object as Any for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Returns the object as mutable Any for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Returns the kind of this object.
    fn kind(&self) -> &str;
}

// ============================================================================
// Resource Types
// ============================================================================

/// ResourceKind is one of the compute resources the policy bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Cpu,
    Memory,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Cpu => "cpu",
            ResourceKind::Memory => "memory",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ResourceMode selects between the limits and the requests of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceMode {
    Limit,
    Request,
}

impl ResourceMode {
    pub const ALL: [ResourceMode; 2] = [ResourceMode::Limit, ResourceMode::Request];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceMode::Limit => "limit",
            ResourceMode::Request => "request",
        }
    }

    /// Name of the ResourceRequirements field holding this mode.
    pub fn field_name(&self) -> &'static str {
        match self {
            ResourceMode::Limit => "limits",
            ResourceMode::Request => "requests",
        }
    }
}

impl fmt::Display for ResourceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ResourceList maps resource names to quantity strings.
///
/// `cpu` and `memory` are typed; other resource names (ephemeral-storage,
/// extended resources) are kept as they were received.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceList {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl ResourceList {
    /// Create a resource list holding just cpu and memory values.
    pub fn new(cpu: Option<&str>, memory: Option<&str>) -> Self {
        Self {
            cpu: cpu.map(String::from),
            memory: memory.map(String::from),
            other: Map::new(),
        }
    }

    pub fn get(&self, kind: ResourceKind) -> Option<&str> {
        match kind {
            ResourceKind::Cpu => self.cpu.as_deref(),
            ResourceKind::Memory => self.memory.as_deref(),
        }
    }

    pub fn set(&mut self, kind: ResourceKind, value: String) {
        match kind {
            ResourceKind::Cpu => self.cpu = Some(value),
            ResourceKind::Memory => self.memory = Some(value),
        }
    }
}

/// ResourceRequirements describes the compute resource requirements.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceRequirements {
    /// Limits describes the maximum amount of compute resources allowed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<ResourceList>,
    /// Requests describes the minimum amount of compute resources required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests: Option<ResourceList>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl ResourceRequirements {
    /// Requirements with empty limits and requests lists.
    pub fn empty() -> Self {
        Self {
            limits: Some(ResourceList::default()),
            requests: Some(ResourceList::default()),
            other: Map::new(),
        }
    }

    pub fn list(&self, mode: ResourceMode) -> Option<&ResourceList> {
        match mode {
            ResourceMode::Limit => self.limits.as_ref(),
            ResourceMode::Request => self.requests.as_ref(),
        }
    }

    /// Returns the list for the given mode, creating an empty one if missing.
    pub fn list_mut(&mut self, mode: ResourceMode) -> &mut ResourceList {
        match mode {
            ResourceMode::Limit => self.limits.get_or_insert_with(ResourceList::default),
            ResourceMode::Request => self.requests.get_or_insert_with(ResourceList::default),
        }
    }
}

// ============================================================================
// Container
// ============================================================================

/// Container represents a single container in a pod.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Container {
    /// Name of the container.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Container image name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
    /// Compute Resources required by this container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl Container {
    /// Create a new container with the given name and image.
    pub fn new(name: &str, image: &str) -> Self {
        Self {
            name: name.to_string(),
            image: image.to_string(),
            resources: None,
            other: Map::new(),
        }
    }

    /// Create a new container with the given resource requirements.
    pub fn with_resources(name: &str, image: &str, resources: ResourceRequirements) -> Self {
        Self {
            resources: Some(resources),
            ..Self::new(name, image)
        }
    }
}

// ============================================================================
// PodSpec
// ============================================================================

/// PodSpec describes the specification of a pod.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PodSpec {
    /// List of containers.
    #[serde(default)]
    pub containers: Vec<Container>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl PodSpec {
    /// Create a PodSpec from a list of containers.
    pub fn new(containers: Vec<Container>) -> Self {
        Self {
            containers,
            other: Map::new(),
        }
    }
}

// ============================================================================
// Workloads
// ============================================================================

/// WorkloadKind lists the object kinds a pod spec can be extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkloadKind {
    Pod,
    Deployment,
    ReplicaSet,
    StatefulSet,
    DaemonSet,
    ReplicationController,
    Job,
    CronJob,
}

impl WorkloadKind {
    pub fn from_kind(kind: &str) -> Option<Self> {
        match kind {
            "Pod" => Some(WorkloadKind::Pod),
            "Deployment" => Some(WorkloadKind::Deployment),
            "ReplicaSet" => Some(WorkloadKind::ReplicaSet),
            "StatefulSet" => Some(WorkloadKind::StatefulSet),
            "DaemonSet" => Some(WorkloadKind::DaemonSet),
            "ReplicationController" => Some(WorkloadKind::ReplicationController),
            "Job" => Some(WorkloadKind::Job),
            "CronJob" => Some(WorkloadKind::CronJob),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadKind::Pod => "Pod",
            WorkloadKind::Deployment => "Deployment",
            WorkloadKind::ReplicaSet => "ReplicaSet",
            WorkloadKind::StatefulSet => "StatefulSet",
            WorkloadKind::DaemonSet => "DaemonSet",
            WorkloadKind::ReplicationController => "ReplicationController",
            WorkloadKind::Job => "Job",
            WorkloadKind::CronJob => "CronJob",
        }
    }

    /// Path of the pod spec inside an object of this kind.
    pub fn pod_spec_path(&self) -> &'static [&'static str] {
        match self {
            WorkloadKind::Pod => &["spec"],
            WorkloadKind::CronJob => &["spec", "jobTemplate", "spec", "template", "spec"],
            _ => &["spec", "template", "spec"],
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workload is an admission object that embeds a pod spec.
#[derive(Debug, Clone, PartialEq)]
pub struct Workload {
    kind: WorkloadKind,
    object: Value,
    modified: bool,
}

impl Workload {
    /// Wrap a raw object of the given kind.
    pub fn new(kind: &str, object: Value) -> AdmissionResult<Self> {
        let kind = WorkloadKind::from_kind(kind).ok_or_else(|| {
            AdmissionError::bad_request(format!("object kind {:?} does not embed a pod spec", kind))
        })?;
        if !object.is_object() {
            return Err(AdmissionError::bad_request(format!(
                "{} object is not a JSON object",
                kind
            )));
        }
        Ok(Self {
            kind,
            object,
            modified: false,
        })
    }

    pub fn workload_kind(&self) -> WorkloadKind {
        self.kind
    }

    /// Dotted field path of the pod spec, e.g. "spec.template.spec".
    pub fn pod_spec_field(&self) -> String {
        self.kind.pod_spec_path().join(".")
    }

    fn pod_spec_pointer(&self) -> String {
        format!("/{}", self.kind.pod_spec_path().join("/"))
    }

    /// Decode the embedded pod spec.
    pub fn pod_spec(&self) -> AdmissionResult<PodSpec> {
        let value = self.object.pointer(&self.pod_spec_pointer()).ok_or_else(|| {
            AdmissionError::bad_request(format!(
                "{} object has no pod spec at {}",
                self.kind,
                self.pod_spec_field()
            ))
        })?;
        serde_json::from_value(value.clone()).map_err(|e| {
            AdmissionError::bad_request(format!(
                "unable to decode {}.{}: {}",
                self.kind,
                self.pod_spec_field(),
                e
            ))
        })
    }

    /// Replace the embedded pod spec and mark the object as modified.
    pub fn set_pod_spec(&mut self, pod_spec: &PodSpec) -> AdmissionResult<()> {
        let encoded = serde_json::to_value(pod_spec).map_err(|e| {
            AdmissionError::internal_error(format!("unable to encode pod spec: {}", e))
        })?;
        let pointer = self.pod_spec_pointer();
        let slot = self.object.pointer_mut(&pointer).ok_or_else(|| {
            AdmissionError::internal_error(format!("{} object lost its pod spec", self.kind))
        })?;
        *slot = encoded;
        self.modified = true;
        Ok(())
    }

    /// Returns true once the pod spec has been replaced.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn object(&self) -> &Value {
        &self.object
    }
}

impl ApiObject for Workload {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn kind(&self) -> &str {
        self.kind.as_str()
    }
}
