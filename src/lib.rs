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

//! Container resources admission policy
//!
//! This crate caps the cpu and memory limits and requests of the containers in
//! Kubernetes workloads. It is laid out like an apiserver admission plugin: the
//! `admission` module holds the shared interfaces, `api` the object types and
//! the resource quantity, and `plugins::containerresources` the policy itself.
//! The `policy` module speaks the JSON protocol of the policy host.

pub mod admission;
pub mod api;
pub mod plugins;
pub mod policy;

// Re-export commonly used types
pub use admission::{Attributes, Handler, Interface, MutationInterface, Operation};
pub use api::core::{Container, PodSpec, ResourceKind, ResourceMode, Workload};
pub use api::resource::Quantity;
pub use plugins::containerresources::{ContainerResources, Evaluation, RawSettings, Settings};
