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

//! ContainerResources admission controller.
//!
//! This admission controller caps the cpu and memory limits and requests of every
//! container in a workload at the maxima configured in its settings. Containers
//! that do not declare a value for a capped resource receive the maximum.
//! Containers running one of the ignored images are left untouched.

pub mod clamp;
pub mod settings;

pub use clamp::{clamp_container, clamp_resource, ClampError};
pub use settings::{RawSettings, Settings, SettingsError, SettingsField};

use crate::admission::{
    AdmissionError, AdmissionResult, Attributes, FieldError, Handler, Interface, MutationInterface,
    Operation,
};
use crate::api::core::{PodSpec, Workload};
use tracing::debug;

/// Plugin name for the ContainerResources admission controller.
pub const PLUGIN_NAME: &str = "ContainerResources";

/// Outcome of evaluating a pod spec against the settings.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    /// Every container is already within the configured maxima.
    Accept,
    /// The pod spec with clamped resources.
    Mutate(PodSpec),
}

/// Clamp every container of `pod_spec` in place.
///
/// Containers with an ignored image are skipped. The first invalid value aborts
/// the traversal and containers before it keep their changes.
pub fn apply(pod_spec: &mut PodSpec, settings: &Settings) -> Result<bool, ClampError> {
    let mut mutated = false;
    for (index, container) in pod_spec.containers.iter_mut().enumerate() {
        if settings.ignores_image(&container.image) {
            continue;
        }
        mutated |= clamp_container(container, index, settings)?;
    }
    Ok(mutated)
}

/// ContainerResources is an implementation of admission.Interface.
pub struct ContainerResources {
    handler: Handler,
    settings: Settings,
}

impl ContainerResources {
    /// Create a new ContainerResources admission controller.
    pub fn new(settings: Settings) -> Self {
        Self {
            handler: Handler::new_create_update(),
            settings,
        }
    }

    /// Evaluate a pod spec without touching it.
    pub fn evaluate(&self, pod_spec: &PodSpec) -> Result<Evaluation, ClampError> {
        let mut working = pod_spec.clone();
        if apply(&mut working, &self.settings)? {
            Ok(Evaluation::Mutate(working))
        } else {
            Ok(Evaluation::Accept)
        }
    }

    fn should_ignore(&self, attributes: &dyn Attributes) -> bool {
        !attributes.get_subresource().is_empty() || !self.handles(attributes.get_operation())
    }
}

impl Interface for ContainerResources {
    fn handles(&self, operation: Operation) -> bool {
        self.handler.handles(operation)
    }
}

impl MutationInterface for ContainerResources {
    fn admit(&self, attributes: &mut dyn Attributes) -> AdmissionResult<()> {
        if self.should_ignore(attributes) {
            return Ok(());
        }

        let name = attributes.get_name().to_string();
        let namespace = attributes.get_namespace().to_string();
        let resource = attributes.get_resource().resource.clone();
        let kind = attributes.get_kind().kind.clone();

        let workload = attributes
            .get_object_mut()
            .and_then(|obj| obj.as_any_mut().downcast_mut::<Workload>())
            .ok_or_else(|| {
                AdmissionError::bad_request("Resource was unable to be converted to a workload")
            })?;

        let pod_spec = workload.pod_spec()?;
        match self.evaluate(&pod_spec) {
            Ok(Evaluation::Accept) => Ok(()),
            Ok(Evaluation::Mutate(clamped)) => {
                debug!(
                    plugin = PLUGIN_NAME,
                    %kind,
                    %name,
                    %namespace,
                    "clamped container resources"
                );
                workload.set_pod_spec(&clamped)
            }
            Err(err) => {
                let field = err.field_path(&workload.pod_spec_field());
                Err(AdmissionError::forbidden(
                    name,
                    namespace,
                    resource,
                    FieldError::invalid(field, err.value(), err.to_string()),
                ))
            }
        }
    }
}
