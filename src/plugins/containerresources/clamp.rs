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

//! Clamping of a single container's cpu and memory limits and requests.

use super::settings::Settings;
use crate::api::core::{Container, ResourceKind, ResourceMode, ResourceRequirements};
use crate::api::resource::{Quantity, QuantityError};
use thiserror::Error;

/// Errors returned while clamping container resources.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClampError {
    /// A container carries a resource value that is not a valid quantity.
    #[error("invalid {kind} {mode} {value:?} in container {container_index}: {source}")]
    InvalidContainerQuantity {
        kind: ResourceKind,
        mode: ResourceMode,
        container_index: usize,
        value: String,
        #[source]
        source: QuantityError,
    },
}

impl ClampError {
    /// Field path of the offending value below the given pod spec path.
    pub fn field_path(&self, pod_spec_path: &str) -> String {
        match self {
            ClampError::InvalidContainerQuantity {
                kind,
                mode,
                container_index,
                ..
            } => format!(
                "{}.containers[{}].resources.{}.{}",
                pod_spec_path,
                container_index,
                mode.field_name(),
                kind
            ),
        }
    }

    /// The value found in the container.
    pub fn value(&self) -> &str {
        match self {
            ClampError::InvalidContainerQuantity { value, .. } => value,
        }
    }
}

/// Current state of one resource value in a container.
enum Current<'a> {
    Missing,
    Blank,
    Present(&'a str),
}

impl<'a> Current<'a> {
    fn read(resources: &'a ResourceRequirements, kind: ResourceKind, mode: ResourceMode) -> Self {
        match resources.list(mode).and_then(|list| list.get(kind)) {
            None => Current::Missing,
            Some(value) if value.trim().is_empty() => Current::Blank,
            Some(value) => Current::Present(value),
        }
    }
}

/// Clamp one (kind, mode) value of a container to `max`.
///
/// Missing or blank values are filled in with the maximum. Returns whether the
/// value was changed.
pub fn clamp_resource(
    resources: &mut ResourceRequirements,
    kind: ResourceKind,
    mode: ResourceMode,
    max: Option<&Quantity>,
    container_index: usize,
) -> Result<bool, ClampError> {
    let Some(max) = max else {
        return Ok(false);
    };

    let within_max = match Current::read(resources, kind, mode) {
        Current::Missing | Current::Blank => false,
        Current::Present(value) => {
            let current =
                Quantity::parse(value).map_err(|source| ClampError::InvalidContainerQuantity {
                    kind,
                    mode,
                    container_index,
                    value: value.to_string(),
                    source,
                })?;
            current <= *max
        }
    };

    if within_max {
        return Ok(false);
    }
    resources.list_mut(mode).set(kind, max.to_string());
    Ok(true)
}

/// Clamp all four (kind, mode) values of a container.
///
/// Limits are handled before requests and memory before cpu. The first invalid
/// value aborts the remaining sub-decisions.
pub fn clamp_container(
    container: &mut Container,
    container_index: usize,
    settings: &Settings,
) -> Result<bool, ClampError> {
    let resources = container
        .resources
        .get_or_insert_with(ResourceRequirements::empty);

    let mut mutated = false;
    for mode in ResourceMode::ALL {
        for kind in [ResourceKind::Memory, ResourceKind::Cpu] {
            let max = settings.max(kind, mode);
            mutated |= clamp_resource(resources, kind, mode, max, container_index)?;
        }
    }
    Ok(mutated)
}
