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

//! Policy settings: the configured maxima and the image exclusion list.

use crate::api::core::{ResourceKind, ResourceMode};
use crate::api::resource::{Quantity, QuantityError};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// SettingsField names one of the four configurable maxima.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingsField {
    CpuLimit,
    MemoryLimit,
    CpuRequest,
    MemoryRequest,
}

impl SettingsField {
    /// Fields in the order they are validated.
    pub const ALL: [SettingsField; 4] = [
        SettingsField::CpuLimit,
        SettingsField::MemoryLimit,
        SettingsField::CpuRequest,
        SettingsField::MemoryRequest,
    ];

    pub fn new(kind: ResourceKind, mode: ResourceMode) -> Self {
        match (kind, mode) {
            (ResourceKind::Cpu, ResourceMode::Limit) => SettingsField::CpuLimit,
            (ResourceKind::Memory, ResourceMode::Limit) => SettingsField::MemoryLimit,
            (ResourceKind::Cpu, ResourceMode::Request) => SettingsField::CpuRequest,
            (ResourceKind::Memory, ResourceMode::Request) => SettingsField::MemoryRequest,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            SettingsField::CpuLimit | SettingsField::CpuRequest => ResourceKind::Cpu,
            SettingsField::MemoryLimit | SettingsField::MemoryRequest => ResourceKind::Memory,
        }
    }

    pub fn mode(&self) -> ResourceMode {
        match self {
            SettingsField::CpuLimit | SettingsField::MemoryLimit => ResourceMode::Limit,
            SettingsField::CpuRequest | SettingsField::MemoryRequest => ResourceMode::Request,
        }
    }

    /// Short identifier, e.g. "cpu-limit".
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingsField::CpuLimit => "cpu-limit",
            SettingsField::MemoryLimit => "memory-limit",
            SettingsField::CpuRequest => "cpu-request",
            SettingsField::MemoryRequest => "memory-request",
        }
    }
}

impl fmt::Display for SettingsField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.mode())
    }
}

/// Errors returned while loading or validating settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("no settings provided. At least one resource limit or request must be verified")]
    NoLimitsConfigured,

    #[error("failed to parse {field} quantity: {source}")]
    QuantityParse {
        field: SettingsField,
        #[source]
        source: QuantityError,
    },

    #[error("{0}")]
    Malformed(#[from] serde_json::Error),
}

impl SettingsError {
    /// The field that failed to parse, if any.
    pub fn field(&self) -> Option<SettingsField> {
        match self {
            SettingsError::QuantityParse { field, .. } => Some(*field),
            _ => None,
        }
    }
}

/// RawSettings is the settings document as the user wrote it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawSettings {
    pub max_cpu_limit: Option<String>,
    pub max_memory_limit: Option<String>,
    pub max_cpu_request: Option<String>,
    pub max_memory_request: Option<String>,
    pub ignore_images: Option<Vec<String>>,
}

impl RawSettings {
    /// Decode settings from a JSON payload. `null` decodes as empty settings.
    pub fn from_slice(payload: &[u8]) -> Result<Self, SettingsError> {
        Self::from_value(serde_json::from_slice(payload)?)
    }

    /// Decode settings from an already parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self, SettingsError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_value(value)?)
    }

    /// The configured string for a field, if not blank.
    fn configured(&self, field: SettingsField) -> Option<&str> {
        let raw = match field {
            SettingsField::CpuLimit => self.max_cpu_limit.as_deref(),
            SettingsField::MemoryLimit => self.max_memory_limit.as_deref(),
            SettingsField::CpuRequest => self.max_cpu_request.as_deref(),
            SettingsField::MemoryRequest => self.max_memory_request.as_deref(),
        };
        raw.filter(|value| !value.trim().is_empty())
    }

    fn parse_field(&self, field: SettingsField) -> Result<Option<Quantity>, SettingsError> {
        self.configured(field)
            .map(|value| {
                Quantity::parse(value)
                    .map_err(|source| SettingsError::QuantityParse { field, source })
            })
            .transpose()
    }

    /// Validate the settings, stopping at the first invalid field.
    pub fn validate(&self) -> Result<Settings, SettingsError> {
        if SettingsField::ALL
            .iter()
            .all(|field| self.configured(*field).is_none())
        {
            return Err(SettingsError::NoLimitsConfigured);
        }

        Ok(Settings {
            cpu_limit: self.parse_field(SettingsField::CpuLimit)?,
            memory_limit: self.parse_field(SettingsField::MemoryLimit)?,
            cpu_request: self.parse_field(SettingsField::CpuRequest)?,
            memory_request: self.parse_field(SettingsField::MemoryRequest)?,
            ignore_images: self.ignore_images.clone().unwrap_or_default(),
        })
    }
}

/// Settings holds the validated maxima. `None` means no maximum is enforced
/// for that resource, which is not the same as a maximum of zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    cpu_limit: Option<Quantity>,
    memory_limit: Option<Quantity>,
    cpu_request: Option<Quantity>,
    memory_request: Option<Quantity>,
    ignore_images: Vec<String>,
}

impl Settings {
    /// The configured maximum for a resource kind and mode.
    pub fn max(&self, kind: ResourceKind, mode: ResourceMode) -> Option<&Quantity> {
        match SettingsField::new(kind, mode) {
            SettingsField::CpuLimit => self.cpu_limit.as_ref(),
            SettingsField::MemoryLimit => self.memory_limit.as_ref(),
            SettingsField::CpuRequest => self.cpu_request.as_ref(),
            SettingsField::MemoryRequest => self.memory_request.as_ref(),
        }
    }

    pub fn ignore_images(&self) -> &[String] {
        &self.ignore_images
    }

    /// Images are matched by exact string equality.
    pub fn ignores_image(&self, image: &str) -> bool {
        self.ignore_images.iter().any(|ignored| ignored == image)
    }
}
