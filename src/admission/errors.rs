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

//! Admission error types.

use thiserror::Error;

/// Result type for admission operations.
pub type AdmissionResult<T> = Result<T, AdmissionError>;

/// Errors an admission plugin can reject a request with.
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// The request or its object could not be understood.
    #[error("{0}")]
    BadRequest(String),

    /// The object was understood but one of its fields is not acceptable.
    #[error("{resource} \"{name}\" is forbidden: {field_error}")]
    Forbidden {
        name: String,
        namespace: String,
        resource: String,
        field_error: FieldError,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl AdmissionError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        AdmissionError::BadRequest(msg.into())
    }

    /// Reject the named object because of `field_error`.
    pub fn forbidden(
        name: impl Into<String>,
        namespace: impl Into<String>,
        resource: impl Into<String>,
        field_error: FieldError,
    ) -> Self {
        AdmissionError::Forbidden {
            name: name.into(),
            namespace: namespace.into(),
            resource: resource.into(),
            field_error,
        }
    }

    pub fn internal_error(msg: impl Into<String>) -> Self {
        AdmissionError::Internal(msg.into())
    }

    /// The field error behind a forbidden rejection.
    pub fn field_error(&self) -> Option<&FieldError> {
        match self {
            AdmissionError::Forbidden { field_error, .. } => Some(field_error),
            _ => None,
        }
    }
}

/// FieldError reports an invalid value at a field path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: Invalid value: {value:?}: {detail}")]
pub struct FieldError {
    pub field: String,
    pub value: String,
    pub detail: String,
}

impl FieldError {
    pub fn invalid(
        field: impl Into<String>,
        value: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            detail: detail.into(),
        }
    }
}
