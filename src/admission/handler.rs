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

//! Base admission handler implementation.

use super::interfaces::{Interface, Operation};

const CREATE_UPDATE: &[Operation] = &[Operation::Create, Operation::Update];

/// Handler is embedded by admission plugins to answer `handles` from a fixed
/// set of operations.
#[derive(Debug, Clone, Copy)]
pub struct Handler {
    operations: &'static [Operation],
}

impl Handler {
    /// Create a new Handler that handles the given operations.
    pub const fn new(operations: &'static [Operation]) -> Self {
        Self { operations }
    }

    /// Create a new Handler that handles Create and Update operations.
    pub const fn new_create_update() -> Self {
        Self::new(CREATE_UPDATE)
    }
}

impl Interface for Handler {
    fn handles(&self, operation: Operation) -> bool {
        self.operations.contains(&operation)
    }
}
