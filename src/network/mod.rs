// Copyright 2025 Vijaykumar Singh
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! Network layer implementation for VectorGate

pub mod middleware;
pub mod rest;

pub use middleware::CurrentUser;
pub use rest::{create_router, ApiError, AppState, RestServer, RunningServer};
