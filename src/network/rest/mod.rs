// Copyright 2025 Vijaykumar Singh
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! REST API (axum)

pub mod errors;
pub mod handlers;
pub mod models;
pub mod server;

pub use errors::ApiError;
pub use handlers::{create_router, AppState};
pub use server::{RestServer, RunningServer};
