/*
 * Copyright 2025 Vijaykumar Singh
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Service layer for business logic shared by the REST handlers and the
//! query engine

pub mod connection_service;
pub mod security;
pub mod user_service;

pub use crate::registry::ConnectionPatch;
pub use connection_service::{
    CollectionStats, ConnectionService, ConnectionStatusReport, DatabaseStatistics, IndexStatus,
    NewConnection,
};
pub use security::{AccessToken, PasswordHasher, TokenIssuer};
pub use user_service::{NewUser, UserProfile, UserService};
