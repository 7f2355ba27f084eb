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

//! Bearer-token authentication middleware for the VectorGate HTTP API

use axum::{
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::core::AuthError;
use crate::network::rest::errors::ApiError;
use crate::network::rest::handlers::AppState;
use crate::services::UserProfile;

/// Authenticated caller, inserted into request extensions
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserProfile);

impl CurrentUser {
    /// Fail with 403 unless the caller is an administrator
    pub fn require_admin(&self) -> Result<&UserProfile, ApiError> {
        if self.0.is_admin {
            Ok(&self.0)
        } else {
            Err(AuthError::Forbidden(format!(
                "user '{}' is not an administrator",
                self.0.username
            ))
            .into())
        }
    }
}

/// Resolve `Authorization: Bearer <jwt>` to a user or reject with 401
pub async fn require_bearer<B>(
    State(state): State<AppState>,
    mut request: Request<B>,
    next: Next<B>,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers())
        .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?;

    let user = state.users.resolve_token(&token).await?;
    debug!("🔐 {} {} as {}", request.method(), request.uri().path(), user.username);

    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")), Some("abc.def".to_string()));
        assert_eq!(bearer_token(&headers("bearer abc")), Some("abc".to_string()));
        assert_eq!(bearer_token(&headers("Basic abc")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_require_admin() {
        let mut profile = UserProfile {
            id: "u1".to_string(),
            username: "bob".to_string(),
            email: None,
            full_name: None,
            is_admin: false,
        };
        assert!(CurrentUser(profile.clone()).require_admin().is_err());
        profile.is_admin = true;
        assert!(CurrentUser(profile).require_admin().is_ok());
    }
}
