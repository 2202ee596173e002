//! Request extractors: the authenticated caller and envelope-aware JSON,
//! query and path parsing.

use super::AppState;
use crate::{
    core::auth,
    entities::{UserRole, user},
    errors::{Error, Result},
};
use axum::{
    extract::{FromRequest, FromRequestParts, Multipart},
    http::{header::AUTHORIZATION, request::Parts},
};
use std::collections::HashMap;

/// `axum::Json` whose rejection uses the failure envelope.
#[derive(Debug, Clone, Copy, Default, FromRequest)]
#[from_request(via(axum::Json), rejection(Error))]
pub struct Json<T>(pub T);

/// `axum::extract::Query` whose rejection uses the failure envelope.
#[derive(Debug, Clone, Copy, Default, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(Error))]
pub struct Query<T>(pub T);

/// `axum::extract::Path` whose rejection uses the failure envelope.
#[derive(Debug, Clone, Copy, Default, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(Error))]
pub struct Path<T>(pub T);

/// Token from an `Authorization: Bearer <token>` header.
fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: user::Model,
    pub token: String,
}

impl AuthUser {
    #[must_use]
    pub const fn id(&self) -> i64 {
        self.user.id
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.user.role == UserRole::Admin
    }

    pub fn require_admin(&self) -> Result<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(Error::forbidden("Admin access required"))
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token = bearer_token(parts).ok_or_else(|| Error::Unauthorized {
            message: "Authentication credentials were not provided".to_string(),
        })?;
        let user = auth::authenticate(&state.db, token).await?;
        Ok(Self {
            user,
            token: token.to_string(),
        })
    }
}

/// An authenticated admin; anyone else gets 403.
#[derive(Debug, Clone)]
pub struct AdminUser(pub user::Model);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let caller = AuthUser::from_request_parts(parts, state).await?;
        caller.require_admin()?;
        Ok(Self(caller.user))
    }
}

/// A file plus the text fields of a `multipart/form-data` body.
#[derive(Debug, Default)]
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
    pub fields: HashMap<String, String>,
}

impl Upload {
    /// Reads every part; the part named `file_field` becomes the file and the
    /// rest are kept as text.
    pub async fn read(mut multipart: Multipart, file_field: &str) -> Result<Self> {
        let mut upload = Self::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            if name == file_field {
                upload.file_name = field.file_name().unwrap_or_default().to_string();
                upload.content_type = field.content_type().unwrap_or_default().to_string();
                upload.bytes = field.bytes().await?.to_vec();
            } else {
                let value = field.text().await?;
                upload.fields.insert(name, value);
            }
        }
        Ok(upload)
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap_or_default().into_parts().0
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&parts(Some("Bearer abc"))), Some("abc"));
        assert_eq!(bearer_token(&parts(Some("bearer  abc "))), Some("abc"));
        assert_eq!(bearer_token(&parts(Some("Token abc"))), None);
        assert_eq!(bearer_token(&parts(Some("Bearer "))), None);
        assert_eq!(bearer_token(&parts(None)), None);
    }
}
