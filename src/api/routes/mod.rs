//! Route tables, one module per feature area. Each module exposes a
//! `router()` that is nested under its prefix in [`super::build_router`].

pub mod admin;
pub mod auth;
pub mod chatbot;
pub mod crop_doctor;
pub mod farm;
pub mod marketplace;
pub mod soil;
pub mod weather;

use super::response::ApiResponse;
use axum::http::StatusCode;

pub async fn not_found() -> ApiResponse<()> {
    ApiResponse::failure(StatusCode::NOT_FOUND, "Endpoint not found")
}

#[cfg(test)]
pub(crate) mod testing {
    //! Helpers for driving the router with `oneshot`.
    #![allow(clippy::unwrap_used)]

    use crate::api::{AppState, build_router};
    use crate::config::Settings;
    use crate::core::auth;
    use crate::providers::Providers;
    use crate::test_utils::{TEST_PASSWORD, setup_test_db};
    use axum::{
        Router,
        body::Body,
        http::{Method, Request, StatusCode, header},
    };
    use sea_orm::DatabaseConnection;
    use serde_json::Value;
    use tower::ServiceExt;

    pub struct TestApp {
        pub db: DatabaseConnection,
        pub settings: Settings,
        router: Router,
    }

    impl TestApp {
        pub async fn new(providers: Providers) -> Self {
            let db = setup_test_db().await.unwrap();
            let settings = crate::test_utils::test_settings();
            let state = AppState::new(db.clone(), settings.clone(), providers);
            Self {
                db,
                settings,
                router: build_router(state),
            }
        }

        /// Logs `username` in and returns the bearer token.
        pub async fn token(&self, username: &str) -> String {
            auth::login(&self.db, username, TEST_PASSWORD, self.settings.token_ttl())
                .await
                .unwrap()
                .access_token
        }

        pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, body)
        }

        pub async fn raw(&self, request: Request<Body>) -> axum::response::Response {
            self.router.clone().oneshot(request).await.unwrap()
        }

        pub async fn call(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            self.send(request(method, uri, token, body)).await
        }
    }

    pub fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    /// Builds a `multipart/form-data` body from `(name, filename, content_type, bytes)` parts.
    pub fn multipart(
        uri: &str,
        token: &str,
        parts: &[(&str, Option<&str>, &str, &[u8])],
    ) -> Request<Body> {
        let boundary = "kisan-sathi-test-boundary";
        let mut body = Vec::new();
        for (name, filename, content_type, bytes) in parts {
            body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
            let disposition = match filename {
                Some(file) => format!("Content-Disposition: form-data; name=\"{name}\"; filename=\"{file}\"\r\n"),
                None => format!("Content-Disposition: form-data; name=\"{name}\"\r\n"),
            };
            body.extend_from_slice(disposition.as_bytes());
            body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap()
    }
}
