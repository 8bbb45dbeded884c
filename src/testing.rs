//! Router test helpers.

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::{app::build_app, mailer::RecordingMailer, state::AppState};

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub mailer: std::sync::Arc<RecordingMailer>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub fn new() -> Self {
        let (state, mailer) = AppState::fake();
        Self {
            router: build_app(state.clone()),
            state,
            mailer,
        }
    }

    pub async fn request(&self, req: Request<Body>) -> TestResponse {
        let res = self.router.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let headers = res.headers().clone();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        TestResponse { status, headers, body }
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        bearer: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(v) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        self.request(builder.body(body).unwrap()).await
    }

    /// Register `email`, optionally activate it, and return a fresh bearer token.
    pub async fn signed_in(&self, email: &str, activate: bool) -> (i64, String) {
        let res = self
            .send(
                Method::POST,
                "/v1/users",
                Some(json!({ "name": "Tester", "email": email, "password": "longenough1" })),
                None,
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
        let id = res.body["user"]["id"].as_i64().unwrap();

        if activate {
            let token = self.mailer.last_token_for(email).unwrap();
            let res = self
                .send(
                    Method::PUT,
                    "/v1/users/activated",
                    Some(json!({ "token": token })),
                    None,
                )
                .await;
            assert_eq!(res.status, StatusCode::OK, "{}", res.body);
        }

        let res = self
            .send(
                Method::POST,
                "/v1/tokens/authentication",
                Some(json!({ "email": email, "password": "longenough1" })),
                None,
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
        let token = res.body["authentication_token"]["token"]
            .as_str()
            .unwrap()
            .to_string();
        (id, token)
    }
}
