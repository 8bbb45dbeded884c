use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{post, put},
    Json, Router,
};
use serde_json::json;
use tracing::{instrument, warn};

use crate::{
    accounts::{
        dto::{
            ActivateRequest, AuthTokenResponse, LoginRequest, RegisterRequest,
            ResendActivationRequest, UserResponse,
        },
        services::{run_to_completion, AccountManager},
    },
    error::AppError,
    extractors::JsonBody,
    state::AppState,
    validation::{
        normalize_email, validate_email, validate_password, validate_token_plaintext, Validator,
    },
};

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(register))
        .route("/users/activated", put(activate))
        .route("/tokens/authentication", post(login))
        .route("/tokens/activation", post(resend_activation))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let accounts = AccountManager::from_ref(&state);
    let user = run_to_completion(async move {
        accounts
            .register(&payload.name, &payload.email, &payload.password)
            .await
    })
    .await?;

    Ok((StatusCode::CREATED, Json(UserResponse { user: user.into() })))
}

#[instrument(skip(state, payload))]
pub async fn activate(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<ActivateRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let mut v = Validator::new();
    validate_token_plaintext(&mut v, &payload.token);
    v.finish()?;

    let accounts = AccountManager::from_ref(&state);
    let user = run_to_completion(async move { accounts.activate(&payload.token).await }).await?;

    Ok(Json(UserResponse { user: user.into() }))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<(StatusCode, Json<AuthTokenResponse>), AppError> {
    let mut v = Validator::new();
    validate_email(&mut v, &normalize_email(&payload.email));
    validate_password(&mut v, &payload.password);
    if !v.is_valid() {
        warn!("login rejected by validation");
    }
    v.finish()?;

    let token = AccountManager::from_ref(&state)
        .login(&payload.email, &payload.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthTokenResponse {
            authentication_token: (&token).into(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn resend_activation(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<ResendActivationRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let mut v = Validator::new();
    validate_email(&mut v, &normalize_email(&payload.email));
    v.finish()?;

    let accounts = AccountManager::from_ref(&state);
    run_to_completion(async move { accounts.resend_activation(&payload.email).await }).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "message": "an email will be sent to you containing activation instructions"
        })),
    ))
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::{header, Method, Request}};
    use serde_json::json;

    use super::*;
    use crate::testing::TestApp;

    #[tokio::test]
    async fn register_returns_created_user() {
        let app = TestApp::new();
        let res = app
            .send(
                Method::POST,
                "/v1/users",
                Some(json!({ "Name": "test3211", "Email": "test3211@gmail.com", "Password": "test321321" })),
                None,
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED);
        let user = &res.body["user"];
        assert!(user["id"].as_i64().unwrap() > 0);
        assert_eq!(user["name"], "test3211");
        assert_eq!(user["email"], "test3211@gmail.com");
        assert_eq!(user["activated"], false);
        assert!(user["created_at"].is_string());
        assert!(user.get("password").is_none());
        assert!(user.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn register_reports_field_errors() {
        let app = TestApp::new();
        let res = app
            .send(
                Method::POST,
                "/v1/users",
                Some(json!({ "Name": "asdfj", "Email": "asdfjk", "Password": "" })),
                None,
            )
            .await;
        assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(res.body["error"]["password"], "must be provided");
        assert_eq!(res.body["error"]["email"], "must be valid email address");
    }

    #[tokio::test]
    async fn register_rejects_duplicate_email_in_any_case() {
        let app = TestApp::new();
        app.signed_in("dup@x.com", false).await;
        let res = app
            .send(
                Method::POST,
                "/v1/users",
                Some(json!({ "name": "B", "email": "DUP@X.com", "password": "longenough2" })),
                None,
            )
            .await;
        assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            res.body["error"]["email"],
            "a user with this email address already exists"
        );
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let app = TestApp::new();
        let req = Request::builder()
            .method(Method::POST)
            .uri("/v1/users")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"name\": "))
            .unwrap();
        let res = app.request(req).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
        assert!(res.body["error"].is_string());
    }

    #[tokio::test]
    async fn unknown_activation_tokens_are_rejected() {
        let app = TestApp::new();
        for token in ["NY5A4Z7K256WVXYR57HLFE3ZEM", "aaaaaaaaaaaaaaaaaaaaaaaaaa"] {
            let res = app
                .send(
                    Method::PUT,
                    "/v1/users/activated",
                    Some(json!({ "Token": token })),
                    None,
                )
                .await;
            assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
            assert_eq!(res.body["error"]["token"], "invalid or expired activation token");
        }
    }

    #[tokio::test]
    async fn activation_token_shape_is_validated() {
        let app = TestApp::new();
        let res = app
            .send(Method::PUT, "/v1/users/activated", Some(json!({})), None)
            .await;
        assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(res.body["error"]["token"], "must be provided");

        let res = app
            .send(Method::PUT, "/v1/users/activated", Some(json!({ "token": "ABC" })), None)
            .await;
        assert_eq!(res.body["error"]["token"], "must be 26 bytes long");
    }

    #[tokio::test]
    async fn activation_is_single_use_over_http() {
        let app = TestApp::new();
        app.signed_in("a@x.com", false).await;
        let token = app.mailer.last_token_for("a@x.com").unwrap();

        let res = app
            .send(Method::PUT, "/v1/users/activated", Some(json!({ "token": token })), None)
            .await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body["user"]["activated"], true);

        let res = app
            .send(Method::PUT, "/v1/users/activated", Some(json!({ "token": token })), None)
            .await;
        assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(res.body["error"]["token"], "invalid or expired activation token");
    }

    #[tokio::test]
    async fn login_failures_share_one_message() {
        let app = TestApp::new();
        app.signed_in("a@x.com", false).await;

        let unknown = app
            .send(
                Method::POST,
                "/v1/tokens/authentication",
                Some(json!({ "Email": "aksldf@gmail.com", "Password": "password123" })),
                None,
            )
            .await;
        let wrong = app
            .send(
                Method::POST,
                "/v1/tokens/authentication",
                Some(json!({ "email": "a@x.com", "password": "password123" })),
                None,
            )
            .await;
        assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
        assert_eq!(unknown.body, wrong.body);
        assert_eq!(unknown.body["error"], "invalid authentication credentials");
    }

    #[tokio::test]
    async fn login_validates_input_shape() {
        let app = TestApp::new();
        let res = app
            .send(
                Method::POST,
                "/v1/tokens/authentication",
                Some(json!({ "email": "nope", "password": "" })),
                None,
            )
            .await;
        assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(res.body["error"]["email"], "must be valid email address");
        assert_eq!(res.body["error"]["password"], "must be provided");
    }

    #[tokio::test]
    async fn login_returns_future_expiry() {
        let app = TestApp::new();
        app.signed_in("a@x.com", false).await;
        let res = app
            .send(
                Method::POST,
                "/v1/tokens/authentication",
                Some(json!({ "email": "a@x.com", "password": "longenough1" })),
                None,
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED);
        let body = &res.body["authentication_token"];
        assert_eq!(body["token"].as_str().unwrap().len(), 26);
        let expiry = time::OffsetDateTime::parse(
            body["expiry"].as_str().unwrap(),
            &time::format_description::well_known::Rfc3339,
        )
        .unwrap();
        assert!(expiry > time::OffsetDateTime::now_utc());
    }

    #[tokio::test]
    async fn resend_activation_flow() {
        let app = TestApp::new();
        app.signed_in("a@x.com", false).await;

        let res = app
            .send(Method::POST, "/v1/tokens/activation", Some(json!({ "email": "a@x.com" })), None)
            .await;
        assert_eq!(res.status, StatusCode::ACCEPTED);
        assert_eq!(
            res.body["message"],
            "an email will be sent to you containing activation instructions"
        );
        assert_eq!(app.mailer.sent_count(), 2);

        let res = app
            .send(Method::POST, "/v1/tokens/activation", Some(json!({ "email": "zz@x.com" })), None)
            .await;
        assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(res.body["error"]["email"], "no matching email address found");
    }
}
