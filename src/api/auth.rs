//! Authentication API endpoints
//!
//! - POST /api/v1/auth/signup - Create an account
//! - POST /api/v1/auth/login - Exchange credentials for a bearer token
//!
//! Login accepts the OAuth2 password form (`username` carries the email) as
//! well as a JSON body.

use axum::{
    extract::{ConnectInfo, FromRequest, FromRequestParts, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Form, Json, Router,
};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};

use crate::api::common::AppJson;
use crate::api::middleware::{ApiError, AppState};
use crate::services::user::{LoginOutput, SignupInput};
use crate::services::UserServiceError;

/// OAuth2 password grant form
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginJson {
    pub email: String,
    pub password: String,
}

/// Build the auth router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
}

/// POST /api/v1/auth/signup
async fn signup(
    State(state): State<AppState>,
    AppJson(body): AppJson<SignupInput>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.user_service.signup(body).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Read credentials from either a form or a JSON body
async fn read_credentials(state: &AppState, request: Request) -> Result<(String, String), ApiError> {
    let is_form = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false);

    if is_form {
        let Form(form) = Form::<LoginForm>::from_request(request, state)
            .await
            .map_err(|e| ApiError::validation_error(e.body_text()))?;
        Ok((form.username, form.password))
    } else {
        let Json(body) = Json::<LoginJson>::from_request(request, state)
            .await
            .map_err(|e| ApiError::validation_error(e.body_text()))?;
        Ok((body.email, body.password))
    }
}

/// POST /api/v1/auth/login
async fn login(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<LoginOutput>, ApiError> {
    let (mut parts, body) = request.into_parts();
    let peer = ConnectInfo::<SocketAddr>::from_request_parts(&mut parts, &state)
        .await
        .ok()
        .map(|ConnectInfo(addr)| addr.ip());
    let ip = client_ip(&parts.headers, peer, state.trust_proxy_headers);
    let (email, password) = read_credentials(&state, Request::from_parts(parts, body)).await?;

    // 10 requests per minute per client address
    if let Some(ip) = ip {
        if state.rate_limiter.is_ip_limited(ip).await {
            tracing::warn!(ip = %ip, "Login rejected by IP rate limit");
            return Err(ApiError::with_details(
                "RATE_LIMIT",
                "Too many requests, try again later",
                serde_json::json!({"retry_after": 60}),
            ));
        }
        state.rate_limiter.record_ip_request(ip).await;
    }

    // 5 failed attempts per 15 minutes per email
    if state.rate_limiter.is_email_limited(&email).await {
        tracing::warn!(email = %email, "Login rejected by account rate limit");
        return Err(ApiError::with_details(
            "RATE_LIMIT",
            "Too many failed attempts, try again in 15 minutes",
            serde_json::json!({"retry_after": 900}),
        ));
    }

    match state.user_service.login(&email, &password).await {
        Ok(output) => {
            state.rate_limiter.clear_email_attempts(&email).await;
            Ok(Json(output))
        }
        Err(e) => {
            if matches!(e, UserServiceError::InvalidCredentials) {
                state.rate_limiter.record_failed_attempt(&email).await;
            }
            Err(e.into())
        }
    }
}

/// Address the IP rate limit applies to.
///
/// Forwarding headers are only honoured behind a trusted proxy; otherwise the
/// peer address of the connection is used.
fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>, trust_proxy_headers: bool) -> Option<IpAddr> {
    if trust_proxy_headers {
        if let Some(ip) = extract_ip_address(headers) {
            return Some(ip);
        }
    }
    peer
}

/// Client address from proxy headers
fn extract_ip_address(headers: &HeaderMap) -> Option<IpAddr> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next());
    let real_ip = || headers.get("x-real-ip").and_then(|v| v.to_str().ok());

    forwarded
        .or_else(real_ip)
        .and_then(|ip| ip.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1, 10.0.0.2"));
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        assert_eq!(extract_ip_address(&headers), Some("10.0.0.1".parse().unwrap()));
    }

    #[test]
    fn test_extract_ip_falls_back_to_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("192.168.1.5"));
        assert_eq!(extract_ip_address(&headers), Some("192.168.1.5".parse().unwrap()));
        assert_eq!(extract_ip_address(&HeaderMap::new()), None);
    }

    #[test]
    fn test_client_ip_ignores_headers_unless_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1"));
        let peer: IpAddr = "203.0.113.7".parse().unwrap();

        assert_eq!(client_ip(&headers, Some(peer), false), Some(peer));
        assert_eq!(client_ip(&headers, Some(peer), true), Some("10.0.0.1".parse().unwrap()));
        assert_eq!(client_ip(&HeaderMap::new(), Some(peer), true), Some(peer));
        assert_eq!(client_ip(&HeaderMap::new(), None, false), None);
    }
}
