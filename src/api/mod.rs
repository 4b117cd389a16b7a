//! API layer - HTTP handlers and routing
//!
//! Every endpoint lives under `/api/v1`, apart from the Prometheus scrape at
//! `/metrics`. Each module exposes a `router()` with its full paths; this
//! module merges them and attaches the auth layers.

pub mod admin;
pub mod auth;
pub mod categories;
pub mod common;
pub mod curriculums;
pub mod engagement;
pub mod errors;
pub mod feed;
pub mod health;
pub mod learning;
pub mod metrics;
pub mod middleware;
pub mod responses;
pub mod social;
pub mod stats;
pub mod tags;
pub mod users;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use middleware::{AdminUser, ApiError, AppState, AuthenticatedUser};

/// Build the main API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Admin routes (need admin role)
    let admin_routes = admin::router()
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Protected routes (need auth but not admin)
    let protected_routes = Router::new()
        .merge(users::router())
        .merge(curriculums::router())
        .merge(learning::router())
        .merge(stats::router())
        .merge(social::router())
        .merge(engagement::router())
        .merge(tags::router())
        .merge(categories::router())
        .merge(feed::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::require_auth,
        ));

    // Public routes
    Router::new()
        .nest("/auth", auth::router())
        .merge(health::router())
        .merge(feed::public_router())
        .merge(admin_routes)
        .merge(protected_routes)
        .route_layer(axum_middleware::from_fn(crate::metrics::track_requests))
}

fn cors_layer(cors_origin: &str) -> CorsLayer {
    let origin = match cors_origin.trim() {
        "" | "*" => AllowOrigin::from(Any),
        value => match value.parse::<HeaderValue>() {
            Ok(origin) => AllowOrigin::exact(origin),
            Err(_) => {
                tracing::warn!(origin = %value, "Invalid CORS origin, allowing any origin");
                AllowOrigin::from(Any)
            }
        },
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .merge(metrics::router())
        .layer(cors_layer(cors_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::repositories::test_support::{insert_admin, setup_pool};
    use crate::services::llm::fake::FakeLlm;
    use crate::services::TokenService;
    use axum::body::Body;
    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::net::SocketAddr;
    use std::sync::Arc;
    use tower::ServiceExt;

    const PASSWORD: &str = "Passw0rd!";

    struct TestApp {
        app: Router,
        pool: crate::db::DynDatabasePool,
        tokens: TokenService,
    }

    async fn test_app() -> TestApp {
        let pool = setup_pool().await;
        let tokens = TokenService::new("test-secret", 1);
        let state = AppState::new(
            pool.clone(),
            Arc::new(MemoryCache::new()),
            Arc::new(FakeLlm::new()),
            tokens.clone(),
        );
        TestApp {
            app: build_router(state, "*").layer(MockConnectInfo(SocketAddr::from(([203, 0, 113, 7], 40000)))),
            pool,
            tokens,
        }
    }

    impl TestApp {
        async fn send(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header("authorization", format!("Bearer {}", token));
            }
            let body = match body {
                Some(value) => {
                    builder = builder.header("content-type", "application/json");
                    Body::from(serde_json::to_vec(&value).unwrap())
                }
                None => Body::empty(),
            };

            let response = self
                .app
                .clone()
                .oneshot(builder.body(body).unwrap())
                .await
                .unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let value = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, value)
        }

        /// Sign up and log in, returning the bearer token
        async fn register(&self, name: &str) -> String {
            let email = format!("{}@example.com", name.to_lowercase());
            let (status, _) = self
                .send(
                    "POST",
                    "/api/v1/auth/signup",
                    None,
                    Some(json!({"name": name, "email": email, "password": PASSWORD})),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);

            let (status, body) = self
                .send(
                    "POST",
                    "/api/v1/auth/login",
                    None,
                    Some(json!({"email": email, "password": PASSWORD})),
                )
                .await;
            assert_eq!(status, StatusCode::OK);
            body["access_token"].as_str().unwrap().to_string()
        }

        async fn admin_token(&self) -> String {
            let admin = insert_admin(&self.pool, "Admin").await;
            self.tokens.create_token(&admin.id, admin.role).unwrap()
        }

        async fn create_curriculum(&self, token: &str, title: &str, visibility: &str) -> String {
            let (status, body) = self
                .send(
                    "POST",
                    "/api/v1/curriculums",
                    Some(token),
                    Some(json!({
                        "title": title,
                        "visibility": visibility,
                        "week_schedules": [
                            {"week_number": 1, "lessons": ["Ownership", "Borrowing"]},
                            {"week_number": 2, "lessons": ["Traits"]}
                        ]
                    })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED, "{}", body);
            body["id"].as_str().unwrap().to_string()
        }
    }

    #[tokio::test]
    async fn test_health_reports_database() {
        let app = test_app().await;
        let (status, body) = app.send("GET", "/api/v1/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok", "database": "ok"}));
    }

    #[tokio::test]
    async fn test_signup_login_and_profile() {
        let app = test_app().await;
        let token = app.register("Alice").await;

        let (status, body) = app.send("GET", "/api/v1/users/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Alice");
        assert_eq!(body["role"], "USER");
        assert!(body.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn test_login_accepts_password_form() {
        let app = test_app().await;
        app.register("Alice").await;

        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/auth/login")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("username=alice%40example.com&password=Passw0rd%21"))
            .unwrap();
        let response = app.app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_repeated_failed_logins_are_rate_limited() {
        let app = test_app().await;
        app.register("Alice").await;

        let wrong = json!({"email": "alice@example.com", "password": "Wrong0ne!"});
        for _ in 0..5 {
            let (status, _) = app.send("POST", "/api/v1/auth/login", None, Some(wrong.clone())).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
        }

        let (status, body) = app.send("POST", "/api/v1/auth/login", None, Some(wrong)).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"]["code"], "RATE_LIMIT");
        assert_eq!(body["error"]["details"]["retry_after"], 900);
    }

    #[tokio::test]
    async fn test_login_ip_limit_ignores_untrusted_forwarding_headers() {
        let app = test_app().await;

        let attempt = |n: usize| {
            Request::builder()
                .method("POST")
                .uri("/api/v1/auth/login")
                .header("content-type", "application/json")
                .header("x-forwarded-for", format!("10.0.0.{}", n))
                .body(Body::from(
                    json!({"email": format!("user{}@example.com", n), "password": PASSWORD}).to_string(),
                ))
                .unwrap()
        };

        for n in 0..10 {
            let response = app.app.clone().oneshot(attempt(n)).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }

        let response = app.app.clone().oneshot(attempt(10)).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["details"]["retry_after"], 60);
    }

    #[tokio::test]
    async fn test_metrics_endpoint_is_public_text() {
        let app = test_app().await;
        let token = app.register("Alice").await;
        app.create_curriculum(&token, "Rust basics", "PUBLIC").await;

        let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
        let response = app.app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
        assert!(content_type.starts_with("text/plain"));

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("user_registrations_total"));
        assert!(text.contains("curriculum_creations_total"));
        assert!(text.contains("total_curriculums"));
        assert!(text.contains(r#"endpoint="/api/v1/auth/signup""#));
    }

    #[tokio::test]
    async fn test_protected_route_requires_token() {
        let app = test_app().await;
        let (status, body) = app.send("GET", "/api/v1/curriculums/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");

        let (status, _) = app
            .send("GET", "/api/v1/curriculums/me", Some("not-a-token"), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_private_curriculum_hidden_from_others() {
        let app = test_app().await;
        let alice = app.register("Alice").await;
        let bob = app.register("Bob").await;
        let id = app.create_curriculum(&alice, "Private plan", "PRIVATE").await;

        let uri = format!("/api/v1/curriculums/{}", id);
        let (status, _) = app.send("GET", &uri, Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = app.send("GET", &uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let like = format!("/api/v1/curriculums/{}/like", id);
        let (status, _) = app.send("POST", &like, Some(&bob), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_malformed_input_uses_error_envelope() {
        let app = test_app().await;
        let alice = app.register("Alice").await;
        let id = app.create_curriculum(&alice, "Rust basics", "PUBLIC").await;

        let negative_index = format!("/api/v1/curriculums/{}/weeks/1/lessons/-1", id);
        let (status, body) = app.send("DELETE", &negative_index, Some(&alice), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (status, body) = app
            .send("POST", "/api/v1/curriculums", Some(&alice), Some(json!({"visibility": "PUBLIC"})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (status, body) = app.send("GET", "/api/v1/curriculums/me?page=abc", Some(&alice), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_lesson_editing_flow() {
        let app = test_app().await;
        let alice = app.register("Alice").await;
        let id = app.create_curriculum(&alice, "Rust basics", "PUBLIC").await;

        let (status, body) = app
            .send(
                "POST",
                &format!("/api/v1/curriculums/{}/weeks/1/lessons", id),
                Some(&alice),
                Some(json!({"lesson": "Lifetimes"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["week_schedules"][0]["lessons"][2], "Lifetimes");

        let (status, body) = app
            .send(
                "DELETE",
                &format!("/api/v1/curriculums/{}/weeks/1/lessons/0", id),
                Some(&alice),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["week_schedules"][0]["lessons"][0], "Borrowing");

        let (status, _) = app
            .send(
                "DELETE",
                &format!("/api/v1/curriculums/{}/weeks/9", id),
                Some(&alice),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_generated_curriculum_is_private() {
        let app = test_app().await;
        let alice = app.register("Alice").await;

        let (status, body) = app
            .send(
                "POST",
                "/api/v1/curriculums/generate",
                Some(&alice),
                Some(json!({"goal": "Learn Rust", "period": 2, "difficulty": "beginner", "details": ""})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        assert_eq!(body["visibility"], "PRIVATE");
        assert_eq!(body["week_schedules"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_summary_and_feedback_flow() {
        let app = test_app().await;
        let alice = app.register("Alice").await;
        let id = app.create_curriculum(&alice, "Rust basics", "PUBLIC").await;

        let content = "Ownership moves values between bindings. ".repeat(4);
        let (status, summary) = app
            .send(
                "POST",
                &format!("/api/v1/curriculums/{}/weeks/1/summaries", id),
                Some(&alice),
                Some(json!({"content": content})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", summary);
        let summary_id = summary["id"].as_str().unwrap();

        let generate = format!("/api/v1/summaries/{}/feedbacks/generate", summary_id);
        let (status, feedback) = app.send("POST", &generate, Some(&alice), None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(feedback["score"], 8.5);
        assert_eq!(feedback["is_good"], true);

        let (status, _) = app.send("POST", &generate, Some(&alice), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = app
            .send("GET", "/api/v1/users/me/feedbacks?min_score=8", Some(&alice), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_count"], 1);

        let (status, stats) = app
            .send("GET", "/api/v1/users/me/learning/stats", Some(&alice), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["total_summaries"], 1);
        assert_eq!(stats["streak"]["current_streak"], 1);
    }

    #[tokio::test]
    async fn test_public_feed_and_engagement() {
        let app = test_app().await;
        let alice = app.register("Alice").await;
        let bob = app.register("Bob").await;
        let id = app.create_curriculum(&alice, "Rust basics", "PUBLIC").await;
        app.create_curriculum(&alice, "Secret plan", "PRIVATE").await;

        let (status, feed) = app.send("GET", "/api/v1/feed/public", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(feed["total_count"], 1);
        assert_eq!(feed["items_per_page"], 20);
        assert_eq!(feed["curriculums"][0]["owner_name"], "Alice");

        let (status, _) = app
            .send("GET", "/api/v1/feed/public?items_per_page=51", None, None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let like = format!("/api/v1/curriculums/{}/like", id);
        let (status, _) = app.send("POST", &like, Some(&bob), None).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, _) = app.send("POST", &like, Some(&bob), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = app
            .send(
                "POST",
                &format!("/api/v1/curriculums/{}/comments", id),
                Some(&bob),
                Some(json!({"content": "Great plan"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, stats) = app
            .send("GET", &format!("/api/v1/curriculums/{}/social-stats", id), Some(&bob), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["like_count"], 1);
        assert_eq!(stats["comment_count"], 1);
        assert_eq!(stats["is_liked_by_user"], true);
    }

    #[tokio::test]
    async fn test_follow_routes() {
        let app = test_app().await;
        let alice = app.register("Alice").await;
        let bob = app.register("Bob").await;
        let (_, bob_profile) = app.send("GET", "/api/v1/users/me", Some(&bob), None).await;
        let bob_id = bob_profile["id"].as_str().unwrap();

        let (status, _) = app
            .send("POST", "/api/v1/social/follow", Some(&alice), Some(json!({"followee_id": bob_id})))
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = app
            .send("GET", &format!("/api/v1/social/users/{}/followers", bob_id), Some(&alice), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["followers"][0]["username"], "Alice");

        let (status, _) = app
            .send("DELETE", "/api/v1/social/unfollow", Some(&alice), Some(json!({"followee_id": bob_id})))
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_admin_routes_require_admin_role() {
        let app = test_app().await;
        let alice = app.register("Alice").await;

        let (status, body) = app.send("GET", "/api/v1/admin/users", Some(&alice), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "FORBIDDEN");

        let (status, _) = app
            .send(
                "POST",
                "/api/v1/categories",
                Some(&alice),
                Some(json!({"name": "Programming", "color": "#112233"})),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let admin = app.admin_token().await;
        let (status, body) = app.send("GET", "/api/v1/admin/users", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_count"], 2);

        let (status, body) = app
            .send(
                "POST",
                "/api/v1/categories",
                Some(&admin),
                Some(json!({"name": "Programming", "color": "#aabbcc"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["color"], "#AABBCC");
    }

    #[tokio::test]
    async fn test_tagging_and_search() {
        let app = test_app().await;
        let alice = app.register("Alice").await;
        let id = app.create_curriculum(&alice, "Rust basics", "PUBLIC").await;

        let (status, body) = app
            .send(
                "POST",
                &format!("/api/v1/curriculums/{}/tags", id),
                Some(&alice),
                Some(json!({"tag_names": ["Rust", "web"]})),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["tags"].as_array().unwrap().len(), 2);

        let (status, body) = app
            .send("GET", "/api/v1/curriculums/search/by-tags?tags=rust,web", Some(&alice), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_count"], 1);
        assert_eq!(body["curriculums"][0]["id"], id.as_str());

        let (status, body) = app
            .send("GET", "/api/v1/tags/search?q=ru", Some(&alice), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["suggestions"][0]["name"], "rust");
    }
}
