pub mod auth;
pub mod documents;
pub mod projects;
pub mod users;

use axum::{middleware as axum_middleware, routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{middleware, AppState};

/// Builds the full application router.
pub fn app(state: AppState) -> Router {
    let api_router = Router::new()
        .nest("/auth", auth::router())
        .nest("/users", users::router())
        .nest("/projects", projects::router())
        .nest("/documents", documents::router())
        .nest("/revisions", documents::revisions_router())
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::identify,
        ));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_router)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::{config::Config, db::Database};

    async fn test_app() -> Router {
        let state = AppState {
            db: Database::in_memory().await,
            config: Config {
                port: 0,
                database_url: "sqlite::memory:".into(),
                jwt_secret: "test-secret".into(),
                token_ttl_days: 1,
            },
        };
        app(state)
    }

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    /// Registers a user with a display name and returns (token, user id).
    async fn sign_up(app: &Router, name: &str) -> (String, String) {
        let (status, body) = call(
            app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "email": format!("{name}@example.com"), "password": "correct horse" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().unwrap().to_string();
        let id = body["user"]["id"].as_str().unwrap().to_string();

        let (status, _) = call(
            app,
            Method::PUT,
            "/api/users/me/display-name",
            Some(&token),
            Some(json!({ "display_name": name })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        (token, id)
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = test_app().await;
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn protected_routes_need_a_valid_token() {
        let app = test_app().await;
        let (status, _) = call(&app, Method::GET, "/api/users/me/invites", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) =
            call(&app, Method::GET, "/api/users/me/invites", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn invite_accept_and_revision_flow() {
        let app = test_app().await;
        let (owner, _) = sign_up(&app, "owner").await;
        let (bob, _) = sign_up(&app, "bob").await;

        let (status, project) = call(
            &app,
            Method::POST,
            "/api/projects",
            Some(&owner),
            Some(json!({ "name": "Snippets", "public": false })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let project_id = project["id"].as_str().unwrap().to_string();

        // Private project: bob cannot see it yet, and it looks like it does not exist.
        let (status, body) =
            call(&app, Method::GET, &format!("/api/projects/{project_id}"), Some(&bob), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Not accessible");

        let (status, applied) = call(
            &app,
            Method::POST,
            &format!("/api/projects/{project_id}/invites"),
            Some(&owner),
            Some(json!({ "invitees": [{ "display_name": "bob", "role": "EDITOR" }] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(applied[0]["change"], json!({ "kind": "invite", "role": "EDITOR" }));

        let (status, inbox) = call(&app, Method::GET, "/api/users/me/invites", Some(&bob), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(inbox[0]["project_name"], "Snippets");

        let accept_uri = format!("/api/users/me/invites/{project_id}/accept");
        let (status, summary) = call(&app, Method::POST, &accept_uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["id"], project_id.as_str());
        let (status, _) = call(&app, Method::POST, &accept_uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, overview) =
            call(&app, Method::GET, &format!("/api/projects/{project_id}"), Some(&bob), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(overview["role"], "EDITOR");
        let document_id = overview["documents"][0]["id"].as_str().unwrap().to_string();

        let (status, _) = call(
            &app,
            Method::PUT,
            &format!("/api/documents/{document_id}"),
            Some(&bob),
            Some(json!({ "content": "x" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let revisions_uri = format!("/api/documents/{document_id}/revisions");
        let (status, _) = call(
            &app,
            Method::POST,
            &revisions_uri,
            Some(&bob),
            Some(json!({ "label": "v1" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(
            &app,
            Method::POST,
            &revisions_uri,
            Some(&bob),
            Some(json!({ "label": "v2" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Content is the same as the last revision.");

        let (status, listed) = call(&app, Method::GET, &revisions_uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);

        // Editors cannot revert; only the owner can.
        let revision_id = listed[0]["id"].as_str().unwrap();
        let revert_uri = format!("/api/documents/{document_id}/revert");
        let (status, _) = call(
            &app,
            Method::POST,
            &revert_uri,
            Some(&bob),
            Some(json!({ "revision_id": revision_id })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = call(
            &app,
            Method::POST,
            &revert_uri,
            Some(&owner),
            Some(json!({ "revision_id": revision_id })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn duplicate_invitees_are_a_bad_request() {
        let app = test_app().await;
        let (owner, _) = sign_up(&app, "owner").await;
        let (_, project) = call(
            &app,
            Method::POST,
            "/api/projects",
            Some(&owner),
            Some(json!({ "name": "Snippets" })),
        )
        .await;

        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/api/projects/{}/invites", project["id"].as_str().unwrap()),
            Some(&owner),
            Some(json!({ "invitees": [
                { "display_name": "bob", "role": "VIEWER" },
                { "display_name": "bob", "role": "NONE" }
            ] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Duplicate invitees");
    }

    #[tokio::test]
    async fn guests_read_standalone_and_public_documents() {
        let app = test_app().await;
        let (status, created) = call(
            &app,
            Method::POST,
            "/api/documents",
            None,
            Some(json!({ "name": "hello.rs", "content": "fn main() {}" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, document) = call(
            &app,
            Method::GET,
            &format!("/api/documents/{}", created["slug"].as_str().unwrap()),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(document["role"], "GUEST");
        assert_eq!(document["content"], "fn main() {}");

        let (reader, _) = sign_up(&app, "reader").await;
        let (status, forked) = call(
            &app,
            Method::POST,
            &format!("/api/documents/{}/fork", created["id"].as_str().unwrap()),
            Some(&reader),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (_, overview) = call(
            &app,
            Method::GET,
            &format!("/api/projects/{}", forked["slug"].as_str().unwrap()),
            None,
            None,
        )
        .await;
        assert_eq!(overview["name"], "hello.rs - forked");
        assert_eq!(overview["role"], "GUEST");
        assert!(overview.get("invitations").is_none());

        let (status, pinned) = call(
            &app,
            Method::GET,
            &format!("/api/projects/{}/pinned", forked["slug"].as_str().unwrap()),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(pinned["content"], "fn main() {}");
    }
}
