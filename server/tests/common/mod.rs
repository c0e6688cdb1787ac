#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc};

use axum::{
    body::Body,
    extract::connect_info::MockConnectInfo,
    http::{Request, Response},
    Router,
};
use serde_json::Value;
use snaplink::{config::AppConfig, db, router, AppState};
use sqlx::{sqlite::SqliteConnectOptions, SqlitePool};
use tempfile::TempDir;
use tower::ServiceExt;

pub const BASE_URL: &str = "https://sn.ap";

pub struct TestApp {
    pub router: Router,
    pub pool: SqlitePool,
    _dir: TempDir,
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(AppConfig {
        base_url: BASE_URL.into(),
        ..AppConfig::default()
    })
    .await
}

pub async fn spawn_app_with(config: AppConfig) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let options = SqliteConnectOptions::new().filename(dir.path().join("api.db"));
    let pool = db::connect_with(options, 8).await.unwrap();

    let state = Arc::new(AppState::new(pool.clone(), config).unwrap());
    let peer: SocketAddr = "192.0.2.10:40000".parse().unwrap();
    let router = router(state).layer(MockConnectInfo(peer));

    TestApp {
        router,
        pool,
        _dir: dir,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> Response<Body> {
        self.post_raw(uri, body.to_string()).await
    }

    pub async fn post_raw(&self, uri: &str, body: impl Into<String>) -> Response<Body> {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.into()))
                .unwrap(),
        )
        .await
    }

    pub async fn patch_json(&self, uri: &str, body: Value) -> Response<Body> {
        self.send(
            Request::builder()
                .method("PATCH")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn visit(&self, code: &str, user_agent: Option<&str>, ip: &str) -> Response<Body> {
        let mut builder = Request::builder()
            .uri(format!("/{code}"))
            .header("x-forwarded-for", ip);
        if let Some(ua) = user_agent {
            builder = builder.header("user-agent", ua);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn click_rows(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM clicks")
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
