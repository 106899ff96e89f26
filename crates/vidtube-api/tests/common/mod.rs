#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use vidtube_api::routes::router;
use vidtube_api::session::{SessionManager, TokenSettings};
use vidtube_api::state::{AdminRoutePolicy, ApiSettings, AppState, AppStateInner};
use vidtube_db::Database;
use vidtube_media::{MediaAssets, MediaStore, ResourceKind, UploadedAsset};

// -- Fake media store --

/// Records every call. Files whose extension is in `failing_extensions`
/// are rejected on upload; deletes of `failing_delete_kind` error out after
/// being recorded.
#[derive(Default)]
pub struct FakeStore {
    pub uploads: Mutex<Vec<UploadedAsset>>,
    pub deletes: Mutex<Vec<(String, ResourceKind)>>,
    pub failing_extensions: Mutex<Vec<String>>,
    pub failing_delete_kind: Mutex<Option<ResourceKind>>,
}

impl FakeStore {
    pub fn fail_uploads_of(&self, ext: &str) {
        self.failing_extensions.lock().unwrap().push(ext.to_string());
    }

    pub fn fail_deletes_of(&self, kind: ResourceKind) {
        *self.failing_delete_kind.lock().unwrap() = Some(kind);
    }

    pub fn uploads(&self) -> Vec<UploadedAsset> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn deletes(&self) -> Vec<(String, ResourceKind)> {
        self.deletes.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaStore for FakeStore {
    async fn upload(&self, path: &Path) -> Result<UploadedAsset> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin")
            .to_string();
        if self.failing_extensions.lock().unwrap().contains(&ext) {
            bail!("upload of .{} rejected", ext);
        }
        let stem = path.file_stem().unwrap().to_string_lossy().into_owned();

        let (kind, duration) = match ext.as_str() {
            "mp4" | "mov" | "webm" => (ResourceKind::Video, Some(12.5)),
            _ => (ResourceKind::Image, None),
        };
        let asset = UploadedAsset {
            public_id: format!("vidtube/{stem}"),
            url: format!("https://res.cloudinary.com/test/{kind}/upload/v1/vidtube/{stem}.{ext}"),
            resource_kind: kind,
            duration,
            bytes: Some(std::fs::metadata(path)?.len()),
            format: Some(ext),
        };
        self.uploads.lock().unwrap().push(asset.clone());
        Ok(asset)
    }

    async fn destroy(&self, public_id: &str, kind: ResourceKind) -> Result<()> {
        self.deletes.lock().unwrap().push((public_id.to_string(), kind));
        if *self.failing_delete_kind.lock().unwrap() == Some(kind) {
            bail!("destroy of {} failed", public_id);
        }
        Ok(())
    }
}

// -- App harness --

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<FakeStore>,
    pub temp_dir: tempfile::TempDir,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub set_cookies: Vec<String>,
    pub body: Value,
}

impl TestResponse {
    pub fn data(&self) -> &Value {
        &self.body["data"]
    }

    pub fn message(&self) -> &str {
        self.body["message"].as_str().unwrap_or_default()
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        let prefix = format!("{name}=");
        self.set_cookies.iter().find(|c| c.starts_with(&prefix)).map(String::as_str)
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_policy(AdminRoutePolicy::Authenticated)
    }

    pub fn with_policy(admin_routes: AdminRoutePolicy) -> Self {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FakeStore::default());

        let sessions = SessionManager::new(&TokenSettings {
            access_secret: "test-access-secret".into(),
            access_ttl: Duration::from_secs(600),
            refresh_secret: "test-refresh-secret".into(),
            refresh_ttl: Duration::from_secs(3600),
        })
        .unwrap();

        let state: AppState = Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            media: MediaAssets::new(store.clone()),
            sessions,
            settings: ApiSettings {
                temp_dir: temp_dir.path().join("uploads"),
                admin_routes,
                secure_cookies: false,
            },
        });

        Self {
            router: router(state.clone()),
            state,
            store,
            temp_dir,
        }
    }

    pub fn db(&self) -> &Database {
        &self.state.db
    }

    /// Run raw SQL against the app database, e.g. to install a failing trigger.
    pub fn exec_sql(&self, sql: &str) {
        self.db()
            .with_conn(|conn| {
                conn.execute_batch(sql)?;
                Ok(())
            })
            .unwrap();
    }

    /// Files still sitting in the upload spool directory.
    pub fn spooled_files(&self) -> usize {
        std::fs::read_dir(&self.state.settings.temp_dir)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    pub async fn send(&self, req: Request<Body>) -> TestResponse {
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let set_cookies = resp
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        TestResponse { status, set_cookies, body }
    }

    pub async fn json(&self, method: &str, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        let mut req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(req.body(Body::from(body.to_string())).unwrap()).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        let mut req = Request::builder().method("GET").uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(req.body(Body::empty()).unwrap()).await
    }

    pub async fn multipart(&self, method: &str, uri: &str, token: Option<&str>, form: Form) -> TestResponse {
        let mut req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"));
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(req.body(Body::from(form.finish())).unwrap()).await
    }

    /// Register `username` with an avatar and no cover image.
    pub async fn register(&self, username: &str, password: &str) -> TestResponse {
        let form = Form::new()
            .text("fullname", &format!("{username} Full"))
            .text("email", &format!("{username}@example.com"))
            .text("username", username)
            .text("password", password)
            .file("avatar", "avatar.png", b"avatar-bytes");
        self.multipart("POST", "/api/v1/users/register", None, form).await
    }

    pub async fn login(&self, username: &str, password: &str) -> TestResponse {
        self.json(
            "POST",
            "/api/v1/users/login",
            None,
            serde_json::json!({ "username": username, "password": password }),
        )
        .await
    }

    /// Register and log in. Returns `(user id, access token, refresh token)`.
    pub async fn signed_in(&self, username: &str) -> (String, String, String) {
        let reg = self.register(username, "secret-pw").await;
        assert_eq!(reg.status, StatusCode::CREATED, "{:?}", reg.body);
        let login = self.login(username, "secret-pw").await;
        assert_eq!(login.status, StatusCode::OK, "{:?}", login.body);

        let data = login.data();
        (
            data["user"]["_id"].as_str().unwrap().to_string(),
            data["accessToken"].as_str().unwrap().to_string(),
            data["refreshToken"].as_str().unwrap().to_string(),
        )
    }
}

// -- Multipart builder --

const BOUNDARY: &str = "vidtube-test-boundary";

#[derive(Default)]
pub struct Form {
    body: Vec<u8>,
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    fn finish(mut self) -> Vec<u8> {
        self.body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.body
    }
}
