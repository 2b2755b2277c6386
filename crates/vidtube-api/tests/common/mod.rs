//! Common test infrastructure
//!
//! Every test builds its own [`TestApp`]: a fresh in-memory database, a
//! temporary media directory and the full router, driven in-process with
//! `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use vidtube_api::{AppState, AppStateInner, AuthConfig, Mail, Mailer, MediaStore, router};
use vidtube_db::Database;

pub const PASSWORD: &str = "password123";
const BOUNDARY: &str = "vidtube-test-boundary";

/// Keeps every mail instead of sending it.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Mail>>,
}

impl Mailer for RecordingMailer {
    fn send(&self, mail: &Mail) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(mail.clone());
        Ok(())
    }
}

impl RecordingMailer {
    pub fn sent_to(&self, to: &str) -> Vec<Mail> {
        let sent = self.sent.lock().unwrap();
        sent.iter().filter(|m| m.to == to).cloned().collect()
    }

    /// The token at the end of the newest link mailed to `to`.
    pub fn last_token(&self, to: &str) -> Option<String> {
        self.sent_to(to)
            .last()
            .and_then(|m| m.link.rsplit('/').next().map(str::to_owned))
    }
}

pub struct TestApp {
    pub state: AppState,
    pub mailbox: Arc<RecordingMailer>,
    router: Router,
    _media: TempDir,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn data(&self) -> &Value {
        &self.body["data"]
    }

    pub fn message(&self) -> &str {
        self.body["message"].as_str().unwrap_or_default()
    }

    pub fn error(&self) -> &str {
        self.body["error"].as_str().unwrap_or_default()
    }

    pub fn set_cookies(&self) -> Vec<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_owned)
            .collect()
    }
}

/// One part of a multipart body.
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        bytes: &'a [u8],
    },
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                name,
                file_name,
                content_type,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn image(name: &'static str) -> Part<'static> {
    Part::File {
        name,
        file_name: "picture.png",
        content_type: "image/png",
        bytes: b"\x89PNG fake image",
    }
}

impl TestApp {
    pub fn new() -> Self {
        let media = tempfile::tempdir().unwrap();
        let mailbox = Arc::new(RecordingMailer::default());
        let state: AppState = Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            auth: AuthConfig {
                access_secret: "test-access-secret".into(),
                refresh_secret: "test-refresh-secret".into(),
                access_ttl: chrono::Duration::minutes(15),
                refresh_ttl: chrono::Duration::days(10),
            },
            media: MediaStore::new(media.path()),
            mailer: mailbox.clone(),
            public_url: "http://localhost:5173".into(),
            max_upload_bytes: 10 * 1024 * 1024,
        });

        Self {
            router: router(state.clone()),
            state,
            mailbox,
            _media: media,
        }
    }

    pub fn media_dir(&self) -> &std::path::Path {
        self._media.path()
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        TestResponse {
            status,
            headers,
            body,
        }
    }

    fn builder(method: Method, path: &str, token: Option<&str>) -> axum::http::request::Builder {
        let builder = Request::builder().method(method).uri(format!("/api/v1{path}"));
        match token {
            Some(token) => builder.header(header::AUTHORIZATION, format!("Bearer {token}")),
            None => builder,
        }
    }

    pub async fn request(&self, method: Method, path: &str, token: Option<&str>) -> TestResponse {
        self.send(Self::builder(method, path, token).body(Body::empty()).unwrap())
            .await
    }

    pub async fn get(&self, path: &str, token: &str) -> TestResponse {
        self.request(Method::GET, path, Some(token)).await
    }

    pub async fn json(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Value,
    ) -> TestResponse {
        let request = Self::builder(method, path, token)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn multipart(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        parts: &[Part<'_>],
    ) -> TestResponse {
        let request = Self::builder(method, path, token)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap();
        self.send(request).await
    }

    pub async fn register(&self, username: &str) -> TestResponse {
        let email = format!("{username}@example.com");
        let full_name = format!("{username} Tester");
        self.multipart(
            Method::POST,
            "/users/register",
            None,
            &[
                Part::Text("fullName", &full_name),
                Part::Text("username", username),
                Part::Text("email", &email),
                Part::Text("password", PASSWORD),
                image("avatar"),
            ],
        )
        .await
    }

    pub async fn login(&self, username: &str) -> TestResponse {
        self.json(
            Method::POST,
            "/users/login",
            None,
            serde_json::json!({ "username": username, "password": PASSWORD }),
        )
        .await
    }

    /// Registers and logs in a user; returns `(user id, access token)`.
    pub async fn signup(&self, username: &str) -> (String, String) {
        let registered = self.register(username).await;
        assert_eq!(registered.status, StatusCode::CREATED, "{:?}", registered.body);

        let login = self.login(username).await;
        assert_eq!(login.status, StatusCode::OK, "{:?}", login.body);

        let id = registered.data()["id"].as_str().unwrap().to_owned();
        let token = login.data()["accessToken"].as_str().unwrap().to_owned();
        (id, token)
    }

    /// Publishes a video and returns its id.
    pub async fn upload_video(&self, token: &str, title: &str) -> String {
        let description = format!("{title} description");
        let response = self
            .multipart(
                Method::POST,
                "/videos",
                Some(token),
                &[
                    Part::Text("title", title),
                    Part::Text("description", &description),
                    Part::Text("duration", "42.5"),
                    Part::File {
                        name: "videoFile",
                        file_name: "clip.mp4",
                        content_type: "video/mp4",
                        bytes: b"fake video bytes",
                    },
                    image("thumbnail"),
                ],
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
        response.data()["id"].as_str().unwrap().to_owned()
    }
}
