#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use portal_service::config::PortalConfig;
use portal_service::models::SystemSettings;
use portal_service::services::{Backend, Resource, SettingsStore, UpstreamError};
use portal_service::startup::build_router;
use portal_service::AppState;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::util::ServiceExt;

/// In-memory upstream. Resources answer with canned payloads; individual
/// resources can be made to fail or hang.
#[derive(Default)]
pub struct StubBackend {
    responses: Mutex<HashMap<Resource, Value>>,
    failing: Mutex<HashSet<Resource>>,
    hanging: Mutex<HashSet<Resource>>,
    reject_writes: Mutex<bool>,
    post_response: Mutex<Value>,
    pub fetches: Mutex<Vec<(Resource, Vec<(String, String)>)>>,
    pub replaced: Mutex<Vec<Value>>,
    pub posted: Mutex<Vec<(String, Value, Option<String>)>>,
}

impl StubBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, resource: Resource, payload: Value) {
        self.responses.lock().unwrap().insert(resource, payload);
    }

    pub fn fail(&self, resource: Resource) {
        self.failing.lock().unwrap().insert(resource);
    }

    pub fn recover(&self, resource: Resource) {
        self.failing.lock().unwrap().remove(&resource);
    }

    pub fn hang(&self, resource: Resource) {
        self.hanging.lock().unwrap().insert(resource);
    }

    pub fn reject_writes(&self) {
        *self.reject_writes.lock().unwrap() = true;
    }

    pub fn respond_to_posts(&self, payload: Value) {
        *self.post_response.lock().unwrap() = payload;
    }
}

#[async_trait]
impl Backend for StubBackend {
    async fn fetch(
        &self,
        resource: Resource,
        query: &[(&str, String)],
    ) -> Result<Value, UpstreamError> {
        self.fetches.lock().unwrap().push((
            resource,
            query
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        ));

        let hangs = self.hanging.lock().unwrap().contains(&resource);
        if hangs {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.failing.lock().unwrap().contains(&resource) {
            return Err(UpstreamError::Status {
                status: 500,
                body: "boom".to_string(),
            });
        }
        Ok(self
            .responses
            .lock()
            .unwrap()
            .get(&resource)
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new())))
    }

    async fn replace(&self, _resource: Resource, body: &Value) -> Result<Value, UpstreamError> {
        if *self.reject_writes.lock().unwrap() {
            return Err(UpstreamError::Transport("connection refused".to_string()));
        }
        self.replaced.lock().unwrap().push(body.clone());
        Ok(body.clone())
    }

    async fn post(
        &self,
        path: &str,
        body: &Value,
        authorization: Option<&str>,
    ) -> Result<Value, UpstreamError> {
        self.posted.lock().unwrap().push((
            path.to_string(),
            body.clone(),
            authorization.map(str::to_string),
        ));
        Ok(self.post_response.lock().unwrap().clone())
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub backend: Arc<StubBackend>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response body is not JSON")
    }

    pub fn text(&self) -> String {
        String::from_utf8(self.body.to_vec()).expect("response body is not UTF-8")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl TestApp {
    pub fn spawn() -> Self {
        Self::with_config(PortalConfig::default())
    }

    pub fn with_config(config: PortalConfig) -> Self {
        Self::with_backend(config, StubBackend::new())
    }

    pub fn with_backend(config: PortalConfig, backend: Arc<StubBackend>) -> Self {
        Self::with_settings(
            config,
            backend,
            SettingsStore::new(SystemSettings::default()),
        )
    }

    /// Seeds settings from `backend` the way startup does.
    pub async fn loading_settings(backend: Arc<StubBackend>) -> Self {
        let settings = SettingsStore::load_from(backend.as_ref()).await;
        Self::with_settings(PortalConfig::default(), backend, settings)
    }

    fn with_settings(
        config: PortalConfig,
        backend: Arc<StubBackend>,
        settings: SettingsStore,
    ) -> Self {
        let state = AppState::new(config, backend.clone(), settings);
        let router = build_router(state.clone());
        TestApp {
            router,
            state,
            backend,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        headers: &[(&str, &str)],
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, headers: &[(&str, &str)]) -> TestResponse {
        self.request(Method::GET, uri, headers, None).await
    }
}
