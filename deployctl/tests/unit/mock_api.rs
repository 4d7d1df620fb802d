//! In-memory deployment API for tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use deploy_api::{CreateDeploymentBody, Deployment};
use deployctl::deploy::api::{DeploymentApi, FileUpload, LineStream, LogQuery};
use deployctl::errors::ClientError;
use futures::{stream, StreamExt};
use tokio::sync::Notify;
use serde_json::{json, Value};

/// Sets its flag when dropped
pub struct DropFlag(pub Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

fn line_stream(lines: Vec<String>, hang: bool, dropped: Arc<AtomicBool>) -> LineStream {
    let guard = DropFlag(dropped);
    let items = stream::iter(lines.into_iter().map(Ok::<_, ClientError>));
    let items = if hang {
        items.chain(stream::pending()).boxed()
    } else {
        items.boxed()
    };
    items
        .map(move |item| {
            let _keep = &guard;
            item
        })
        .boxed()
}

/// Yields `lines[..at]`, waits for `gate`, then yields the rest
fn gated_stream(lines: Vec<String>, at: usize, gate: Arc<Notify>, dropped: Arc<AtomicBool>) -> LineStream {
    let guard = DropFlag(dropped);
    let mut lines = lines;
    let rest = lines.split_off(at.min(lines.len()));
    let head = stream::iter(lines.into_iter().map(Ok::<_, ClientError>));
    let tail = stream::once(async move { gate.notified().await })
        .flat_map(move |_| stream::iter(rest.clone().into_iter().map(Ok::<_, ClientError>)));
    head.chain(tail)
        .map(move |item| {
            let _keep = &guard;
            item
        })
        .boxed()
}

/// Endless log entries, one every `period`
fn endless_logs(period: Duration, dropped: Arc<AtomicBool>) -> LineStream {
    let guard = DropFlag(dropped);
    stream::unfold(0u64, move |n| async move {
        tokio::time::sleep(period).await;
        Some((Ok::<_, ClientError>(log_line(&n.to_string(), "building")), n + 1))
    })
    .map(move |item| {
        let _keep = &guard;
        item
    })
    .boxed()
}

#[derive(Default)]
pub struct MockApi {
    creation: Mutex<Vec<String>>,
    creation_hangs: bool,
    creation_gate: Option<(usize, Arc<Notify>)>,
    refuse_creation: Option<(u16, String)>,
    logs: Mutex<Vec<String>>,
    logs_hang: bool,
    logs_every: Option<Duration>,
    deployments: Mutex<VecDeque<Deployment>>,
    fail_upload: Option<String>,
    upload_delay: Option<Duration>,

    pub bodies: Mutex<Vec<CreateDeploymentBody>>,
    pub uploads: Mutex<Vec<String>>,
    pub log_queries: Mutex<Vec<LogQuery>>,
    pub creation_dropped: Arc<AtomicBool>,
    pub logs_dropped: Arc<AtomicBool>,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines of the creation response
    pub fn with_creation(mut self, lines: Vec<String>) -> Self {
        self.creation = Mutex::new(lines);
        self
    }

    /// Keep the creation response open after its lines
    pub fn creation_hangs(mut self) -> Self {
        self.creation_hangs = true;
        self
    }

    /// Pause the creation response after `at` lines until `gate` is notified
    pub fn with_creation_gate(mut self, at: usize, gate: Arc<Notify>) -> Self {
        self.creation_gate = Some((at, gate));
        self
    }

    /// Reject the creation request with an API error
    pub fn refusing_creation(mut self, status: u16, code: &str) -> Self {
        self.refuse_creation = Some((status, code.to_string()));
        self
    }

    /// Emit a log entry every `period` until the connection is dropped
    pub fn with_endless_logs(mut self, period: Duration) -> Self {
        self.logs_every = Some(period);
        self
    }

    pub fn with_logs(mut self, lines: Vec<String>, hang: bool) -> Self {
        self.logs = Mutex::new(lines);
        self.logs_hang = hang;
        self
    }

    /// Successive replies of `get_deployment`; the last one repeats
    pub fn with_deployments(mut self, deployments: Vec<Deployment>) -> Self {
        self.deployments = Mutex::new(deployments.into());
        self
    }

    pub fn failing_upload(mut self, hash: &str) -> Self {
        self.fail_upload = Some(hash.to_string());
        self
    }

    pub fn with_upload_delay(mut self, delay: Duration) -> Self {
        self.upload_delay = Some(delay);
        self
    }

    pub fn uploaded(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeploymentApi for MockApi {
    async fn create_deployment(&self, body: &CreateDeploymentBody) -> Result<LineStream, ClientError> {
        self.bodies.lock().unwrap().push(body.clone());
        if let Some((status, code)) = &self.refuse_creation {
            return Err(ClientError::Api {
                status: *status,
                code: code.clone(),
                message: "creation refused".to_string(),
            });
        }
        let lines = self.creation.lock().unwrap().clone();
        if let Some((at, gate)) = &self.creation_gate {
            return Ok(gated_stream(lines, *at, gate.clone(), self.creation_dropped.clone()));
        }
        Ok(line_stream(lines, self.creation_hangs, self.creation_dropped.clone()))
    }

    async fn upload_file(&self, upload: FileUpload) -> Result<(), ClientError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.upload_delay {
            tokio::time::sleep(delay).await;
        }
        let result = if self.fail_upload.as_deref() == Some(upload.hash.as_str()) {
            Err(ClientError::Api {
                status: 500,
                code: "internal".to_string(),
                message: "upload rejected".to_string(),
            })
        } else {
            for chunk in upload.data.chunks(256) {
                upload.progress.add(chunk.len() as u64);
            }
            self.uploads.lock().unwrap().push(upload.hash.clone());
            Ok(())
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn deployment_logs(&self, _deployment_id: &str, query: LogQuery) -> Result<LineStream, ClientError> {
        self.log_queries.lock().unwrap().push(query);
        if let Some(period) = self.logs_every {
            return Ok(endless_logs(period, self.logs_dropped.clone()));
        }
        let lines = self.logs.lock().unwrap().clone();
        Ok(line_stream(lines, self.logs_hang, self.logs_dropped.clone()))
    }

    async fn get_deployment(&self, deployment_id: &str) -> Result<Deployment, ClientError> {
        let mut deployments = self.deployments.lock().unwrap();
        let deployment = if deployments.len() > 1 {
            deployments.pop_front()
        } else {
            deployments.front().cloned()
        };
        deployment.ok_or_else(|| ClientError::Api {
            status: 404,
            code: "not_found".to_string(),
            message: format!("deployment {} not found", deployment_id),
        })
    }
}

/// Deployment payload as the server sends it
pub fn deployment_json(ready_state: &str) -> Value {
    json!({
        "id": "dpl_1",
        "url": "site-abc.example.dev",
        "readyState": ready_state,
        "inspectorUrl": "https://example.dev/inspect/dpl_1",
    })
}

pub fn deployment(ready_state: &str) -> Deployment {
    serde_json::from_value(deployment_json(ready_state)).unwrap()
}

/// One line of the creation stream
pub fn event(kind: &str, payload: Value) -> String {
    json!({ "type": kind, "payload": payload }).to_string()
}

pub fn file_count(total: u64, missing: &[&str]) -> String {
    event("file-count", json!({ "total": total, "totalSize": 0, "missing": missing }))
}

pub fn log_line(id: &str, text: &str) -> String {
    json!({ "id": id, "type": "stdout", "created": 1_700_000_000_000i64, "text": text }).to_string()
}

/// Creation stream of a deployment that goes live without checks
pub fn happy_path(missing: &[&str], total: u64) -> Vec<String> {
    let mut lines = Vec::new();
    lines.push(file_count(total, missing));
    lines.push(event("created", deployment_json("QUEUED")));
    lines.push(event("building", deployment_json("BUILDING")));
    lines.push(event("ready", deployment_json("READY")));
    let mut aliased = deployment_json("READY");
    aliased["aliases"] = json!(["site.example.dev"]);
    lines.push(event("alias-assigned", aliased));
    lines
}

/// Write `files` under a fresh directory and hash it
pub fn tree(files: &[(&str, &str)]) -> (tempfile::TempDir, deployctl::files::ContentMap) {
    let dir = tempfile::tempdir().unwrap();
    for (name, data) in files {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, data).unwrap();
    }
    let content = deployctl::files::ContentMap::build(dir.path(), &[], &[]).unwrap();
    (dir, content)
}
