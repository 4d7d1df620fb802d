//! Upload of the contents the server reported missing.
//!
//! Uploads run as tokio tasks; a semaphore bounds how many transfer at once.
//! The caller drains an [`UploadRun`] which interleaves throttled progress
//! samples with per-file completions.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::deploy::api::{DeploymentApi, FileUpload};
use crate::errors::ClientError;
use crate::files::content_map::{content_hash, ContentMap};
use crate::upload::progress::{ByteCounter, ProgressMode, ProgressSample, ProgressThrottle};

/// Default number of concurrent uploads.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// How often in-flight counters are aggregated.
const SAMPLE_TICK: Duration = Duration::from_millis(50);

/// Upload manager options
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Maximum concurrent uploads
    pub concurrency: usize,

    /// Progress sample policy
    pub progress: ProgressMode,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            progress: ProgressMode::default(),
        }
    }
}

/// A content that finished uploading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub hash: String,
    pub size: u64,
    pub names: Vec<String>,

    /// Uploads still running or queued after this one
    pub remaining: usize,
}

/// Item of an upload run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    Progress(ProgressSample),
    Uploaded(UploadedFile),
}

/// One in-flight upload of a missing content
#[derive(Debug, Clone)]
pub struct UploadTask {
    pub hash: String,
    pub size: u64,
    pub uploaded: ByteCounter,
    pub done: bool,
}

/// Uploads missing contents of a [`ContentMap`]
#[derive(Clone)]
pub struct UploadManager {
    api: Arc<dyn DeploymentApi>,
    options: UploadOptions,
}

impl UploadManager {
    pub fn new(api: Arc<dyn DeploymentApi>, options: UploadOptions) -> Self {
        Self { api, options }
    }

    /// Prepare the upload of `missing`.
    ///
    /// Nothing is sent until the returned run is polled. Hashes that are not
    /// part of `content` are skipped, duplicates are uploaded once.
    pub fn upload(&self, content: Arc<ContentMap>, missing: &[String]) -> UploadRun {
        let mut seen = BTreeSet::new();
        let mut tasks = Vec::new();
        for hash in missing {
            if !seen.insert(hash.as_str()) {
                continue;
            }
            match content.get(hash) {
                Some(entry) => tasks.push(UploadTask {
                    hash: hash.clone(),
                    size: entry.size,
                    uploaded: ByteCounter::new(),
                    done: false,
                }),
                None => warn!(hash = %hash, "Server requested a content that is not part of the deployment, skipping"),
            }
        }

        let total = tasks.iter().map(|t| t.size).sum();
        UploadRun {
            api: self.api.clone(),
            content,
            semaphore: Arc::new(Semaphore::new(self.options.concurrency.max(1))),
            throttle: ProgressThrottle::new(self.options.progress, total),
            total,
            tasks,
            join_set: JoinSet::new(),
            ticker: None,
            pending: VecDeque::new(),
            started: false,
            finished: false,
        }
    }
}

/// A finite, single-use sequence of upload events
pub struct UploadRun {
    api: Arc<dyn DeploymentApi>,
    content: Arc<ContentMap>,
    semaphore: Arc<Semaphore>,
    throttle: ProgressThrottle,
    total: u64,
    tasks: Vec<UploadTask>,
    join_set: JoinSet<(String, Result<(), ClientError>)>,
    ticker: Option<Interval>,
    pending: VecDeque<UploadEvent>,
    started: bool,
    finished: bool,
}

enum Step {
    Joined(Option<Result<(String, Result<(), ClientError>), tokio::task::JoinError>>),
    Tick,
}

impl UploadRun {
    /// Bytes to upload
    pub fn total_bytes(&self) -> u64 {
        self.total
    }

    /// Number of contents to upload
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn tasks(&self) -> &[UploadTask] {
        &self.tasks
    }

    /// Next event; `None` once every upload finished or after the first failure
    pub async fn next(&mut self) -> Option<Result<UploadEvent, ClientError>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(Ok(event));
            }
            if self.finished {
                return None;
            }
            if !self.started {
                self.start();
                continue;
            }
            if self.join_set.is_empty() {
                self.finished = true;
                info!("Uploaded {} files ({} bytes)", self.tasks.len(), self.total);
                continue;
            }

            let step = match self.ticker.as_mut() {
                Some(ticker) => tokio::select! {
                    joined = self.join_set.join_next() => Step::Joined(joined),
                    _ = ticker.tick() => Step::Tick,
                },
                None => Step::Joined(self.join_set.join_next().await),
            };

            match step {
                Step::Tick => self.sample(),
                Step::Joined(None) => {}
                Step::Joined(Some(Ok((hash, Ok(()))))) => self.complete(&hash),
                Step::Joined(Some(Ok((hash, Err(e))))) => {
                    self.abort();
                    return Some(Err(ClientError::upload(hash, e)));
                }
                Step::Joined(Some(Err(e))) => {
                    self.abort();
                    return Some(Err(ClientError::Internal(format!("upload task failed: {}", e))));
                }
            }
        }
    }

    fn start(&mut self) {
        self.started = true;
        if self.tasks.is_empty() {
            self.finished = true;
            return;
        }

        info!("Uploading {} files ({} bytes)", self.tasks.len(), self.total);
        let mut ticker = tokio::time::interval(SAMPLE_TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);

        for task in &self.tasks {
            let Some(entry) = self.content.get(&task.hash) else {
                continue;
            };
            let api = self.api.clone();
            let semaphore = self.semaphore.clone();
            let path = entry.path.clone();
            let hash = task.hash.clone();
            let size = task.size;
            let counter = task.uploaded.clone();

            self.join_set.spawn(async move {
                let result: Result<(), ClientError> = async {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|e| ClientError::Internal(e.to_string()))?;

                    debug!(hash = %hash, size, "Uploading file");
                    let data = tokio::fs::read(&path)
                        .await
                        .map_err(|e| ClientError::file_system(&path, e))?;
                    if content_hash(&data) != hash {
                        return Err(ClientError::file_system(
                            &path,
                            std::io::Error::other("file changed after it was hashed"),
                        ));
                    }

                    api.upload_file(FileUpload {
                        hash: hash.clone(),
                        data,
                        progress: counter.clone(),
                    })
                    .await?;
                    counter.fill_to(size);
                    Ok::<(), ClientError>(())
                }
                .await;
                (hash, result)
            });
        }

        self.sample();
    }

    fn complete(&mut self, hash: &str) {
        let Some(index) = self.tasks.iter().position(|t| t.hash == hash) else {
            return;
        };
        self.tasks[index].done = true;
        self.sample();

        let remaining = self.tasks.iter().filter(|t| !t.done).count();
        let task = &self.tasks[index];
        let names = self
            .content
            .get(hash)
            .map(|e| e.names.iter().cloned().collect())
            .unwrap_or_default();
        debug!(hash = %hash, size = task.size, remaining, "Uploaded file");
        self.pending.push_back(UploadEvent::Uploaded(UploadedFile {
            hash: hash.to_string(),
            size: task.size,
            names,
            remaining,
        }));
    }

    fn sample(&mut self) {
        let uploaded = self.tasks.iter().map(|t| t.uploaded.get()).sum();
        if let Some(sample) = self.throttle.observe(uploaded, Instant::now()) {
            self.pending.push_back(UploadEvent::Progress(sample));
        }
    }

    fn abort(&mut self) {
        self.join_set.abort_all();
        self.pending.clear();
        self.finished = true;
    }
}
