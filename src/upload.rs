//! Image upload automation
//!
//! Listing pages accept photos through one of four idioms. [`UploadExecutor::detect`]
//! classifies the page and [`UploadExecutor::execute`] performs the mechanical steps.
//! Individual image failures are collected, never fatal.

use crate::config::UploadConfig;
use crate::dom::{self, DomEvent, DragKind, NodeId, PageDom};
use crate::error::{AutofillError, Result};
use crate::images::ImageFile;
use crate::locator::locate_with;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Upload UI idiom of a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UploadPattern {
    /// A visible file input
    Direct,
    /// A hidden file input exposed by clicking a button
    Hidden,
    /// A drop zone accepting dragged files
    DragDrop,
    /// Batches of files, with the page swapping inputs between batches
    MultiStep,
}

/// Where an image comes from
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    Url(String),
    File(ImageFile),
}

impl ImageSource {
    fn label(&self) -> &str {
        match self {
            ImageSource::Url(url) => url,
            ImageSource::File(file) => &file.name,
        }
    }
}

/// Result of one upload run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOutcome {
    pub success: bool,
    pub uploaded_count: usize,
    pub errors: Vec<String>,
}

impl UploadOutcome {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            uploaded_count: 0,
            errors: vec![error.into()],
        }
    }
}

/// Downloads images into memory
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<ImageFile>;
}

/// [`ImageFetcher`] over HTTP
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AutofillError::FetchFailed {
                url: String::new(),
                reason: format!("Failed to create HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }
}

fn mime_from_extension(name: &str) -> &'static str {
    let lower = name.to_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".webp") {
        "image/webp"
    } else if lower.ends_with(".gif") {
        "image/gif"
    } else {
        "image/jpeg"
    }
}

/// File name for a downloaded image: last path segment, or a fallback
pub fn file_name_from_url(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "image.jpg".to_string())
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<ImageFile> {
        let failed = |reason: String| AutofillError::FetchFailed {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| failed(e.to_string()))?;

        let name = file_name_from_url(url);
        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_lowercase())
            .filter(|v| v.starts_with("image/"))
            .unwrap_or_else(|| mime_from_extension(&name).to_string());

        let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
        Ok(ImageFile::new(name, mime, bytes.to_vec()))
    }
}

const FILE_INPUT: &str = "input[type='file']";

const DROP_ZONE_SELECTORS: &[&str] = &[
    "[data-testid*='dropzone' i]",
    "[data-drop-zone]",
    ".dropzone",
    "[class*='dropzone' i]",
    "[class*='drop-zone' i]",
    "[aria-label*='drop' i]",
];

const TRIGGER_SELECTORS: &[&str] = &[
    "[data-upload-trigger]",
    "[data-testid*='upload' i]",
    "[data-action*='upload' i]",
];

const CLICKABLE: &str = "button, [role='button'], label, a";

const TRIGGER_TEXT: &[&str] = &["upload", "add photo", "add image"];

const ADD_MORE_TEXT: &[&str] = &["add more", "upload more", "add photo", "add image"];

fn file_inputs<D: PageDom + ?Sized>(dom: &D) -> Vec<NodeId> {
    dom::scopes(dom, true)
        .into_iter()
        .flat_map(|scope| dom.query_all(scope, FILE_INPUT).unwrap_or_default())
        .filter(|&node| !dom::is_disabled(dom, node))
        .collect()
}

fn visible_file_input<D: PageDom + ?Sized>(dom: &D) -> Option<NodeId> {
    file_inputs(dom).into_iter().find(|&n| dom.is_visible(n).unwrap_or(false))
}

fn find_clickable<D: PageDom + ?Sized>(dom: &D, needles: &[&str]) -> Option<NodeId> {
    dom::scopes(dom, true)
        .into_iter()
        .find_map(|scope| dom::find_by_text(dom, scope, CLICKABLE, needles))
}

fn find_trigger<D: PageDom + ?Sized>(dom: &D) -> Option<NodeId> {
    locate_with(dom, TRIGGER_SELECTORS, true).or_else(|| find_clickable(dom, TRIGGER_TEXT))
}

/// Runs uploads against a page
#[derive(Clone)]
pub struct UploadExecutor {
    fetcher: Arc<dyn ImageFetcher>,
    config: UploadConfig,
}

impl UploadExecutor {
    pub fn new(fetcher: Arc<dyn ImageFetcher>, config: UploadConfig) -> Self {
        Self { fetcher, config }
    }

    /// Classify the page: drop zone, then hidden input behind a trigger, then a visible
    /// input, else multi-step.
    pub fn detect<D: PageDom + ?Sized>(&self, dom: &D) -> UploadPattern {
        if locate_with(dom, DROP_ZONE_SELECTORS, true).is_some() {
            return UploadPattern::DragDrop;
        }

        let has_hidden_input = file_inputs(dom)
            .into_iter()
            .any(|n| !dom.is_visible(n).unwrap_or(true));
        if has_hidden_input && find_trigger(dom).is_some() {
            return UploadPattern::Hidden;
        }

        if visible_file_input(dom).is_some() {
            return UploadPattern::Direct;
        }

        UploadPattern::MultiStep
    }

    /// Download URL sources; failures are recorded and skipped
    pub async fn materialize(&self, sources: &[ImageSource]) -> (Vec<ImageFile>, Vec<String>) {
        let mut files = Vec::with_capacity(sources.len());
        let mut errors = Vec::new();

        for source in sources {
            match source {
                ImageSource::File(file) => files.push(file.clone()),
                ImageSource::Url(url) => {
                    match tokio::time::timeout(self.config.fetch_timeout(), self.fetcher.fetch(url)).await {
                        Ok(Ok(file)) => files.push(file),
                        Ok(Err(e)) => {
                            log::warn!("Skipping image {}: {}", url, e);
                            errors.push(e.to_string());
                        }
                        Err(_) => {
                            log::warn!("Skipping image {}: timed out", url);
                            errors.push(format!("Timed out fetching {}", url));
                        }
                    }
                }
            }
        }

        (files, errors)
    }

    /// Upload `sources` using `pattern`, or the detected pattern when `None`
    pub async fn execute<D: PageDom + ?Sized>(
        &self,
        dom: &mut D,
        pattern: Option<UploadPattern>,
        sources: &[ImageSource],
    ) -> UploadOutcome {
        if sources.is_empty() {
            return UploadOutcome {
                success: true,
                ..Default::default()
            };
        }

        let pattern = pattern.unwrap_or_else(|| self.detect(dom));
        log::info!("Uploading {} images using {:?} pattern", sources.len(), pattern);

        match pattern {
            UploadPattern::Direct => match visible_file_input(dom).or_else(|| file_inputs(dom).into_iter().next()) {
                Some(input) => self.direct(dom, input, sources).await,
                None => UploadOutcome::failed("No file input found"),
            },
            UploadPattern::Hidden => self.hidden(dom, sources).await,
            UploadPattern::DragDrop => self.drag_drop(dom, sources).await,
            UploadPattern::MultiStep => self.multi_step(dom, sources).await,
        }
    }

    /// Assign materialized files to `input` and notify the page
    pub async fn direct<D: PageDom + ?Sized>(
        &self,
        dom: &mut D,
        input: NodeId,
        sources: &[ImageSource],
    ) -> UploadOutcome {
        let (files, mut errors) = self.materialize(sources).await;
        if files.is_empty() {
            errors.push("No images could be loaded".to_string());
            return UploadOutcome {
                success: false,
                uploaded_count: 0,
                errors,
            };
        }

        let assigned = dom
            .assign_files(input, &files)
            .and_then(|_| dom.dispatch_event(input, DomEvent::Input))
            .and_then(|_| dom.dispatch_event(input, DomEvent::Change));

        match assigned {
            Ok(()) => UploadOutcome {
                success: true,
                uploaded_count: files.len(),
                errors,
            },
            Err(e) => {
                errors.push(format!("Failed to set files on {}: {}", input, e));
                UploadOutcome {
                    success: false,
                    uploaded_count: 0,
                    errors,
                }
            }
        }
    }

    async fn hidden<D: PageDom + ?Sized>(&self, dom: &mut D, sources: &[ImageSource]) -> UploadOutcome {
        let Some(trigger) = find_trigger(dom) else {
            return UploadOutcome::failed("No upload button found");
        };

        if let Err(e) = dom.click(trigger) {
            return UploadOutcome::failed(format!("Failed to click upload button: {}", e));
        }
        tokio::time::sleep(self.config.trigger_settle()).await;

        let input = visible_file_input(dom).or_else(|| file_inputs(dom).into_iter().next());
        match input {
            Some(input) => self.direct(dom, input, sources).await,
            None => UploadOutcome::failed("Upload button did not expose a file input"),
        }
    }

    async fn drag_drop<D: PageDom + ?Sized>(&self, dom: &mut D, sources: &[ImageSource]) -> UploadOutcome {
        let Some(zone) = locate_with(dom, DROP_ZONE_SELECTORS, true) else {
            return UploadOutcome::failed("No drop zone found");
        };

        let (files, mut errors) = self.materialize(sources).await;
        if files.is_empty() {
            errors.push("No images could be loaded".to_string());
            return UploadOutcome {
                success: false,
                uploaded_count: 0,
                errors,
            };
        }

        for kind in [DragKind::Enter, DragKind::Over, DragKind::Drop] {
            if let Err(e) = dom.dispatch_drag(zone, kind, &files) {
                errors.push(format!("{} failed: {}", kind.name(), e));
                return UploadOutcome {
                    success: false,
                    uploaded_count: 0,
                    errors,
                };
            }
        }

        UploadOutcome {
            success: true,
            uploaded_count: files.len(),
            errors,
        }
    }

    /// Next input that has not received a batch yet, clicking an "add more" control when
    /// none is present. Falls back to reusing the last input.
    async fn next_batch_input<D: PageDom + ?Sized>(
        &self,
        dom: &mut D,
        used: &HashSet<NodeId>,
        last: Option<NodeId>,
    ) -> Option<NodeId> {
        let fresh = |dom: &D| file_inputs(dom).into_iter().find(|n| !used.contains(n));

        if let Some(input) = fresh(&*dom) {
            return Some(input);
        }

        if let Some(add_more) = find_clickable(dom, ADD_MORE_TEXT) {
            log::debug!("Clicking 'add more' control {}", add_more);
            if dom.click(add_more).is_ok() {
                tokio::time::sleep(self.config.trigger_settle()).await;
                if let Some(input) = fresh(&*dom) {
                    return Some(input);
                }
            }
        }

        last.filter(|&n| dom.tag_name(n).is_ok())
    }

    async fn multi_step<D: PageDom + ?Sized>(&self, dom: &mut D, sources: &[ImageSource]) -> UploadOutcome {
        let batch_size = self.config.batch_size.max(1);
        let mut outcome = UploadOutcome::default();
        let mut used = HashSet::new();
        let mut last = None;

        for (step, batch) in sources.chunks(batch_size).enumerate() {
            if step >= self.config.max_steps {
                outcome.errors.push(format!(
                    "Stopped after {} upload steps with {} images remaining",
                    step,
                    sources.len() - step * batch_size
                ));
                break;
            }

            let Some(input) = self.next_batch_input(dom, &used, last).await else {
                outcome.errors.push(format!("No upload input available for batch {}", step + 1));
                break;
            };

            log::debug!("Uploading batch {} ({} images) to {}", step + 1, batch.len(), input);
            let result = self.direct(dom, input, batch).await;
            outcome.uploaded_count += result.uploaded_count;
            outcome.errors.extend(result.errors);
            if !result.success {
                let labels: Vec<&str> = batch.iter().map(ImageSource::label).collect();
                log::warn!("Batch {} failed: {}", step + 1, labels.join(", "));
            }

            used.insert(input);
            last = Some(input);
        }

        outcome.success = outcome.uploaded_count > 0;
        outcome
    }
}
