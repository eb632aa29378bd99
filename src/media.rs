//! Listing photo and video upload to the media CDN.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    fn resource_type(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

#[derive(Debug, Clone)]
pub struct MediaAsset {
    pub file_name: String,
    pub content_type: String,
    pub kind: MediaKind,
    pub data: Bytes,
}

/// Stores one asset and returns its public HTTPS URL.
#[async_trait]
pub trait MediaUploader: Send + Sync {
    async fn upload(&self, asset: &MediaAsset) -> Result<String>;
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: String,
}

/// Unsigned uploads to a Cloudinary cloud through an upload preset.
pub struct CloudinaryUploader {
    client: reqwest::Client,
    base_url: String,
    cloud_name: String,
    preset: String,
}

impl CloudinaryUploader {
    pub fn new(config: &Config) -> Self {
        Self::with_base_url("https://api.cloudinary.com", config)
    }

    pub fn with_base_url(base_url: &str, config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            cloud_name: config.media_cloud_name.clone(),
            preset: config.media_upload_preset.clone(),
        }
    }

    fn endpoint(&self, kind: MediaKind) -> String {
        format!(
            "{}/v1_1/{}/{}/upload",
            self.base_url,
            self.cloud_name,
            kind.resource_type()
        )
    }
}

#[async_trait]
impl MediaUploader for CloudinaryUploader {
    async fn upload(&self, asset: &MediaAsset) -> Result<String> {
        let file = reqwest::multipart::Part::bytes(asset.data.to_vec())
            .file_name(asset.file_name.clone())
            .mime_str(&asset.content_type)?;
        let form = reqwest::multipart::Form::new()
            .text("upload_preset", self.preset.clone())
            .part("file", file);

        let response = self
            .client
            .post(self.endpoint(asset.kind))
            .multipart(form)
            .send()
            .await?
            .error_for_status()?;
        let body: UploadResponse = response.json().await?;
        Ok(body.secure_url)
    }
}

/// Result of a bulk upload. URLs keep the order the assets were given in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub images: Vec<String>,
    pub videos: Vec<String>,
    pub failed: usize,
    pub timed_out: usize,
}

impl UploadReport {
    pub fn is_complete(&self) -> bool {
        self.failed == 0 && self.timed_out == 0
    }
}

/// Upload every asset concurrently. When `deadline` passes, whatever has
/// finished is kept and the rest is abandoned; that is a partial success,
/// not an error. Individual failures are logged and skipped.
pub async fn upload_all(
    uploader: &dyn MediaUploader,
    assets: &[MediaAsset],
    deadline: Duration,
) -> UploadReport {
    let mut pending: FuturesUnordered<_> = assets
        .iter()
        .enumerate()
        .map(|(i, asset)| async move { (i, uploader.upload(asset).await) })
        .collect();

    let mut done: Vec<(usize, String)> = Vec::with_capacity(assets.len());
    let mut report = UploadReport::default();
    let until = tokio::time::Instant::now() + deadline;

    loop {
        match tokio::time::timeout_at(until, pending.next()).await {
            Ok(Some((i, Ok(url)))) => {
                metrics::counter!(crate::observability::MEDIA_UPLOADS_TOTAL, "status" => "ok")
                    .increment(1);
                done.push((i, url));
            }
            Ok(Some((i, Err(e)))) => {
                metrics::counter!(crate::observability::MEDIA_UPLOADS_TOTAL, "status" => "error")
                    .increment(1);
                warn!("upload of {} failed: {e}", assets[i].file_name);
                report.failed += 1;
            }
            Ok(None) => break,
            Err(_) => {
                report.timed_out = pending.len();
                metrics::counter!(crate::observability::MEDIA_UPLOADS_TOTAL, "status" => "timeout")
                    .increment(report.timed_out as u64);
                warn!(
                    "media upload deadline of {deadline:?} passed, continuing with {} of {} assets",
                    done.len(),
                    assets.len()
                );
                break;
            }
        }
    }

    done.sort_by_key(|(i, _)| *i);
    for (i, url) in done {
        match assets[i].kind {
            MediaKind::Image => report.images.push(url),
            MediaKind::Video => report.videos.push(url),
        }
    }
    info!(
        "uploaded {} images and {} videos",
        report.images.len(),
        report.videos.len()
    );
    report
}

/// Validate and upload a listing's media under the configured deadline.
pub async fn upload_listing_media(
    uploader: &dyn MediaUploader,
    assets: &[MediaAsset],
    config: &Config,
) -> Result<UploadReport> {
    check_batch(assets)?;
    Ok(upload_all(uploader, assets, config.media_upload_timeout).await)
}

/// Reject an asset list the catalog would refuse anyway.
pub fn check_batch(assets: &[MediaAsset]) -> Result<()> {
    if assets.len() > crate::limits::MAX_MEDIA_ASSETS {
        return Err(Error::InvalidRequest("too many media assets".into()));
    }
    if let Some(empty) = assets.iter().find(|a| a.data.is_empty()) {
        return Err(Error::InvalidRequest(format!("{} is empty", empty.file_name)));
    }
    Ok(())
}
