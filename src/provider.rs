//! Status provider contract and the HTTP adapter for the streaming platform.

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use crate::error::{Error, Result};
use crate::model::{LiveDetails, LiveStatus};

/// Answers "is this subject live right now" and, when live, what it is streaming.
#[async_trait]
pub trait StatusProvider: Send + Sync {
    async fn fetch_status(&self, subject_id: &str) -> Result<LiveStatus>;

    /// Only meaningful while the subject is live.
    async fn fetch_details(&self, subject_id: &str) -> Result<LiveDetails>;
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    code: i64,
    message: Option<String>,
    content: Option<LiveContent>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveContent {
    status: Option<String>,
    live_title: Option<String>,
    live_category_value: Option<String>,
    live_category: Option<String>,
    open_date: Option<String>,
    live_image_url: Option<String>,
    channel: Option<ChannelContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelContent {
    channel_image_url: Option<String>,
}

impl ApiResponse {
    fn into_content(self) -> Result<LiveContent> {
        if self.code != 200 {
            return Err(Error::Api {
                code: self.code,
                message: self.message.unwrap_or_default(),
            });
        }
        Ok(self.content.unwrap_or_default())
    }
}

impl LiveContent {
    fn status(&self) -> LiveStatus {
        match self.status.as_deref() {
            Some("OPEN") => LiveStatus::Open,
            _ => LiveStatus::Close,
        }
    }

    fn into_details(self) -> LiveDetails {
        // Thumbnails come as a template with a `{type}` size placeholder.
        let image_url = self
            .live_image_url
            .map(|url| url.replace("{type}", "720"))
            .or_else(|| self.channel.and_then(|c| c.channel_image_url));

        LiveDetails {
            title: self.live_title.filter(|t| !t.is_empty()),
            category: self
                .live_category_value
                .or(self.live_category)
                .filter(|c| !c.is_empty()),
            started_at: self.open_date,
            image_url,
        }
    }
}

/// Polls the platform's `channels/{id}/live-detail` endpoint.
pub struct ChzzkProvider {
    client: Client,
    base_url: Url,
}

impl ChzzkProvider {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("livewatch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: Url::parse(base_url)?,
        })
    }

    fn live_detail_url(&self, subject_id: &str) -> Result<Url> {
        Ok(self
            .base_url
            .join(&format!("channels/{subject_id}/live-detail"))?)
    }

    async fn live_detail(&self, subject_id: &str) -> Result<LiveContent> {
        let url = self.live_detail_url(subject_id)?;
        debug!("GET {url}");

        let response: ApiResponse = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response.into_content()
    }
}

#[async_trait]
impl StatusProvider for ChzzkProvider {
    async fn fetch_status(&self, subject_id: &str) -> Result<LiveStatus> {
        Ok(self.live_detail(subject_id).await?.status())
    }

    async fn fetch_details(&self, subject_id: &str) -> Result<LiveDetails> {
        Ok(self.live_detail(subject_id).await?.into_details())
    }
}
