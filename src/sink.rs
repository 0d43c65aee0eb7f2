//! Outbound side: what the watcher says, and the chat platform it says it to.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode, header};
use serde::Serialize;
use std::time::Duration;
use url::Url;

use crate::error::{Error, Result};
use crate::model::{LiveDetails, Subject};

const LIVE_COLOR: u32 = 0x00ff_00;
const UNKNOWN: &str = "unknown";

/// One outgoing chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub content: String,
    pub embed: Option<Embed>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Embed {
    pub title: String,
    pub color: u32,
    pub fields: Vec<(String, String)>,
    pub image_url: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            embed: None,
        }
    }

    /// Mentions the owner and attaches the broadcast card.
    pub fn live_started(
        owner_user_id: &str,
        subject: &Subject,
        details: &LiveDetails,
        live_url_base: &str,
    ) -> Self {
        let link = format!("{live_url_base}{}", subject.id);
        let or_unknown = |value: &Option<String>| value.clone().unwrap_or_else(|| UNKNOWN.to_string());

        Self {
            content: format!(
                "🔔 <@{owner_user_id}>, **{}** just went live!",
                subject.name
            ),
            embed: Some(Embed {
                title: "📢 Stream started".to_string(),
                color: LIVE_COLOR,
                fields: vec![
                    (
                        "Title".to_string(),
                        details.title.clone().unwrap_or_else(|| "untitled".to_string()),
                    ),
                    ("Category".to_string(), or_unknown(&details.category)),
                    ("Started".to_string(), or_unknown(&details.started_at)),
                    (
                        "Watch".to_string(),
                        format!("🟢 **[{}]** is live now!\n{link}", subject.name),
                    ),
                ],
                image_url: details.image_url.clone(),
                timestamp: Utc::now(),
            }),
        }
    }

    pub fn live_ended(subject: &Subject) -> Self {
        Self::text(format!("🔴 **[{}]** has ended the stream.", subject.name))
    }

    pub fn unknown_subject(selector_text: &str) -> Self {
        Self::text(format!(
            "❌ **[{selector_text}]** is not on the streamer list. Please check the name and try again."
        ))
    }
}

/// Delivers notifications. Best-effort: the watcher only logs failures.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, channel_id: &str, notification: &Notification) -> Result<()>;
}

/// Checks that a destination channel still exists and is reachable.
#[async_trait]
pub trait ChannelResolver: Send + Sync {
    async fn resolve(&self, channel_id: &str) -> Result<()>;
}

#[derive(Serialize)]
struct DiscordMessage<'a> {
    content: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    embeds: Vec<DiscordEmbed<'a>>,
}

#[derive(Serialize)]
struct DiscordEmbed<'a> {
    title: &'a str,
    color: u32,
    fields: Vec<DiscordField<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<DiscordImage<'a>>,
    timestamp: String,
}

#[derive(Serialize)]
struct DiscordField<'a> {
    name: &'a str,
    value: &'a str,
}

#[derive(Serialize)]
struct DiscordImage<'a> {
    url: &'a str,
}

impl<'a> From<&'a Notification> for DiscordMessage<'a> {
    fn from(notification: &'a Notification) -> Self {
        let embeds = notification
            .embed
            .iter()
            .map(|embed| DiscordEmbed {
                title: &embed.title,
                color: embed.color,
                fields: embed
                    .fields
                    .iter()
                    .map(|(name, value)| DiscordField {
                        name: name.as_str(),
                        value: value.as_str(),
                    })
                    .collect(),
                image: embed.image_url.as_deref().map(|url| DiscordImage { url }),
                timestamp: embed.timestamp.to_rfc3339(),
            })
            .collect();

        Self {
            content: &notification.content,
            embeds,
        }
    }
}

/// Bot-token client for the Discord REST API.
pub struct DiscordClient {
    client: Client,
    api_base: Url,
}

impl DiscordClient {
    pub fn new(api_base: &str, token: &str, timeout_secs: u64) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        let mut auth = header::HeaderValue::from_str(&format!("Bot {token}"))
            .map_err(|_| Error::Config("discord token contains invalid characters".into()))?;
        auth.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth);

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            api_base: Url::parse(api_base)?,
        })
    }

    fn channel_url(&self, channel_id: &str) -> Result<Url> {
        Ok(self.api_base.join(&format!("channels/{channel_id}"))?)
    }
}

#[async_trait]
impl NotificationSink for DiscordClient {
    async fn send(&self, channel_id: &str, notification: &Notification) -> Result<()> {
        let url = self.api_base.join(&format!("channels/{channel_id}/messages"))?;
        let payload = DiscordMessage::from(notification);

        self.client
            .post(url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Maps a non-success channel lookup to an error. Only "not found" and
/// "forbidden" mean the channel is gone for us; anything else is transient.
fn channel_lookup_error(channel_id: &str, status: StatusCode) -> Error {
    match status {
        StatusCode::NOT_FOUND | StatusCode::FORBIDDEN => {
            Error::ChannelUnavailable(format!("{channel_id} ({status})"))
        }
        _ => Error::Api {
            code: i64::from(status.as_u16()),
            message: format!("channel lookup for {channel_id} failed"),
        },
    }
}

#[async_trait]
impl ChannelResolver for DiscordClient {
    async fn resolve(&self, channel_id: &str) -> Result<()> {
        let response = self.client.get(self.channel_url(channel_id)?).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(channel_lookup_error(channel_id, status))
        }
    }
}
