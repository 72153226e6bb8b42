//! JSON message contract shared with the page agents and the operator.
//!
//! Inbound messages are objects tagged by `type`, e.g.
//! `{"type": "OPEN_URLS", "urls": ["https://..."]}`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{Msg, StatusView};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentMessage {
    StartScraping,
    PauseScraping,
    ResumeScrapingData,
    #[serde(rename = "RESUME_SCRAPING1")]
    QuickResume,
    StopScraping,
    #[serde(rename_all = "camelCase")]
    SiteSelected { site_value: String },
    #[serde(rename_all = "camelCase")]
    SetParent { parent_url: String },
    OpenUrls {
        #[serde(default, deserialize_with = "urls_or_empty")]
        urls: Vec<String>,
    },
    ListingsCount { count: u64 },
    ScrapeSuccess,
    ScrapeFailed,
    GetDeviceId,
    GetStatus,
    CategoryDone,
}

impl From<AgentMessage> for Msg {
    fn from(message: AgentMessage) -> Self {
        match message {
            AgentMessage::StartScraping => Msg::StartScraping,
            AgentMessage::PauseScraping => Msg::PauseScraping,
            AgentMessage::ResumeScrapingData => Msg::ResumeScraping,
            AgentMessage::QuickResume => Msg::QuickResume,
            AgentMessage::StopScraping => Msg::StopScraping,
            AgentMessage::SiteSelected { site_value } => Msg::SiteSelected(site_value),
            AgentMessage::SetParent { parent_url } => Msg::SetParent(parent_url),
            AgentMessage::OpenUrls { urls } => Msg::OpenUrls(urls),
            AgentMessage::ListingsCount { count } => Msg::ListingsCount(count),
            AgentMessage::ScrapeSuccess => Msg::ScrapeSucceeded,
            AgentMessage::ScrapeFailed => Msg::ScrapeFailed,
            AgentMessage::GetDeviceId => Msg::GetDeviceId,
            AgentMessage::GetStatus => Msg::GetStatus,
            AgentMessage::CategoryDone => Msg::CategoryDone,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("unknown message type: {0}")]
    UnknownType(String),
}

const KNOWN_TYPES: &[&str] = &[
    "START_SCRAPING",
    "PAUSE_SCRAPING",
    "RESUME_SCRAPING_DATA",
    "RESUME_SCRAPING1",
    "STOP_SCRAPING",
    "SITE_SELECTED",
    "SET_PARENT",
    "OPEN_URLS",
    "LISTINGS_COUNT",
    "SCRAPE_SUCCESS",
    "SCRAPE_FAILED",
    "GET_DEVICE_ID",
    "GET_STATUS",
    "CATEGORY_DONE",
];

/// Decodes one JSON message into an update message.
pub fn decode_message(raw: &str) -> Result<Msg, WireError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|err| WireError::Malformed(err.to_string()))?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| WireError::Malformed("missing \"type\"".to_string()))?;
    if !KNOWN_TYPES.contains(&kind) {
        return Err(WireError::UnknownType(kind.to_string()));
    }
    let message: AgentMessage =
        serde_json::from_value(value).map_err(|err| WireError::Malformed(err.to_string()))?;
    Ok(message.into())
}

/// Answers to the messages that expect one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    DeviceId {
        #[serde(rename = "deviceId")]
        device_id: Option<String>,
    },
    Ack {
        status: String,
    },
    Status(StatusView),
}

impl Reply {
    pub fn category_done() -> Self {
        Reply::Ack {
            status: "done".to_string(),
        }
    }
}

fn urls_or_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let urls = match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(url) => Some(url),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };
    Ok(urls)
}
