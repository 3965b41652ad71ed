// src/services/notifier.rs

//! Webhook notifier.
//!
//! Pushes the decoded collection to the update endpoint. Delivery is best
//! effort: failures are logged and reported as a [`Delivery`] value, never as
//! an error, and there is no retry within a cycle.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use url::Url;

use crate::error::Result;
use crate::models::{NotifierConfig, Room};
use crate::utils::http;

/// Request body sent to the update endpoint.
#[derive(Debug, Serialize)]
pub struct UpdatePayload<'a> {
    pub timestamp: DateTime<Utc>,
    pub classrooms: &'a [Room],
    pub total_classrooms: usize,
}

impl<'a> UpdatePayload<'a> {
    pub fn new(classrooms: &'a [Room]) -> Self {
        Self {
            timestamp: Utc::now(),
            classrooms,
            total_classrooms: classrooms.len(),
        }
    }
}

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Endpoint answered with a 2xx status
    Delivered,
    /// Endpoint answered with any other status
    Rejected { status: u16, body: String },
    /// Request never got a response (connect error, timeout, ...)
    Failed { message: String },
}

impl Delivery {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Delivery::Delivered)
    }
}

/// Sink for decoded collections.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver the collection. Must not fail.
    async fn notify(&self, rooms: &[Room]) -> Delivery;
}

/// Notifier posting JSON to an HTTP endpoint.
pub struct WebhookNotifier {
    client: Client,
    endpoint: Url,
}

impl WebhookNotifier {
    pub fn new(client: Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    pub fn from_config(config: &NotifierConfig) -> Result<Self> {
        let client = http::create_async_client(config.timeout())?;
        Ok(Self::new(client, config.endpoint()?))
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn post(&self, payload: &UpdatePayload<'_>) -> std::result::Result<Delivery, reqwest::Error> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(Delivery::Delivered);
        }

        let body = response.text().await.unwrap_or_default();
        Ok(Delivery::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, rooms: &[Room]) -> Delivery {
        let payload = UpdatePayload::new(rooms);

        let delivery = match self.post(&payload).await {
            Ok(delivery) => delivery,
            Err(e) => Delivery::Failed {
                message: e.to_string(),
            },
        };

        match &delivery {
            Delivery::Delivered => {
                log::info!("Changes delivered to {} ({} rooms)", self.endpoint, rooms.len())
            }
            Delivery::Rejected { status, body } => {
                log::warn!("Update endpoint answered {}: {}", status, body)
            }
            Delivery::Failed { message } => {
                log::error!("Failed to deliver changes to {}: {}", self.endpoint, message)
            }
        }
        delivery
    }
}
