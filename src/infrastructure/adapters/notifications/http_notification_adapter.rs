/*
HTTP Notification Adapter

Implements the NotificationGateway port against the dashboard's REST API using reqwest.

Routes (relative to the configured base URL):

    GET    api/notifications
    PUT    api/notifications/{id}              {"read": bool}
    PUT    api/notifications/mark-all-read     {}
    POST   api/notifications                   draft
    DELETE api/notifications/{id}

Requests carry `Authorization: Bearer <token>`. No request timeout is configured.
*/

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Response, StatusCode};
use url::Url;

use crate::application::ports::output::notification_port::{
    Credential, GatewayError, GatewayResult, Notification, NotificationDraft, NotificationGateway,
};
use crate::config::application_settings::Settings;

const USER_AGENT: &str = concat!("notification-sync/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct HttpNotificationAdapter {
    client: Client,
    base_url: Url,
}

impl From<reqwest::Error> for GatewayError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            GatewayError::DecodeError(error.to_string())
        } else {
            GatewayError::ConnectionError(error.to_string())
        }
    }
}

impl HttpNotificationAdapter {
    pub fn new(base_url: Url) -> GatewayResult<Self> {
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::ConfigurationError(format!(
                "base URL cannot carry a path: {}",
                base_url
            )));
        }
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| GatewayError::ConfigurationError(e.to_string()))?;
        Ok(Self { client, base_url })
    }

    pub fn from_settings(settings: &Settings) -> GatewayResult<Self> {
        let base_url = settings
            .api
            .parsed_base_url()
            .map_err(|e| GatewayError::ConfigurationError(e.to_string()))?;
        let adapter = Self::new(base_url)?;
        debug!("Notification API at {}", adapter.base_url());
        Ok(adapter)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds `<base>/api/notifications[/<segment>...]`, percent-encoding each segment
    fn endpoint(&self, segments: &[&str]) -> GatewayResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                GatewayError::ConfigurationError(format!(
                    "base URL cannot carry a path: {}",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(["api", "notifications"].iter().chain(segments.iter()));
        Ok(url)
    }

    async fn check(response: Response) -> GatewayResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        let message = if body.trim().is_empty() {
            status.canonical_reason().unwrap_or("request failed").to_string()
        } else {
            body
        };

        Err(match status {
            StatusCode::NOT_FOUND => GatewayError::NotFound(url),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                GatewayError::AuthenticationError(message)
            }
            _ => GatewayError::HttpStatus {
                status: status.as_u16(),
                message,
            },
        })
    }
}

#[async_trait]
impl NotificationGateway for HttpNotificationAdapter {
    fn name(&self) -> &str {
        "http"
    }

    async fn list_notifications(&self, credential: &Credential) -> GatewayResult<Vec<Notification>> {
        let url = self.endpoint(&[])?;
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .bearer_auth(credential.expose())
            .send()
            .await?;
        let notifications = Self::check(response).await?.json::<Vec<Notification>>().await?;
        Ok(notifications)
    }

    async fn update_read(&self, credential: &Credential, id: &str, read: bool) -> GatewayResult<()> {
        let url = self.endpoint(&[id])?;
        debug!("PUT {} read={}", url, read);

        let response = self
            .client
            .put(url)
            .bearer_auth(credential.expose())
            .json(&serde_json::json!({ "read": read }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn mark_all_read(&self, credential: &Credential) -> GatewayResult<()> {
        let url = self.endpoint(&["mark-all-read"])?;
        debug!("PUT {}", url);

        let response = self
            .client
            .put(url)
            .bearer_auth(credential.expose())
            .json(&serde_json::json!({}))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn create_notification(
        &self,
        credential: &Credential,
        draft: &NotificationDraft,
    ) -> GatewayResult<Notification> {
        let url = self.endpoint(&[])?;
        debug!("POST {}", url);

        let response = self
            .client
            .post(url)
            .bearer_auth(credential.expose())
            .json(draft)
            .send()
            .await?;
        let created = Self::check(response).await?.json::<Notification>().await?;
        Ok(created)
    }

    async fn delete_notification(&self, credential: &Credential, id: &str) -> GatewayResult<()> {
        let url = self.endpoint(&[id])?;
        debug!("DELETE {}", url);

        let response = self
            .client
            .delete(url)
            .bearer_auth(credential.expose())
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
