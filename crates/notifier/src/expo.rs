//! Expo push API transport.
//!
//! Messages are POSTed as a JSON array; Expo answers with one ticket per
//! message. A `DeviceNotRegistered` ticket means the token is gone for good.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use herald_common::config::AppConfig;

use crate::{PushError, PushTransport};

/// Expo accepts at most this many messages per request.
const MAX_MESSAGES_PER_REQUEST: usize = 100;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Serialize)]
struct ExpoMessage<'a> {
    to: &'a str,
    title: &'a str,
    body: &'a str,
    sound: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct ExpoResponse {
    #[serde(default)]
    data: Vec<ExpoTicket>,
    #[serde(default)]
    errors: Vec<ExpoRequestError>,
}

#[derive(Debug, Deserialize)]
struct ExpoTicket {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<ExpoTicketDetails>,
}

#[derive(Debug, Deserialize)]
struct ExpoTicketDetails {
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExpoRequestError {
    #[serde(default)]
    code: Option<String>,
    message: String,
}

/// Push transport backed by the Expo push service.
#[derive(Debug, Clone)]
pub struct ExpoPushTransport {
    http: Client,
    push_url: String,
    access_token: Option<String>,
}

impl ExpoPushTransport {
    pub fn new(push_url: impl Into<String>, access_token: Option<String>) -> Result<Self, PushError> {
        let http = Client::builder()
            .user_agent(concat!("meal-herald/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            push_url: push_url.into(),
            access_token,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, PushError> {
        Self::new(config.expo_push_url.clone(), config.expo_access_token.clone())
    }

    async fn send_chunk(&self, chunk: &[String], title: &str, body: &str) -> Result<(), PushError> {
        let messages: Vec<ExpoMessage<'_>> = chunk
            .iter()
            .map(|to| ExpoMessage {
                to,
                title,
                body,
                sound: "default",
            })
            .collect();

        let mut request = self
            .http
            .post(&self.push_url)
            .header("Accept", "application/json")
            .json(&messages);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        // Expo reports request-level problems with a 4xx and an `errors` body.
        let parsed: ExpoResponse = match serde_json::from_str(&text) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(PushError::Status {
                    status: status.as_u16(),
                    body: text,
                });
            }
            Err(e) => {
                return Err(PushError::Service(format!("invalid response body: {e}")));
            }
        };

        if !status.is_success() && parsed.errors.is_empty() {
            return Err(PushError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        interpret_response(parsed)
    }
}

#[async_trait]
impl PushTransport for ExpoPushTransport {
    async fn send(&self, addresses: &[String], title: &str, body: &str) -> Result<(), PushError> {
        for chunk in addresses.chunks(MAX_MESSAGES_PER_REQUEST) {
            self.send_chunk(chunk, title, body).await?;
            tracing::debug!(recipients = chunk.len(), "Expo push request accepted");
        }
        Ok(())
    }
}

/// Map an Expo response onto the transport's error model.
///
/// A dead-token ticket takes precedence over other ticket errors so the
/// caller can reconcile its endpoints.
fn interpret_response(response: ExpoResponse) -> Result<(), PushError> {
    if !response.errors.is_empty() {
        let joined = response
            .errors
            .iter()
            .map(|e| match &e.code {
                Some(code) => format!("{code}: {}", e.message),
                None => e.message.clone(),
            })
            .collect::<Vec<_>>()
            .join("; ");
        return Err(PushError::Service(joined));
    }

    let mut other_error = None;
    for ticket in response.data.iter().filter(|t| t.status != "ok") {
        let code = ticket
            .details
            .as_ref()
            .and_then(|d| d.error.as_deref())
            .unwrap_or("unknown");
        let message = ticket.message.clone().unwrap_or_else(|| code.to_string());

        if code == "DeviceNotRegistered" {
            return Err(PushError::AddressRejected(message));
        }
        other_error.get_or_insert(format!("{code}: {message}"));
    }

    match other_error {
        Some(err) => Err(PushError::Service(err)),
        None => Ok(()),
    }
}
