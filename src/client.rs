use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::conversation::{Role, Turn};
use crate::history::HistoryEntry;

// ── Wire types ────────────────────────────────────────────────────────────────
// Paths and field names below are fixed by the existing backend service;
// they are wire constants, not style choices.

#[derive(Debug, Deserialize)]
pub struct Ack {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct SignupRequest<'a> {
    name: &'a str,
    username: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendRequest<'a> {
    text: &'a str,
    username: &'a str,
    topic: &'a str,
    document_content: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub struct SendResponse {
    pub response: String,
    pub topic: String,
}

#[derive(Debug, Serialize)]
struct UsernameRequest<'a> {
    username: &'a str,
}

#[derive(Debug, Serialize)]
struct DeleteRequest<'a> {
    username: &'a str,
    topic: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryResponse {
    success: bool,
    #[serde(default)]
    message: String,
    #[serde(default)]
    chat_history: Vec<WireChat>,
}

#[derive(Debug, Deserialize)]
struct WireChat {
    topic: String,
    #[serde(default)]
    messages: Vec<WireMessage>,
}

/// `type` is "user" or "bot" on the wire.
#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(rename = "type")]
    kind: String,
    text: String,
}

impl From<WireChat> for HistoryEntry {
    fn from(chat: WireChat) -> Self {
        let turns = chat
            .messages
            .into_iter()
            .map(|m| Turn {
                role: if m.kind == "user" { Role::User } else { Role::Assistant },
                text: m.text,
            })
            .collect();
        HistoryEntry {
            topic: chat.topic,
            turns,
        }
    }
}

// ── Client ────────────────────────────────────────────────────────────────────

/// HTTP client for the assistant backend. One method per backend operation;
/// no retries, no timeouts — a failed call surfaces as an Err and the caller
/// decides what (if anything) the user sees.
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
}

impl ApiClient {
    pub fn new(endpoint: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: endpoint.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Authenticate. Returns the backend verdict (success flag + message);
    /// transport errors are Err.
    pub async fn login(&self, username: &str, password: &str) -> Result<Ack> {
        let resp = self
            .http
            .post(self.url("/login"))
            .json(&LoginRequest { username, password })
            .send()
            .await?;
        Ok(resp.json().await?)
    }

    pub async fn signup(
        &self,
        name: &str,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Ack> {
        let resp = self
            .http
            .post(self.url("/signup"))
            .json(&SignupRequest { name, username, email, password })
            .send()
            .await?;
        Ok(resp.json().await?)
    }

    /// One conversation round-trip. The raw response text still needs the
    /// turn formatter before display.
    pub async fn send_message(
        &self,
        text: &str,
        username: &str,
        topic: &str,
        document_content: Option<&str>,
    ) -> Result<SendResponse> {
        let resp = self
            .http
            .post(self.url("/send_text_to_flask"))
            .json(&SendRequest { text, username, topic, document_content })
            .send()
            .await?;
        Ok(resp.json().await?)
    }

    /// Push a grounding document (multipart: file + username). Only the
    /// presence of a response matters to the caller.
    pub async fn upload_document(
        &self,
        username: &str,
        file_name: &str,
        content: String,
    ) -> Result<()> {
        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::text(content).file_name(file_name.to_string()),
            )
            .text("username", username.to_string());
        self.http
            .post(self.url("/upload_text_document"))
            .multipart(form)
            .send()
            .await?;
        Ok(())
    }

    /// Bulk history snapshot for a user, newest-first as the server gives it.
    pub async fn fetch_history(&self, username: &str) -> Result<Vec<HistoryEntry>> {
        let resp = self
            .http
            .post(self.url("/chat_history"))
            .json(&UsernameRequest { username })
            .send()
            .await?;
        let body: HistoryResponse = resp.json().await?;
        if !body.success {
            return Err(anyhow!("history fetch rejected: {}", body.message));
        }
        Ok(body.chat_history.into_iter().map(HistoryEntry::from).collect())
    }

    pub async fn start_new_chat(&self, username: &str) -> Result<Ack> {
        let resp = self
            .http
            .post(self.url("/start_new_chat"))
            .json(&UsernameRequest { username })
            .send()
            .await?;
        Ok(resp.json().await?)
    }

    pub async fn delete_chat_session(&self, username: &str, topic: &str) -> Result<Ack> {
        let resp = self
            .http
            .post(self.url("/delete_chat_session"))
            .json(&DeleteRequest { username, topic })
            .send()
            .await?;
        Ok(resp.json().await?)
    }

    /// Best-effort session-end notification. The response is ignored by
    /// design — logout must never block on the backend.
    pub async fn end_session(&self) -> Result<()> {
        self.http
            .post(self.url("/end_session"))
            .json(&serde_json::json!({}))
            .send()
            .await?;
        Ok(())
    }
}
