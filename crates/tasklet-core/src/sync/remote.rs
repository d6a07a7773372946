//! Remote todo list client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Task, TaskId};
use crate::util::{compact_text, is_http_url, normalize_text_option};

/// Endpoint serving the initial task list
pub const DEFAULT_TODOS_URL: &str = "https://dummyjson.com/todos";

/// A task as served by the remote endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTodo {
    pub id: i64,
    pub todo: String,
    pub completed: bool,
    pub user_id: i64,
}

impl RemoteTodo {
    /// Convert into a local task dated `date` with an empty description
    pub fn into_task(self, date: i64) -> Task {
        Task {
            id: TaskId::new(self.id),
            name: self.todo,
            description: String::new(),
            completed: self.completed,
            date,
        }
    }
}

/// Response envelope of the remote endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTodoList {
    pub todos: Vec<RemoteTodo>,
    pub total: i64,
    pub skip: i64,
    pub limit: i64,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid todo source configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Todo request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Todo endpoint returned {0}")]
    Status(String),
    #[error("Invalid todo payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Todo request was cancelled")]
    Cancelled,
}

pub type FetchResult<T> = Result<T, FetchError>;

/// Where the initial task list comes from
#[async_trait]
pub trait TodoSource: Send + Sync {
    /// Fetch the whole remote list in one request
    async fn fetch(&self) -> FetchResult<RemoteTodoList>;
}

/// Unauthenticated HTTP GET source
#[derive(Clone)]
pub struct HttpTodoSource {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpTodoSource {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> FetchResult<Self> {
        let endpoint = normalize_endpoint(endpoint.into())?;
        Ok(Self {
            endpoint,
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TodoSource for HttpTodoSource {
    async fn fetch(&self) -> FetchResult<RemoteTodoList> {
        tracing::debug!("Fetching remote todos from {}", self.endpoint);

        let response = self
            .client
            .get(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status(describe_status(status, &body)));
        }

        let body = response.text().await?;
        parse_todo_list(&body)
    }
}

/// Parse the remote envelope from a raw JSON payload.
pub fn parse_todo_list(payload: &str) -> FetchResult<RemoteTodoList> {
    Ok(serde_json::from_str(payload)?)
}

fn describe_status(status: StatusCode, body: &str) -> String {
    let body = compact_text(body);
    if body.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("HTTP {}: {}", status.as_u16(), body)
    }
}

fn normalize_endpoint(raw: String) -> FetchResult<String> {
    let endpoint = normalize_text_option(Some(raw)).ok_or_else(|| {
        FetchError::InvalidConfiguration("endpoint must not be empty".to_string())
    })?;
    if is_http_url(&endpoint) {
        Ok(endpoint.trim_end_matches('/').to_string())
    } else {
        Err(FetchError::InvalidConfiguration(
            "endpoint must include http:// or https://".to_string(),
        ))
    }
}
