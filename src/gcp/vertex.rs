//! Vertex AI Model Registry client (REST, v1).

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{AccessTokenProvider, AuthError};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_MAX_POLLS: u32 = 120;

#[derive(Error, Debug)]
pub enum VertexError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Vertex AI returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Operation {name} failed: {message}")]
    OperationFailed { name: String, message: String },

    #[error("Operation {0} did not finish in time")]
    OperationTimeout(String),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// Registered model as returned by `models.get`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub artifact_uri: String,
    #[serde(default)]
    pub version_id: Option<String>,
}

impl Model {
    /// Trailing id of `projects/../models/{id}`.
    pub fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

/// Fields of a `models:upload` call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelUploadRequest {
    pub display_name: String,
    pub description: String,
    pub artifact_uri: String,
    pub serving_container_image_uri: String,
    pub labels: std::collections::BTreeMap<String, String>,
}

impl ModelUploadRequest {
    fn body(&self) -> serde_json::Value {
        serde_json::json!({
            "model": {
                "displayName": self.display_name,
                "description": self.description,
                "artifactUri": self.artifact_uri,
                "containerSpec": { "imageUri": self.serving_container_image_uri },
                "labels": self.labels,
            }
        })
    }
}

#[derive(Deserialize)]
struct Operation {
    name: String,
    #[serde(default)]
    done: bool,
    error: Option<OperationStatus>,
    response: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct OperationStatus {
    #[serde(default)]
    message: String,
}

pub struct VertexClient {
    project: String,
    location: String,
    base_url: String,
    http: reqwest::blocking::Client,
    auth: Arc<dyn AccessTokenProvider>,
    poll_interval: Duration,
    max_polls: u32,
}

impl VertexClient {
    pub fn new(project: &str, location: &str, auth: Arc<dyn AccessTokenProvider>) -> Self {
        Self {
            project: project.to_string(),
            location: location.to_string(),
            base_url: format!("https://{location}-aiplatform.googleapis.com/v1"),
            http: reqwest::blocking::Client::new(),
            auth,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }

    fn parent(&self) -> String {
        format!("projects/{}/locations/{}", self.project, self.location)
    }

    /// Full resource name. Bare ids are placed under this project and location.
    pub fn model_resource_name(&self, model: &str) -> String {
        if model.starts_with("projects/") {
            model.to_string()
        } else {
            format!("{}/models/{model}", self.parent())
        }
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, resource: &str) -> Result<T, VertexError> {
        let response = self
            .http
            .get(format!("{}/{resource}", self.base_url))
            .bearer_auth(self.auth.access_token()?)
            .send()?;
        Ok(check(response)?.json()?)
    }

    pub fn get_model(&self, model: &str) -> Result<Model, VertexError> {
        self.get_json(&self.model_resource_name(model))
    }

    /// Upload a model version and wait for the long-running operation.
    ///
    /// Returns the resource name of the registered model.
    pub fn upload_model(&self, request: &ModelUploadRequest) -> Result<String, VertexError> {
        let response = self
            .http
            .post(format!("{}/{}/models:upload", self.base_url, self.parent()))
            .bearer_auth(self.auth.access_token()?)
            .json(&request.body())
            .send()?;
        let mut operation: Operation = check(response)?.json()?;
        tracing::info!(operation = %operation.name, "Model upload started");

        let mut polls = 0;
        while !operation.done {
            if polls >= self.max_polls {
                return Err(VertexError::OperationTimeout(operation.name));
            }
            std::thread::sleep(self.poll_interval);
            polls += 1;
            operation = self.get_json(&operation.name)?;
        }

        if let Some(status) = operation.error {
            return Err(VertexError::OperationFailed {
                name: operation.name,
                message: status.message,
            });
        }

        operation
            .response
            .as_ref()
            .and_then(|r| r.get("model"))
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .ok_or_else(|| VertexError::UnexpectedResponse(format!("operation {} has no model", operation.name)))
    }
}

fn check(response: reqwest::blocking::Response) -> Result<reqwest::blocking::Response, VertexError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(VertexError::Api {
        status: status.as_u16(),
        body,
    })
}
