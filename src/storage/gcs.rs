//! Cloud Storage backend over the JSON API.

use std::sync::Arc;

use reqwest::Url;
use serde::Deserialize;

use super::{BackendKind, BlobStore, StorageError};
use crate::gcp::AccessTokenProvider;

pub const DEFAULT_BASE_URL: &str = "https://storage.googleapis.com";

pub struct GcsStore {
    bucket: String,
    base_url: String,
    http: reqwest::blocking::Client,
    auth: Arc<dyn AccessTokenProvider>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectList {
    #[serde(default)]
    items: Vec<ObjectItem>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct ObjectItem {
    name: String,
}

impl GcsStore {
    pub fn new(bucket: impl Into<String>, auth: Arc<dyn AccessTokenProvider>) -> Self {
        Self {
            bucket: bucket.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            http: reqwest::blocking::Client::new(),
            auth,
        }
    }

    /// Point at an emulator or mock. A bare `host:port` is taken as plain HTTP.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/');
        self.base_url = if base_url.contains("://") {
            base_url.to_string()
        } else {
            format!("http://{base_url}")
        };
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// `{base}/{segments...}` with each segment percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url, StorageError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|_| StorageError::InvalidUri(self.base_url.clone()))?;
        url.path_segments_mut()
            .map_err(|_| StorageError::InvalidUri(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn check(response: reqwest::blocking::Response) -> Result<reqwest::blocking::Response, StorageError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(StorageError::Api {
            status: status.as_u16(),
            body,
        })
    }
}

impl BlobStore for GcsStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Cloud
    }

    fn write_blob(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<(), StorageError> {
        let mut url = self.url(&["upload", "storage", "v1", "b", &self.bucket, "o"])?;
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", key);

        let response = self
            .http
            .post(url)
            .bearer_auth(self.auth.access_token()?)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes.to_vec())
            .send()?;
        Self::check(response)?;
        Ok(())
    }

    fn read_blob(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let mut url = self.url(&["storage", "v1", "b", &self.bucket, "o", key])?;
        url.query_pairs_mut().append_pair("alt", "media");

        let response = self
            .http
            .get(url)
            .bearer_auth(self.auth.access_token()?)
            .send()?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(key.to_string()));
        }
        Ok(Self::check(response)?.bytes()?.to_vec())
    }

    fn list_blobs(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = self.url(&["storage", "v1", "b", &self.bucket, "o"])?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("prefix", prefix).append_pair("fields", "items(name),nextPageToken");
                if let Some(token) = &page_token {
                    query.append_pair("pageToken", token);
                }
            }

            let response = self
                .http
                .get(url)
                .bearer_auth(self.auth.access_token()?)
                .send()?;
            let page: ObjectList = Self::check(response)?.json()?;
            names.extend(page.items.into_iter().map(|item| item.name));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        names.sort();
        Ok(names)
    }

    fn uri_for(&self, key: &str) -> String {
        format!("gs://{}/{key}", self.bucket)
    }
}
