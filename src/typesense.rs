//! Typesense implementation of [`SearchEngine`].
//!
//! Thin client over the hosted document API: collection bootstrap,
//! single and bulk upserts, deletes, filter-scoped deletes, search, and
//! the `/health` probe. Every request carries the API key header and the
//! configured connect/request timeouts.
//!
//! Status classification:
//! - 401/403 → [`EngineError::Auth`]
//! - 429 and 5xx → [`EngineError::Transient`]
//! - other 4xx → [`EngineError::Request`]
//! - timeouts and connection failures → [`EngineError::Transient`]
//!
//! No retries happen here — a timed-out call is a failure and retry
//! policy belongs to the caller.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::config::EngineConfig;
use crate::engine::{Deleted, EngineError, ImportStatus, SearchEngine};
use crate::models::SearchDocument;
use crate::query::QuerySpec;
use crate::schema::collection_schema;

const API_KEY_HEADER: &str = "X-TYPESENSE-API-KEY";

pub struct TypesenseEngine {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    collection: String,
}

impl TypesenseEngine {
    /// Build a client from configuration.
    ///
    /// The API key is read from the environment variable named in the
    /// config. A missing key or an unbuildable HTTP client is a
    /// configuration error — fatal at startup, not caught per call.
    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            EngineError::Config(format!(
                "{} environment variable not set",
                config.api_key_env
            ))
        })?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| EngineError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key,
            collection: config.collection.clone(),
        })
    }

    fn documents_url(&self, suffix: &str) -> String {
        format!(
            "{}/collections/{}/documents{}",
            self.base_url, self.collection, suffix
        )
    }
}

fn transport_error(e: reqwest::Error) -> EngineError {
    if e.is_decode() {
        EngineError::Response(e.to_string())
    } else {
        // Timeouts, connect failures, and anything else on the wire
        EngineError::Transient(e.to_string())
    }
}

async fn classify_status(status: StatusCode, response: reqwest::Response) -> EngineError {
    let body = response.text().await.unwrap_or_default();
    let message = format!("engine returned {}: {}", status, body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => EngineError::Auth(message),
        StatusCode::TOO_MANY_REQUESTS => EngineError::Transient(message),
        s if s.is_server_error() => EngineError::Transient(message),
        _ => EngineError::Request(message),
    }
}

#[async_trait]
impl SearchEngine for TypesenseEngine {
    async fn ensure_collection(&self) -> Result<(), EngineError> {
        let response = self
            .http
            .post(format!("{}/collections", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&collection_schema(&self.collection))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        // 409 means the collection already exists — creation is idempotent
        if status.is_success() || status == StatusCode::CONFLICT {
            Ok(())
        } else {
            Err(classify_status(status, response).await)
        }
    }

    async fn upsert(&self, doc: &SearchDocument) -> Result<(), EngineError> {
        let response = self
            .http
            .post(self.documents_url("?action=upsert"))
            .header(API_KEY_HEADER, &self.api_key)
            .json(doc)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(classify_status(status, response).await)
        }
    }

    async fn import(&self, docs: &[SearchDocument]) -> Result<Vec<ImportStatus>, EngineError> {
        if docs.is_empty() {
            return Ok(Vec::new());
        }

        let mut body = String::new();
        for doc in docs {
            let line = serde_json::to_string(doc)
                .map_err(|e| EngineError::Request(format!("unserializable document: {}", e)))?;
            body.push_str(&line);
            body.push('\n');
        }

        let response = self
            .http
            .post(self.documents_url("/import?action=upsert"))
            .header(API_KEY_HEADER, &self.api_key)
            .header("Content-Type", "text/plain")
            .body(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, response).await);
        }

        // One JSON line per input document, in input order
        let text = response.text().await.map_err(transport_error)?;
        let mut lines = text.lines();
        let statuses = docs
            .iter()
            .map(|doc| match lines.next() {
                Some(line) => match serde_json::from_str::<serde_json::Value>(line) {
                    Ok(entry) => {
                        let success =
                            entry.get("success").and_then(|s| s.as_bool()).unwrap_or(false);
                        ImportStatus {
                            id: doc.id.clone(),
                            success,
                            error: if success {
                                None
                            } else {
                                Some(
                                    entry
                                        .get("error")
                                        .and_then(|e| e.as_str())
                                        .unwrap_or("import rejected")
                                        .to_string(),
                                )
                            },
                        }
                    }
                    Err(_) => ImportStatus {
                        id: doc.id.clone(),
                        success: false,
                        error: Some(format!("unparseable import status: {}", line)),
                    },
                },
                None => ImportStatus {
                    id: doc.id.clone(),
                    success: false,
                    error: Some("no import status returned".to_string()),
                },
            })
            .collect();

        Ok(statuses)
    }

    async fn delete(&self, id: &str) -> Result<Deleted, EngineError> {
        let response = self
            .http
            .delete(self.documents_url(&format!("/{}", id)))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_success() {
            Ok(Deleted::Removed)
        } else if status == StatusCode::NOT_FOUND {
            Ok(Deleted::Missing)
        } else {
            Err(classify_status(status, response).await)
        }
    }

    async fn delete_by_filter(&self, filter_by: &str) -> Result<u64, EngineError> {
        let response = self
            .http
            .delete(self.documents_url(""))
            .header(API_KEY_HEADER, &self.api_key)
            .query(&[("filter_by", filter_by)])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, response).await);
        }

        let json: serde_json::Value = response.json().await.map_err(transport_error)?;
        Ok(json.get("num_deleted").and_then(|n| n.as_u64()).unwrap_or(0))
    }

    async fn search(&self, spec: &QuerySpec) -> Result<serde_json::Value, EngineError> {
        let response = self
            .http
            .get(self.documents_url("/search"))
            .header(API_KEY_HEADER, &self.api_key)
            .query(&[
                ("q", spec.q.as_str()),
                ("query_by", spec.query_by.as_str()),
                ("filter_by", spec.filter_by.as_str()),
                ("sort_by", spec.sort_by.as_str()),
                ("facet_by", spec.facet_by.as_str()),
                ("highlight_full_fields", spec.highlight_fields.as_str()),
            ])
            .query(&[
                ("max_facet_values", spec.max_facet_values),
                ("page", spec.page),
                ("per_page", spec.per_page),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, response).await);
        }

        response.json().await.map_err(transport_error)
    }

    async fn health(&self) -> Result<bool, EngineError> {
        let response = self
            .http
            .get(format!("{}/health", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Ok(false);
        }
        let json: serde_json::Value = response.json().await.map_err(transport_error)?;
        Ok(json.get("ok").and_then(|v| v.as_bool()).unwrap_or(false))
    }
}
