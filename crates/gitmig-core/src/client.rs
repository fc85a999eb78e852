//! Typed clients for the GitLab v4 REST API.
//!
//! One client per instance. Every request carries the instance's
//! `PRIVATE-TOKEN` header and a generous per-request timeout; the export
//! polling loop relies on that timeout rather than any overall deadline.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::config::{InstanceConfig, HTTP_TIMEOUT_SECS};
use crate::domain::error::{MigrateError, Result};
use crate::domain::target::{ImportDestination, MigrationTarget, TargetKind};
use crate::pipeline::ARCHIVE_FILENAME;

/// Percent-encode a single URL path component.
///
/// GitLab accepts either a numeric id or a full path in the id position, but
/// a path must travel as one component with its slashes encoded as `%2F`.
pub fn encode_path_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn build_http_client(config: &InstanceConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .danger_accept_invalid_certs(!config.tls_verify)
        .build()?;
    Ok(client)
}

#[derive(Debug, Deserialize)]
struct ProjectInfo {
    path_with_namespace: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct GroupInfo {
    id: u64,
    full_path: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ExportStatus {
    export_status: String,
}

/// Client for the instance a migration exports from.
pub struct SourceClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl SourceClient {
    pub fn new(config: &InstanceConfig) -> Result<Self> {
        Ok(SourceClient {
            http: build_http_client(config)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn url(&self, kind: TargetKind, identifier: &str, suffix: &str) -> String {
        let resource = match kind {
            TargetKind::Project => "projects",
            TargetKind::Group => "groups",
        };
        format!(
            "{}/api/v4/{resource}/{}{suffix}",
            self.base_url,
            encode_path_component(identifier)
        )
    }

    /// Resolve the canonical path and display name of a source resource.
    ///
    /// Called exactly once per target; the result is carried for the rest of
    /// the run.
    pub async fn resolve(&self, kind: TargetKind, identifier: &str) -> Result<MigrationTarget> {
        let url = self.url(kind, identifier, "");
        let response = self
            .http
            .get(&url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(MigrateError::Resolution {
                target: identifier.to_string(),
                reason: format!("{} returned {}", url, response.status()),
            });
        }
        let (resolved_path, resolved_name) = match kind {
            TargetKind::Project => {
                let info: ProjectInfo = response.json().await?;
                (info.path_with_namespace, info.name)
            }
            TargetKind::Group => {
                let info: GroupInfo = response.json().await?;
                (info.full_path, info.name)
            }
        };
        debug!(%identifier, %resolved_path, "resolved source target");
        Ok(MigrationTarget {
            identifier: identifier.to_string(),
            resolved_path,
            resolved_name,
            kind,
        })
    }

    /// Start the asynchronous export job. One-shot; never retried.
    pub async fn trigger_export(&self, target: &MigrationTarget) -> Result<()> {
        let url = self.url(target.kind, &target.identifier, "/export");
        let response = self
            .http
            .post(&url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(MigrateError::Trigger {
                target: target.identifier.clone(),
                reason: format!("{} returned {}", url, response.status()),
            });
        }
        Ok(())
    }

    /// Query the structured export status (project exports only).
    pub async fn export_status(&self, target: &MigrationTarget) -> Result<String> {
        let url = self.url(target.kind, &target.identifier, "/export");
        let response = self
            .http
            .get(&url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(MigrateError::Download {
                target: target.identifier.clone(),
                reason: format!("status query {} returned {}", url, response.status()),
            });
        }
        let status: ExportStatus = response.json().await?;
        Ok(status.export_status)
    }

    /// Download the export payload after the job reported completion.
    pub async fn download_export(&self, target: &MigrationTarget) -> Result<Vec<u8>> {
        let url = self.url(target.kind, &target.identifier, "/export/download");
        let response = self
            .http
            .get(&url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(MigrateError::Download {
                target: target.identifier.clone(),
                reason: format!("{} returned {}", url, response.status()),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }

    /// Attempt the export download before completion is known.
    ///
    /// Group exports have no status endpoint; 404 means the job has not
    /// finished and the caller should retry. Any other failure status is
    /// genuine and fatal rather than silently retried.
    pub async fn try_download_export(&self, target: &MigrationTarget) -> Result<Option<Vec<u8>>> {
        let url = self.url(target.kind, &target.identifier, "/export/download");
        let response = self
            .http
            .get(&url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await?;
        match response.status() {
            status if status.is_success() => Ok(Some(response.bytes().await?.to_vec())),
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(MigrateError::Download {
                target: target.identifier.clone(),
                reason: format!("{} returned {}", url, status),
            }),
        }
    }
}

/// Client for the instance a migration imports into.
pub struct DestinationClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl DestinationClient {
    pub fn new(config: &InstanceConfig) -> Result<Self> {
        Ok(DestinationClient {
            http: build_http_client(config)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    /// Look up the numeric id of a group by its full path.
    pub async fn group_id(&self, path: &str) -> Result<u64> {
        let url = format!(
            "{}/api/v4/groups/{}",
            self.base_url,
            encode_path_component(path)
        );
        let response = self
            .http
            .get(&url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(MigrateError::Import {
                path: path.to_string(),
                reason: format!("parent lookup {} returned {}", url, response.status()),
            });
        }
        let info: GroupInfo = response.json().await?;
        Ok(info.id)
    }

    /// Upload a project export archive.
    pub async fn import_project(
        &self,
        dest: &ImportDestination,
        archive_bytes: Vec<u8>,
    ) -> Result<()> {
        let part = reqwest::multipart::Part::bytes(archive_bytes)
            .file_name(ARCHIVE_FILENAME)
            .mime_str("application/gzip")?;
        let form = reqwest::multipart::Form::new()
            .text("namespace", dest.namespace_path.clone())
            .text("path", dest.leaf_path.clone())
            .part("file", part);
        self.post_import("projects", dest, form).await
    }

    /// Upload a group export archive, attaching `parent_id` for subgroups.
    pub async fn import_group(
        &self,
        dest: &ImportDestination,
        archive_bytes: Vec<u8>,
    ) -> Result<()> {
        let part = reqwest::multipart::Part::bytes(archive_bytes)
            .file_name(ARCHIVE_FILENAME)
            .mime_str("application/gzip")?;
        let mut form = reqwest::multipart::Form::new()
            .text("name", dest.display_name.clone())
            .text("path", dest.leaf_path.clone())
            .part("file", part);
        if let Some(parent_id) = dest.parent_group_id {
            form = form.text("parent_id", parent_id.to_string());
        }
        self.post_import("groups", dest, form).await
    }

    async fn post_import(
        &self,
        resource: &str,
        dest: &ImportDestination,
        form: reqwest::multipart::Form,
    ) -> Result<()> {
        let url = format!("{}/api/v4/{resource}/import", self.base_url);
        let response = self
            .http
            .post(&url)
            .header("PRIVATE-TOKEN", &self.token)
            .multipart(form)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(MigrateError::Import {
                path: dest.leaf_path.clone(),
                reason: format!("{} returned {}", url, response.status()),
            });
        }
        Ok(())
    }
}
