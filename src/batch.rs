//! Script-mode batch publisher
//!
//! Reads resource descriptions from a JSON file, skips titles already
//! recorded as published, and runs generate, poster lookup and publish for
//! each one. A failing resource is logged and the batch moves on.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;

use crate::generation::Orchestrator;
use crate::media::MediaResolver;
use crate::model::ResourceDescription;
use crate::publisher::{PublishedPostRef, Publisher};

/// Parse `resources.json`: either an array of descriptions or a single one
pub fn parse_resources(json: &str) -> anyhow::Result<Vec<ResourceDescription>> {
    let value: Value = serde_json::from_str(json).context("resources file is not valid JSON")?;
    let resources = match value {
        Value::Array(items) => items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<ResourceDescription>, _>>()?,
        single => vec![serde_json::from_value(single)?],
    };
    Ok(resources)
}

/// Titles recorded in the processed file, one per line
pub async fn load_processed_titles(path: &Path) -> anyhow::Result<HashSet<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!("No processed titles at {}, publishing everything", path.display());
            Ok(HashSet::new())
        }
        Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
    }
}

pub async fn mark_processed(path: &Path, title: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(format!("{}\n", title).as_bytes()).await?;
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
    pub title: String,
    pub provider: Option<&'static str>,
    pub post: Option<PublishedPostRef>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub skipped: usize,
    pub items: Vec<BatchItem>,
}

impl BatchReport {
    pub fn published(&self) -> usize {
        self.items.iter().filter(|i| i.post.is_some()).count()
    }

    pub fn failed(&self) -> usize {
        self.items.iter().filter(|i| i.error.is_some()).count()
    }
}

pub struct BatchPublisher {
    orchestrator: Orchestrator,
    resolver: MediaResolver,
    publisher: Publisher,
    processed_path: PathBuf,
}

impl BatchPublisher {
    pub fn new(
        orchestrator: Orchestrator,
        resolver: MediaResolver,
        publisher: Publisher,
        processed_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            orchestrator,
            resolver,
            publisher,
            processed_path: processed_path.into(),
        }
    }

    pub async fn run(&self, resources: Vec<ResourceDescription>) -> anyhow::Result<BatchReport> {
        let processed = load_processed_titles(&self.processed_path).await?;
        let mut report = BatchReport {
            total: resources.len(),
            ..Default::default()
        };

        for description in resources {
            if processed.contains(description.title.trim()) {
                report.skipped += 1;
                continue;
            }

            tracing::info!("Processing resource: {}", description.title);
            let item = match self.publish_one(&description).await {
                Ok((provider, post)) => {
                    if let Err(e) = mark_processed(&self.processed_path, description.title.trim()).await {
                        tracing::warn!("Could not record \"{}\" as published: {}", description.title, e);
                    }
                    tracing::info!("Published \"{}\" as {}", description.title, post.slug);
                    BatchItem {
                        title: description.title.clone(),
                        provider: Some(provider),
                        post: Some(post),
                        error: None,
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to publish \"{}\": {:#}", description.title, e);
                    BatchItem {
                        title: description.title.clone(),
                        provider: None,
                        post: None,
                        error: Some(format!("{:#}", e)),
                    }
                }
            };
            report.items.push(item);
        }

        tracing::info!(
            "Batch finished: {} total, {} skipped, {} published, {} failed",
            report.total,
            report.skipped,
            report.published(),
            report.failed()
        );
        Ok(report)
    }

    async fn publish_one(
        &self,
        description: &ResourceDescription,
    ) -> anyhow::Result<(&'static str, PublishedPostRef)> {
        let resource = description.sanitize()?;
        let generation = self.orchestrator.run(&resource).await?;
        let poster = self
            .resolver
            .resolve_poster(&resource.title, &resource.category, &resource.tags)
            .await;
        let post = self
            .publisher
            .publish(&generation.content, &resource, poster.as_deref())
            .await?;
        Ok((generation.provider, post))
    }
}
