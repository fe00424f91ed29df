//! Remote feed ingestion: pull a facts JSON array into the local store and
//! optionally prefetch notification images with bounded concurrency.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

use factcast_core::{run_bounded, ContentStore, Fact};

use crate::config::load_config;
use crate::state::{facts_path, images_dir};
use crate::store_json::JsonStore;

#[derive(Debug, Deserialize)]
struct RemoteFact {
    id: String,
    #[serde(default)]
    locale: Option<String>,
    text: String,
    #[serde(default)]
    image_url: Option<String>,
}

pub async fn run_fetch(url: Option<String>, prefetch_images: bool) -> Result<()> {
    let cfg = load_config()?;
    let url = url.unwrap_or_else(|| cfg.feed.url.clone());

    let client = reqwest::Client::new();
    let remote: Vec<RemoteFact> = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("fetch {url}"))?
        .error_for_status()
        .with_context(|| format!("fetch {url}"))?
        .json()
        .await
        .context("parse facts feed")?;

    let store = JsonStore::load(facts_path()?)?;
    let existing: HashSet<String> = store.all().await?.into_iter().map(|f| f.id).collect();

    let mut added = 0;
    let mut image_urls = Vec::new();
    let total = remote.len();
    for rf in remote {
        if existing.contains(&rf.id) {
            continue;
        }
        let mut fact = Fact::new(
            rf.id,
            rf.locale.unwrap_or_else(|| cfg.profile.locale.clone()),
            rf.text,
        );
        if let Some(img) = rf.image_url {
            fact = fact.with_image(&img);
            image_urls.push((fact.id.clone(), img));
        }
        store.insert(fact).await?;
        added += 1;
    }
    println!("Fetched {total} fact(s) from {url} ({added} new)");

    if prefetch_images && !image_urls.is_empty() {
        let dir = images_dir()?;
        let n = prefetch(&client, &dir, image_urls, cfg.feed.image_concurrency).await?;
        println!("Prefetched {n} image(s) into {}", dir.display());
    }
    Ok(())
}

/// Download images `concurrency` at a time. A single bad URL is logged and
/// skipped rather than failing the whole batch.
async fn prefetch(
    client: &reqwest::Client,
    dir: &Path,
    urls: Vec<(String, String)>,
    concurrency: usize,
) -> Result<usize> {
    let results = run_bounded(urls, concurrency, |(id, url)| {
        let client = client.clone();
        let target = dir.join(format!("{id}.img"));
        async move {
            if target.exists() {
                return Ok(false);
            }
            match download(&client, &url, &target).await {
                Ok(()) => Ok(true),
                Err(e) => {
                    warn!(url = %url, error = %e, "image prefetch failed");
                    Ok(false)
                }
            }
        }
    })
    .await?;
    Ok(results.into_iter().filter(|fetched| *fetched).count())
}

async fn download(client: &reqwest::Client, url: &str, target: &Path) -> Result<()> {
    let bytes = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;
    std::fs::write(target, &bytes).with_context(|| format!("write {}", target.display()))?;
    Ok(())
}
