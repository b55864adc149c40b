//! Feature index mapping.

use anyhow::{Context, Result};
use elasticsearch::indices::IndicesCreateParts;
use tracing::info;

use super::EsClient;

const FEATURES_MAPPING: &str = include_str!("../../schema/features_mapping.json");

fn mapping() -> Result<serde_json::Value> {
    serde_json::from_str(FEATURES_MAPPING).context("Failed to parse features_mapping.json")
}

/// Make sure the feature index exists. With `recreate`, an existing index
/// is dropped first and every mirrored record has to be indexed again.
pub async fn ensure_index(client: &EsClient, recreate: bool) -> Result<()> {
    if client.index_exists().await? {
        if !recreate {
            info!("Index {} exists", client.index());
            return Ok(());
        }
        client.delete_index().await?;
    }

    let response = client
        .es()
        .indices()
        .create(IndicesCreateParts::Index(client.index()))
        .body(mapping()?)
        .send()
        .await
        .context("Failed to create index")?;

    if !response.status_code().is_success() {
        anyhow::bail!("Failed to create index: {}", response.text().await?);
    }

    info!("Created index {}", client.index());
    Ok(())
}
