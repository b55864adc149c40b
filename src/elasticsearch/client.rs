use anyhow::{Context, Result};
use elasticsearch::{
    cluster::ClusterHealthParts,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesDeleteParts, IndicesExistsParts, IndicesRefreshParts},
    CountParts, Elasticsearch,
};
use tracing::{info, warn};
use url::Url;

use crate::config::SearchConfig;

/// Handle on the feature index. Cheap to clone; clones share the transport.
#[derive(Clone)]
pub struct EsClient {
    es: Elasticsearch,
    index: String,
}

impl EsClient {
    /// Build a client for `search.index` at `search.es_url`. No request is
    /// sent until the first call.
    pub fn connect(search: &SearchConfig) -> Result<Self> {
        let url = Url::parse(&search.es_url)
            .with_context(|| format!("Invalid Elasticsearch URL {}", search.es_url))?;
        let transport = TransportBuilder::new(SingleNodeConnectionPool::new(url))
            .disable_proxy()
            .build()
            .context("Failed to build Elasticsearch transport")?;

        Ok(Self {
            es: Elasticsearch::new(transport),
            index: search.index.clone(),
        })
    }

    pub fn es(&self) -> &Elasticsearch {
        &self.es
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    /// A yellow cluster is usable (single node, unassigned replicas); red is not.
    pub async fn health_check(&self) -> Result<bool> {
        let response = self
            .es
            .cluster()
            .health(ClusterHealthParts::None)
            .send()
            .await
            .context("Cluster health request failed")?;
        if !response.status_code().is_success() {
            return Ok(false);
        }

        let body = response.json::<serde_json::Value>().await?;
        let status = body["status"].as_str().unwrap_or("red");
        if status != "green" {
            warn!("Cluster status is {}", status);
        }
        Ok(status != "red")
    }

    pub async fn index_exists(&self) -> Result<bool> {
        let response = self
            .es
            .indices()
            .exists(IndicesExistsParts::Index(&[&self.index]))
            .send()
            .await?;
        Ok(response.status_code().is_success())
    }

    pub async fn delete_index(&self) -> Result<()> {
        info!("Deleting index {}", self.index);
        let response = self
            .es
            .indices()
            .delete(IndicesDeleteParts::Index(&[&self.index]))
            .send()
            .await
            .context("Failed to delete index")?;
        if !response.status_code().is_success() {
            anyhow::bail!("Failed to delete index: {}", response.text().await?);
        }
        Ok(())
    }

    /// Make everything indexed so far visible to candidate queries.
    pub async fn refresh(&self) -> Result<()> {
        let response = self
            .es
            .indices()
            .refresh(IndicesRefreshParts::Index(&[&self.index]))
            .send()
            .await
            .context("Refresh request failed")?;

        if !response.status_code().is_success() {
            anyhow::bail!("Failed to refresh index: {}", response.text().await?);
        }
        info!("Refreshed index {}", self.index);
        Ok(())
    }

    pub async fn doc_count(&self) -> Result<u64> {
        let response = self
            .es
            .count(CountParts::Index(&[&self.index]))
            .send()
            .await?;

        let body = response.json::<serde_json::Value>().await?;
        Ok(body["count"].as_u64().unwrap_or(0))
    }
}
