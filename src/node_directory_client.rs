use crate::{
    config::AppConfig,
    http_client::{handle_http_response, https_client},
};
use anyhow::{Context, Result};
use log::{error, info};
#[cfg(feature = "mock")]
use mockall::automock;
use serde::Deserialize;
use std::time::Duration;
use trait_variant::make;

/// An unverified node endpoint from the directory. May or may not speak any
/// supported protocol; only a successful probe promotes it to a usable node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidateNode {
    base_url: String,
}

impl CandidateNode {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[derive(Debug, Deserialize)]
struct NodeDescriptor {
    remote_url: String,
}

#[make(Send)]
#[cfg_attr(feature = "mock", automock)]
pub trait NodeDirectory {
    /// The current candidate list.
    ///
    /// A directory failure yields an empty list, never an error of its own:
    /// discovery then reports "no node found" and the caller decides whether
    /// to re-scan.
    async fn candidate_nodes(&self) -> Vec<CandidateNode>;
}

pub struct NodeDirectoryClient {
    client: reqwest::Client,
    directory_url: String,
}

impl NodeDirectoryClient {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new() -> Result<Self> {
        Self::with_url(&AppConfig::get().directory.url)
    }

    pub fn with_url(directory_url: &str) -> Result<Self> {
        Ok(Self {
            client: https_client(Self::REQUEST_TIMEOUT)?,
            directory_url: directory_url.to_owned(),
        })
    }

    async fn fetch(&self) -> Result<Vec<CandidateNode>> {
        info!("GET {}", self.directory_url);

        let res = self
            .client
            .get(&self.directory_url)
            .send()
            .await
            .context(format!(
                "failed to send GET request to {}",
                self.directory_url
            ))?;

        let body = handle_http_response(res, "node directory request").await?;

        let descriptors: Vec<NodeDescriptor> =
            serde_json::from_str(&body).context("failed to parse node directory")?;

        Ok(descriptors
            .into_iter()
            .map(|descriptor| CandidateNode::new(descriptor.remote_url))
            .collect())
    }
}

impl NodeDirectory for NodeDirectoryClient {
    async fn candidate_nodes(&self) -> Vec<CandidateNode> {
        match self.fetch().await {
            Ok(candidates) => candidates,
            Err(e) => {
                error!("failed to fetch node directory: {e:#}");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_node_strips_trailing_slashes() {
        let candidate = CandidateNode::new("https://node-7.roamsim.app/");
        assert_eq!(candidate.base_url(), "https://node-7.roamsim.app");

        let untouched = CandidateNode::new("https://node-7.roamsim.app");
        assert_eq!(untouched.base_url(), "https://node-7.roamsim.app");
    }
}
