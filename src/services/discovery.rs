use crate::{
    config::AppConfig,
    http_client::{handle_http_response, https_client},
    node_directory_client::{CandidateNode, NodeDirectory},
};
use anyhow::{Context, Result, bail};
use log::{debug, info};
use serde::Deserialize;
use std::time::Duration;

/// Supported tunnel protocols, in probe priority order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeProtocol {
    WireGuard,
    OpenVpn,
}

/// WireGuard peer configuration as served by a node.
#[derive(Clone, Debug, Deserialize)]
pub struct WireGuardNodeConfig {
    pub endpoint: String,
    pub public_key: String,
    pub address: String,
    #[serde(default)]
    pub dns: Option<String>,
    #[serde(default)]
    pub allowed_ips: Option<String>,
}

/// Protocol-specific connection payload of a discovered node: structured for
/// WireGuard, the raw profile text for OpenVPN.
#[derive(Clone, Debug)]
pub enum NodeConfig {
    WireGuard(WireGuardNodeConfig),
    OpenVpn(String),
}

/// A node that answered one of the protocol probes.
///
/// A plain value owned by the caller; it holds no reference back to the
/// scanner that produced it.
#[derive(Clone, Debug)]
pub struct DiscoveredNode {
    pub base_url: String,
    pub config: NodeConfig,
}

impl DiscoveredNode {
    pub fn protocol(&self) -> NodeProtocol {
        match self.config {
            NodeConfig::WireGuard(_) => NodeProtocol::WireGuard,
            NodeConfig::OpenVpn(_) => NodeProtocol::OpenVpn,
        }
    }
}

/// Scans candidate nodes for one that speaks a supported protocol.
///
/// Candidates are tried in list order; per node, WireGuard is probed before
/// OpenVPN and the first usable answer wins. Probe failures are routine and
/// swallowed: a node that fails both probes is skipped. Every probe is
/// bounded by the configured timeout so a hung node cannot stall the scan.
pub struct NodeDiscoveryScanner {
    client: reqwest::Client,
}

impl NodeDiscoveryScanner {
    const WIREGUARD_PATH: &str = "wireguard";
    const OPENVPN_PATH: &str = "openvpn";

    pub fn new() -> Result<Self> {
        Self::with_probe_timeout(AppConfig::get().discovery.probe_timeout)
    }

    pub fn with_probe_timeout(probe_timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: https_client(probe_timeout)?,
        })
    }

    /// Find the first candidate that answers a protocol probe.
    ///
    /// Fails with "no usable node" once all candidates are exhausted; the
    /// caller decides whether to re-scan.
    pub async fn discover(&self, candidates: &[CandidateNode]) -> Result<DiscoveredNode> {
        for candidate in candidates {
            let base_url = candidate.base_url();

            match self.probe_wireguard(base_url).await {
                Ok(config) => {
                    info!("selected node {base_url} via WireGuard");
                    return Ok(DiscoveredNode {
                        base_url: base_url.to_owned(),
                        config: NodeConfig::WireGuard(config),
                    });
                }
                Err(e) => debug!("wireguard probe for {base_url} failed: {e:#}"),
            }

            match self.probe_openvpn(base_url).await {
                Ok(config) => {
                    info!("selected node {base_url} via OpenVPN");
                    return Ok(DiscoveredNode {
                        base_url: base_url.to_owned(),
                        config: NodeConfig::OpenVpn(config),
                    });
                }
                Err(e) => debug!("openvpn probe for {base_url} failed: {e:#}"),
            }
        }

        bail!("no usable node found among {} candidates", candidates.len())
    }

    /// Fetch the candidate list from the directory and scan it.
    ///
    /// A directory failure degrades to an empty candidate list, so the
    /// outcome is the same "no usable node" error as an exhausted scan.
    pub async fn discover_from_directory<D>(&self, directory: &D) -> Result<DiscoveredNode>
    where
        D: NodeDirectory,
    {
        let candidates = directory.candidate_nodes().await;
        self.discover(&candidates).await
    }

    async fn probe_wireguard(&self, base_url: &str) -> Result<WireGuardNodeConfig> {
        let body = self.probe(base_url, Self::WIREGUARD_PATH).await?;
        serde_json::from_str(&body).context("failed to parse wireguard config")
    }

    async fn probe_openvpn(&self, base_url: &str) -> Result<String> {
        self.probe(base_url, Self::OPENVPN_PATH).await
    }

    async fn probe(&self, base_url: &str, path: &str) -> Result<String> {
        let url = format!("{base_url}/{path}");
        debug!("GET {url}");

        let res = self
            .client
            .get(&url)
            .send()
            .await
            .context(format!("failed to send GET request to {url}"))?;

        handle_http_response(res, &format!("GET {url}")).await
    }
}
