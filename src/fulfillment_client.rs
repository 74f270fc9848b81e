use crate::{
    config::AppConfig,
    http_client::{handle_http_response, https_client},
};
use anyhow::{Context, Result};
use log::info;
#[cfg(feature = "mock")]
use mockall::automock;
use serde::Deserialize;
use std::time::Duration;
use trait_variant::make;

/// Provisioned eSIM profile delivered once fulfillment completes.
#[derive(Clone, Debug, Deserialize)]
pub struct SimProfile {
    pub iccid: String,
    pub smdp_address: String,
    pub matching_id: String,
    #[serde(default)]
    pub activation_code: Option<String>,
}

/// Fulfillment state of an eSIM order.
///
/// `sim` is populated once provisioning succeeded; `error` carries an
/// explicit backend failure. Anything else is an in-progress snapshot.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct OrderStatus {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub sim: Option<SimProfile>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Fulfillment state of a data top-up. `status` is an open-ended string
/// domain; the top-up tracker recognizes the terminal values.
#[derive(Clone, Debug, Deserialize)]
pub struct TopUpStatus {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[make(Send)]
#[cfg_attr(feature = "mock", automock)]
pub trait FulfillmentApi {
    /// Must be idempotent: the polling engine calls it repeatedly and owns
    /// all retry policy. Implementations must not retry internally.
    async fn order_status(&self, order_id: &str) -> Result<OrderStatus>;

    /// Same contract as [`FulfillmentApi::order_status`].
    async fn topup_status(&self, transaction_id: &str) -> Result<TopUpStatus>;
}

#[derive(Clone)]
pub struct FulfillmentClient {
    client: reqwest::Client,
    base_url: String,
}

impl FulfillmentClient {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    // API endpoint constants
    const ORDERS_ENDPOINT: &str = "/v1/orders";
    const TOPUPS_ENDPOINT: &str = "/v1/topups";

    pub fn new() -> Result<Self> {
        Self::with_base_url(&AppConfig::get().fulfillment.base_url)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self> {
        Ok(Self {
            client: https_client(Self::REQUEST_TIMEOUT)?,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    /// GET request to the fulfillment API
    async fn get(&self, path: &str) -> Result<String> {
        let url = format!("{}{}", self.base_url, path);
        info!("GET {url}");

        let res = self
            .client
            .get(&url)
            .send()
            .await
            .context(format!("failed to send GET request to {url}"))?;

        handle_http_response(res, &format!("GET {url}")).await
    }
}

impl FulfillmentApi for FulfillmentClient {
    async fn order_status(&self, order_id: &str) -> Result<OrderStatus> {
        let body = self
            .get(&format!("{}/{order_id}/status", Self::ORDERS_ENDPOINT))
            .await?;
        serde_json::from_str(&body).context("failed to parse order status")
    }

    async fn topup_status(&self, transaction_id: &str) -> Result<TopUpStatus> {
        let body = self
            .get(&format!("{}/{transaction_id}/status", Self::TOPUPS_ENDPOINT))
            .await?;
        serde_json::from_str(&body).context("failed to parse top-up status")
    }
}
