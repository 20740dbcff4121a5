use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use house_wallet_core::{PortError, PriceQuote, PricePort};

use crate::WalletAdapterConfig;

#[derive(Debug, Deserialize)]
struct SimplePrice {
    usd: Option<f64>,
    #[serde(default)]
    usd_24h_change: Option<f64>,
}

/// Client for a CoinGecko-compatible `simple/price` endpoint.
#[derive(Debug, Clone)]
pub struct CoinGeckoAdapter {
    base_url: String,
    client: reqwest::Client,
}

impl CoinGeckoAdapter {
    pub fn with_config(config: &WalletAdapterConfig) -> Result<Self, PortError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(config.price_timeout_ms))
            .build()
            .map_err(|e| PortError::Transport(format!("failed to build http client: {e}")))?;
        Ok(Self {
            base_url: config.price_api_url.trim_end_matches('/').to_owned(),
            client,
        })
    }

    fn url_for(&self, ids: &[String]) -> String {
        format!(
            "{}?ids={}&vs_currencies=usd&include_24hr_change=true",
            self.base_url,
            ids.join(",")
        )
    }
}

#[async_trait]
impl PricePort for CoinGeckoAdapter {
    async fn fetch_quotes(&self, ids: &[String]) -> Result<HashMap<String, PriceQuote>, PortError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let url = self.url_for(ids);
        debug!(%url, "price request");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| PortError::Transport(format!("price request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(PortError::Transport(format!("price api status {status}")));
        }
        let body: HashMap<String, SimplePrice> = response
            .json()
            .await
            .map_err(|e| PortError::Transport(format!("price json decode failed: {e}")))?;

        Ok(body
            .into_iter()
            .filter_map(|(id, price)| {
                let usd = price.usd?;
                Some((
                    id,
                    PriceQuote {
                        usd,
                        change_24h: price.usd_24h_change.unwrap_or(0.0),
                    },
                ))
            })
            .collect())
    }
}
