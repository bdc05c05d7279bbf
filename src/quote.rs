//! Bridge quote HTTP client.
//!
//! Thin client for the external quota/fee REST collaborator. Only the fields
//! the toolkit consumes are modeled; everything else in the response is
//! ignored.

use crate::error::QuoteError;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

/// Network fee as quoted by the bridge service: either an absolute value or
/// a percentage with bounds.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkFeeQuote {
    /// Fee value; interpretation depends on [`is_percent`](Self::is_percent).
    pub value: String,
    /// Whether [`value`](Self::value) is a percentage of the transfer amount.
    #[serde(rename = "isPercent")]
    pub is_percent: bool,
    /// Lower bound applied to a percentage fee.
    #[serde(rename = "minFeeLimit", default)]
    pub min_fee_limit: Option<String>,
    /// Upper bound applied to a percentage fee.
    #[serde(rename = "maxFeeLimit", default)]
    pub max_fee_limit: Option<String>,
}

/// Quota and fee quote for one route.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeQuote {
    /// Network fee for the route.
    #[serde(rename = "networkFee")]
    pub network_fee: NetworkFeeQuote,
    /// Smallest transferable amount.
    #[serde(rename = "minQuota")]
    pub min_quota: String,
    /// Largest transferable amount.
    #[serde(rename = "maxQuota")]
    pub max_quota: String,
}

/// Client for the bridge quote service.
#[derive(Debug, Clone)]
pub struct QuoteClient {
    client: reqwest::Client,
    base_url: Url,
}

impl QuoteClient {
    /// Creates a client against the service base URL.
    pub fn new(base_url: Url) -> Self {
        Self { client: reqwest::Client::new(), base_url }
    }

    /// Fetches the quota and network fee for a route.
    #[instrument(skip(self))]
    pub async fn fetch_quote(
        &self,
        from_chain_type: &str,
        to_chain_type: &str,
        pair_id: u64,
        symbol: &str,
    ) -> Result<BridgeQuote, QuoteError> {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push("quota");
        }
        url.query_pairs_mut()
            .append_pair("fromChainType", from_chain_type)
            .append_pair("toChainType", to_chain_type)
            .append_pair("tokenPairID", &pair_id.to_string())
            .append_pair("symbol", symbol);

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(QuoteError::Status(response.status()));
        }
        let quote: BridgeQuote = response.json().await?;
        debug!(
            fee = %quote.network_fee.value,
            is_percent = quote.network_fee.is_percent,
            "bridge quote received"
        );
        Ok(quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_the_documented_response_shape() {
        let raw = r#"{
            "networkFee": {
                "value": "0.3",
                "isPercent": true,
                "minFeeLimit": "1",
                "maxFeeLimit": "500"
            },
            "minQuota": "12",
            "maxQuota": "4900000",
            "symbol": "USDT"
        }"#;
        let quote: BridgeQuote = serde_json::from_str(raw).unwrap();
        assert_eq!(quote.network_fee.value, "0.3");
        assert!(quote.network_fee.is_percent);
        assert_eq!(quote.network_fee.max_fee_limit.as_deref(), Some("500"));
        assert_eq!(quote.min_quota, "12");
    }

    #[test]
    fn absolute_fee_without_bounds() {
        let raw = r#"{
            "networkFee": { "value": "5", "isPercent": false },
            "minQuota": "0",
            "maxQuota": "100"
        }"#;
        let quote: BridgeQuote = serde_json::from_str(raw).unwrap();
        assert!(!quote.network_fee.is_percent);
        assert!(quote.network_fee.min_fee_limit.is_none());
    }
}
