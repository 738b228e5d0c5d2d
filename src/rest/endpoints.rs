//! Upstream endpoint constants and query-parameter types.

use serde::Serialize;

/// Coin listings with market data, ordered and paginated.
pub const COINS_MARKETS: &str = "/coins/markets";

/// Historical market data for one coin.
pub fn market_chart(coin_id: &str) -> String {
    format!("/coins/{coin_id}/market_chart")
}

/// Query parameters for the coin listings endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CoinMarketsRequest {
    /// Quote currency (e.g. "usd").
    pub vs_currency: String,
    /// Sort order.
    pub order: String,
    /// Number of results per page.
    pub per_page: u32,
    /// Page number, 1-based.
    pub page: u32,
    /// Whether to include 7-day sparkline data.
    pub sparkline: bool,
    /// Comma-separated coin ids, restricting the listing to an allow-list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ids: Option<String>,
}

impl CoinMarketsRequest {
    /// Top `count` coins by market capitalization.
    pub fn top_by_market_cap(vs_currency: impl Into<String>, count: u32) -> Self {
        Self {
            vs_currency: vs_currency.into(),
            order: "market_cap_desc".to_string(),
            per_page: count,
            page: 1,
            sparkline: false,
            ids: None,
        }
    }

    /// A fixed allow-list of coin ids, still ordered by market capitalization.
    pub fn allow_list(vs_currency: impl Into<String>, ids: &[String]) -> Self {
        Self {
            vs_currency: vs_currency.into(),
            order: "market_cap_desc".to_string(),
            per_page: ids.len() as u32,
            page: 1,
            sparkline: false,
            ids: Some(ids.join(",")),
        }
    }
}

/// Query parameters for the market chart endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct MarketChartRequest {
    /// Quote currency (e.g. "usd").
    pub vs_currency: String,
    /// Day range ending now.
    pub days: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_chart_path() {
        assert_eq!(market_chart("bitcoin"), "/coins/bitcoin/market_chart");
    }

    #[test]
    fn test_top_by_market_cap_query() {
        let request = CoinMarketsRequest::top_by_market_cap("usd", 10);
        let query = serde_urlencoded::to_string(&request).unwrap();
        assert_eq!(
            query,
            "vs_currency=usd&order=market_cap_desc&per_page=10&page=1&sparkline=false"
        );
    }

    #[test]
    fn test_allow_list_query() {
        let ids = vec!["bitcoin".to_string(), "ethereum".to_string()];
        let request = CoinMarketsRequest::allow_list("usd", &ids);
        let query = serde_urlencoded::to_string(&request).unwrap();
        assert!(query.contains("ids=bitcoin%2Cethereum"));
        assert!(query.contains("per_page=2"));
    }
}
