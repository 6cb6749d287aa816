use serde::{Deserialize, Serialize};

/// Default fund page template.
pub const DEFAULT_FUND_URL: &str = "https://fund.eastmoney.com/{code}.html";

/// Default quote endpoint template.
pub const DEFAULT_STOCK_URL: &str = "https://qt.gtimg.cn/q={symbol}";

/// URL templates for the two upstreams.
///
/// `{code}` in the fund template is replaced with the six-digit fund code;
/// `{symbol}` in the stock template with the prefixed symbol (`sz000311`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamEndpoints {
    pub fund_url: String,
    pub stock_url: String,
}

impl UpstreamEndpoints {
    pub fn fund_url(&self, code: &str) -> String {
        self.fund_url.replace("{code}", code)
    }

    pub fn stock_url(&self, symbol: &str) -> String {
        self.stock_url.replace("{symbol}", symbol)
    }
}

impl Default for UpstreamEndpoints {
    fn default() -> Self {
        Self {
            fund_url: DEFAULT_FUND_URL.to_string(),
            stock_url: DEFAULT_STOCK_URL.to_string(),
        }
    }
}
