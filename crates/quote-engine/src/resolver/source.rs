//! Source resolver: fund-first lookup with stock fallback.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::endpoints::UpstreamEndpoints;
use super::traits::PriceResolver;
use crate::clock::Clock;
use crate::errors::{QueryError, SourcePath};
use crate::extract::{parse_stock_payload, FundPageExtractor, FundSnapshot, ParseOutcome};
use crate::gateway::UpstreamGateway;
use crate::models::{Market, PriceRecord, SecurityId};
use crate::provider::FetchOptions;

/// Exchange prefixes to try for a stock code, in order.
///
/// Digit codes on `sh` or `sz` get the other exchange as a single fallback;
/// everything else has exactly one candidate.
pub fn stock_candidates(market: Market, code: &str) -> Vec<Market> {
    let mut candidates = vec![market];
    if code.bytes().all(|b| b.is_ascii_digit()) {
        if let Some(alternate) = market.alternate() {
            candidates.push(alternate);
        }
    }
    candidates
}

/// Resolves identifiers against the fund page and quote upstreams.
pub struct SourceResolver {
    gateway: Arc<UpstreamGateway>,
    endpoints: UpstreamEndpoints,
    extractor: FundPageExtractor,
    clock: Arc<dyn Clock>,
}

impl SourceResolver {
    pub fn new(
        gateway: Arc<UpstreamGateway>,
        endpoints: UpstreamEndpoints,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            gateway,
            endpoints,
            extractor: FundPageExtractor::new(),
            clock,
        }
    }

    /// Fund page first; any rejection or error falls through to the stock
    /// path with the same code. A failure here is reported as a fund
    /// failure even when it came from the stock fallback.
    async fn resolve_fund(&self, code: &str) -> Result<PriceRecord, QueryError> {
        match self.fetch_fund(code).await {
            Ok(snapshot) => {
                if let Some(net_value) = snapshot.accepted_net_value() {
                    info!("Resolved fund {} from fund page", code);
                    return Ok(PriceRecord::success(
                        code,
                        code,
                        snapshot.name,
                        net_value,
                        snapshot.date,
                    ));
                }
                debug!(
                    "Fund page for {} rejected (name: '{}', net value: {:?}), trying stock path",
                    code, snapshot.name, snapshot.net_value
                );
            }
            Err(e) => {
                debug!("Fund lookup for {} failed ({}), trying stock path", code, e);
            }
        }

        self.lookup_stock(code, Market::infer_from_code(code), code).await
    }

    async fn fetch_fund(&self, code: &str) -> Result<FundSnapshot, QueryError> {
        let url = self.endpoints.fund_url(code);
        let body = self.gateway.fetch_text(&url, &FetchOptions::new()).await?;
        Ok(self.extractor.extract(code, &body, self.clock.today()))
    }

    /// Query the quote upstream under each candidate prefix in turn.
    ///
    /// Only an explicit no-match moves on to the next candidate; upstream
    /// and extraction errors end the lookup.
    async fn lookup_stock(
        &self,
        id: &str,
        market: Market,
        code: &str,
    ) -> Result<PriceRecord, QueryError> {
        let mut not_found = None;

        for candidate in stock_candidates(market, code) {
            let symbol = format!("{}{}", candidate.prefix(), code);
            let url = self.endpoints.stock_url(&symbol);
            let body = self.gateway.fetch_text(&url, &FetchOptions::new()).await?;

            match parse_stock_payload(&body, self.clock.today()) {
                ParseOutcome::Parsed(quote) => {
                    info!("Resolved {} as {} ({})", id, symbol, quote.name);
                    return Ok(PriceRecord::success(
                        id,
                        symbol,
                        quote.name,
                        quote.price,
                        Some(quote.date),
                    ));
                }
                ParseOutcome::NoMatch => {
                    debug!("No quote for {}", symbol);
                    not_found = Some(QueryError::NotFound(symbol));
                }
                ParseOutcome::Malformed(reason) => {
                    return Err(QueryError::Extraction(format!("{}: {}", symbol, reason)));
                }
            }
        }

        Err(not_found.unwrap_or_else(|| QueryError::NotFound(id.to_string())))
    }
}

#[async_trait]
impl PriceResolver for SourceResolver {
    async fn resolve(&self, id: &SecurityId) -> Result<PriceRecord, QueryError> {
        match id {
            SecurityId::Fund { code } => self
                .resolve_fund(code)
                .await
                .map_err(|e| e.on_path(SourcePath::Fund)),
            SecurityId::Listed { market, code } => self
                .lookup_stock(&id.key(), *market, code)
                .await
                .map_err(|e| e.on_path(SourcePath::Stock)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::BoundedTtlCache;
    use crate::clock::ManualClock;
    use crate::errors::Sentinel;
    use crate::gateway::{ConcurrencyLimiter, RetryPolicy};
    use crate::provider::Fetcher;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Serves canned bodies by URL and records every request.
    struct MockFetcher {
        bodies: HashMap<String, String>,
        requests: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Fetcher for MockFetcher {
        fn id(&self) -> &'static str {
            "MOCK"
        }

        async fn fetch(&self, url: &str, _options: &FetchOptions) -> Result<String, QueryError> {
            self.requests.lock().unwrap().push(url.to_string());
            self.bodies
                .get(url)
                .cloned()
                .ok_or_else(|| QueryError::UpstreamUnavailable {
                    url: url.to_string(),
                    message: "HTTP error: 404 Not Found".to_string(),
                })
        }
    }

    fn fund_url(code: &str) -> String {
        UpstreamEndpoints::default().fund_url(code)
    }

    fn stock_url(symbol: &str) -> String {
        UpstreamEndpoints::default().stock_url(symbol)
    }

    fn quote(symbol: &str, name: &str, price: &str) -> String {
        let mut fields = vec!["1".to_string(); 30];
        fields[1] = name.to_string();
        fields[2] = symbol[2..].to_string();
        fields[3] = price.to_string();
        fields.push("20240628150000".to_string());
        format!("v_{}=\"{}\";", symbol, fields.join("~"))
    }

    fn resolver(bodies: Vec<(String, String)>) -> (Arc<MockFetcher>, SourceResolver) {
        let fetcher = Arc::new(MockFetcher {
            bodies: bodies.into_iter().collect(),
            requests: Mutex::new(Vec::new()),
        });
        let clock = Arc::new(ManualClock::new(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()));
        let gateway = UpstreamGateway::new(
            fetcher.clone(),
            Arc::new(ConcurrencyLimiter::new(4)),
            RetryPolicy {
                attempts: 1,
                base_delay: Duration::from_millis(10),
                attempt_timeout: Duration::from_secs(5),
            },
            Arc::new(BoundedTtlCache::new("raw", 32, clock.clone())),
            Duration::from_secs(15),
        );
        let resolver = SourceResolver::new(Arc::new(gateway), UpstreamEndpoints::default(), clock);
        (fetcher, resolver)
    }

    const FUND_PAGE: &str = r#"<html><head><title>华夏成长混合(000311)基金净值_天天基金网</title></head>
        <body><table>
        <tr><th>净值日期</th><th>单位净值</th></tr>
        <tr><td>2024-06-28</td><td>2.3456</td></tr>
        </table></body></html>"#;

    #[test]
    fn test_stock_candidates() {
        assert_eq!(stock_candidates(Market::Sh, "000001"), vec![Market::Sh, Market::Sz]);
        assert_eq!(stock_candidates(Market::Sz, "000311"), vec![Market::Sz, Market::Sh]);
        assert_eq!(stock_candidates(Market::Hk, "00700"), vec![Market::Hk]);
        assert_eq!(stock_candidates(Market::Us, "AAPL"), vec![Market::Us]);
    }

    #[tokio::test]
    async fn test_fund_page_accepted() {
        let (fetcher, resolver) = resolver(vec![(fund_url("000311"), FUND_PAGE.to_string())]);

        let record = resolver
            .resolve(&SecurityId::parse("000311").unwrap())
            .await
            .unwrap();

        assert_eq!(record.price, Some(dec!(2.3456)));
        assert_eq!(record.name, "华夏成长混合");
        assert_eq!(record.date, NaiveDate::from_ymd_opt(2024, 6, 28));
        assert_eq!(fetcher.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unnamed_fund_page_falls_back_to_stock() {
        let (fetcher, resolver) = resolver(vec![
            (
                fund_url("000311"),
                "<html><title>404</title><body>单位净值 2.3456</body></html>".to_string(),
            ),
            (stock_url("sz000311"), quote("sz000311", "东方证券", "9.87")),
        ]);

        let record = resolver
            .resolve(&SecurityId::parse("000311").unwrap())
            .await
            .unwrap();

        assert_eq!(record.symbol, "sz000311");
        assert_eq!(record.name, "东方证券");
        assert_eq!(record.price, Some(dec!(9.87)));
        assert_eq!(
            *fetcher.requests.lock().unwrap(),
            vec![fund_url("000311"), stock_url("sz000311")]
        );
    }

    #[tokio::test]
    async fn test_fund_error_falls_back_to_alternate_exchange() {
        let (_fetcher, resolver) = resolver(vec![
            (stock_url("sz000311"), "v_pv_none_match=\"1\";".to_string()),
            (stock_url("sh000311"), quote("sh000311", "Listed Name", "1.50")),
        ]);

        let record = resolver
            .resolve(&SecurityId::parse("000311").unwrap())
            .await
            .unwrap();

        assert_eq!(record.id, "000311");
        assert_eq!(record.symbol, "sh000311");
    }

    #[tokio::test]
    async fn test_fund_and_stock_failure_is_a_fund_failure() {
        let (_fetcher, resolver) = resolver(vec![]);

        let error = resolver
            .resolve(&SecurityId::parse("000311").unwrap())
            .await
            .unwrap_err();

        assert_eq!(error.sentinel(), Sentinel::FundResolutionFailed);
    }

    #[tokio::test]
    async fn test_no_match_on_both_exchanges() {
        let (fetcher, resolver) = resolver(vec![
            (stock_url("sh000001"), "v_pv_none_match=\"1\";".to_string()),
            (stock_url("sz000001"), "v_sz000001=\"\";".to_string()),
        ]);

        let error = resolver
            .resolve(&SecurityId::parse("sh000001").unwrap())
            .await
            .unwrap_err();

        assert_eq!(error.sentinel(), Sentinel::StockResolutionFailed);
        assert_eq!(fetcher.requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_quote_does_not_try_alternate() {
        let (fetcher, resolver) = resolver(vec![(
            stock_url("sh600000"),
            quote("sh600000", "20240628", "8.00"),
        )]);

        let error = resolver
            .resolve(&SecurityId::parse("sh600000").unwrap())
            .await
            .unwrap_err();

        assert_eq!(error.sentinel(), Sentinel::StockResolutionFailed);
        assert_eq!(fetcher.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_us_ticker_single_candidate() {
        let (_fetcher, resolver) = resolver(vec![(
            stock_url("usAAPL"),
            quote("usAAPL", "Apple", "212.49"),
        )]);

        let record = resolver
            .resolve(&SecurityId::parse("usaapl").unwrap())
            .await
            .unwrap();

        assert_eq!(record.id, "usAAPL");
        assert_eq!(record.price, Some(dec!(212.49)));
    }
}
