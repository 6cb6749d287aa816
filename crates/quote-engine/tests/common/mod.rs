//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use navquote_engine::gateway::RetryPolicy;
use navquote_engine::{
    Engine, EngineConfig, FetchOptions, Fetcher, ManualClock, QueryError, UpstreamEndpoints,
};

/// Serves canned bodies by URL and records every request it sees.
///
/// Unknown URLs answer like a 404.
pub struct ScriptedFetcher {
    bodies: HashMap<String, String>,
    latency: Duration,
    requests: Mutex<Vec<String>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new(bodies: Vec<(String, String)>) -> Self {
        Self {
            bodies: bodies.into_iter().collect(),
            latency: Duration::from_millis(50),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most requests ever observed running at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_for(&self, url: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.as_str() == url)
            .count()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    fn id(&self) -> &'static str {
        "SCRIPTED"
    }

    async fn fetch(&self, url: &str, _options: &FetchOptions) -> Result<String, QueryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(url.to_string());
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.bodies
            .get(url)
            .cloned()
            .ok_or_else(|| QueryError::UpstreamUnavailable {
                url: url.to_string(),
                message: "HTTP error: 404 Not Found".to_string(),
            })
    }
}

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
}

pub fn fund_url(code: &str) -> String {
    UpstreamEndpoints::default().fund_url(code)
}

pub fn stock_url(symbol: &str) -> String {
    UpstreamEndpoints::default().stock_url(symbol)
}

/// Fund detail page with a name in the title and a dated net value table.
pub fn fund_page(name: &str, code: &str, net_value: &str, date: &str) -> String {
    format!(
        r#"<html><head><title>{name}({code})基金净值_基金数据</title></head>
        <body>
          <table>
            <tr><th>净值日期</th><th>单位净值</th><th>累计净值</th></tr>
            <tr><td>{date}</td><td>{net_value}</td><td>3.1000</td></tr>
          </table>
        </body></html>"#
    )
}

/// Quote record in the stock upstream's `v_<symbol>="..."` format.
pub fn quote(symbol: &str, name: &str, price: &str) -> String {
    let mut fields = vec!["1".to_string(); 30];
    fields[1] = name.to_string();
    fields[2] = symbol[2..].to_string();
    fields[3] = price.to_string();
    fields.push("20240628150000".to_string());
    format!("v_{}=\"{}\";", symbol, fields.join("~"))
}

pub fn no_match() -> String {
    "v_pv_none_match=\"1\";".to_string()
}

/// Engine over `bodies` with fast retries and a fixed calendar.
pub fn engine(
    bodies: Vec<(String, String)>,
) -> (Arc<ScriptedFetcher>, Arc<ManualClock>, Engine) {
    let fetcher = Arc::new(ScriptedFetcher::new(bodies));
    let clock = Arc::new(ManualClock::new(today()));
    let config = EngineConfig {
        retry: RetryPolicy {
            attempts: 2,
            base_delay: Duration::from_millis(10),
            attempt_timeout: Duration::from_secs(1),
        },
        ..EngineConfig::default()
    };
    let engine = Engine::with_clock(config, fetcher.clone(), clock.clone());
    (fetcher, clock, engine)
}
