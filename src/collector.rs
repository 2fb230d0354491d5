//! Submission of finished reports to a findings collector.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::model::ScanReport;

/// Path appended to the collector base URL.
const COLLECT_PATH: &str = "/collect";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Collector {
    client: reqwest::Client,
    endpoint: String,
}

impl Collector {
    /// Creates a collector posting to `<base_url>/collect`.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("chainscan/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint(base_url),
        })
    }

    /// POSTs the report as JSON. Non-2xx responses are errors.
    pub async fn submit(&self, report: &ScanReport) -> Result<()> {
        debug!("Submitting {} findings to {}", report.findings.len(), self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .json(report)
            .send()
            .await
            .with_context(|| format!("Failed to reach collector at {}", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Collector at {} responded with {}", self.endpoint, status);
        }

        info!("Report submitted to {}", self.endpoint);
        Ok(())
    }
}

fn endpoint(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with(COLLECT_PATH) {
        base.to_string()
    } else {
        format!("{}{}", base, COLLECT_PATH)
    }
}
