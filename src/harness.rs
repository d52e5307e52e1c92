//! Load harness
//!
//! A concurrent HTTP client that hammers one transfer endpoint with
//! random-direction transfers between the two seeded accounts and tallies
//! what came back. Drives the gateway only through its request/response
//! contract.

use anyhow::Context;
use futures::stream::{self, StreamExt};
use reqwest::StatusCode;
use serde::Serialize;
use tracing::{info, warn};

use crate::account::Account;
use crate::core_types::Balance;
use crate::gateway::types::{AccountsResponseData, ApiResponse, error_codes};
use crate::transfer::{LockStrategy, TransferRequest};

/// Transfer direction between the two seeded accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    AliceToBob,
    BobToAlice,
}

impl Direction {
    /// 50/50 coin flip
    pub fn random() -> Self {
        if rand::random::<bool>() {
            Direction::AliceToBob
        } else {
            Direction::BobToAlice
        }
    }

    pub fn request(self, amount: Balance) -> TransferRequest {
        match self {
            Direction::AliceToBob => TransferRequest::new(1, 2, amount),
            Direction::BobToAlice => TransferRequest::new(2, 1, amount),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Direction::AliceToBob => "Alice -> Bob",
            Direction::BobToAlice => "Bob -> Alice",
        }
    }
}

/// How one request ended, from the client's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Success,
    /// 500 carrying envelope code `DEADLOCK_DETECTED`
    Deadlock,
    /// Any other HTTP status, including 500s that are not deadlocks
    Rejected(u16),
    /// No HTTP response at all
    TransportError,
}

impl Verdict {
    /// Classify by HTTP status and the envelope `code`, if the body had one
    pub fn classify(status: StatusCode, code: Option<i32>) -> Self {
        match status {
            StatusCode::OK => Verdict::Success,
            StatusCode::INTERNAL_SERVER_ERROR
                if code == Some(error_codes::DEADLOCK_DETECTED) =>
            {
                Verdict::Deadlock
            }
            other => Verdict::Rejected(other.as_u16()),
        }
    }
}

/// Envelope `code` of a response body, if it parses as one
fn envelope_code(body: &str) -> Option<i32> {
    serde_json::from_str::<ApiResponse<serde_json::Value>>(body)
        .ok()
        .map(|envelope| envelope.code)
}

/// Outcome counts for one attack run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub success: usize,
    pub deadlock: usize,
    pub rejected: usize,
    pub transport_error: usize,
}

impl Tally {
    pub fn record(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Success => self.success += 1,
            Verdict::Deadlock => self.deadlock += 1,
            Verdict::Rejected(_) => self.rejected += 1,
            Verdict::TransportError => self.transport_error += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.success + self.deadlock + self.rejected + self.transport_error
    }
}

/// Attack parameters
#[derive(Debug, Clone)]
pub struct AttackConfig {
    /// Base URL, e.g. `http://localhost:8000`
    pub api_url: String,
    pub total_requests: usize,
    /// Requests in flight at the same time
    pub concurrency: usize,
    pub amount: Balance,
    pub strategy: LockStrategy,
    /// POST /reset before the run
    pub reset_first: bool,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".to_string(),
            total_requests: 50,
            concurrency: 8,
            amount: 10,
            strategy: LockStrategy::Unsafe,
            reset_first: true,
        }
    }
}

impl AttackConfig {
    fn transfer_url(&self) -> String {
        format!(
            "{}/transfer/{}",
            self.api_url.trim_end_matches('/'),
            self.strategy
        )
    }
}

/// Run the attack and return the tally
pub async fn run_attack(client: &reqwest::Client, config: &AttackConfig) -> anyhow::Result<Tally> {
    info!(
        requests = config.total_requests,
        concurrency = config.concurrency,
        strategy = %config.strategy,
        "Starting attack"
    );

    if config.reset_first {
        reset(client, &config.api_url).await?;
    }

    let url = config.transfer_url();
    let tally = stream::iter(0..config.total_requests)
        .map(|i| send_transfer(client, &url, i, Direction::random(), config.amount))
        .buffer_unordered(config.concurrency.max(1))
        .fold(Tally::default(), |mut tally, verdict| async move {
            tally.record(verdict);
            tally
        })
        .await;

    Ok(tally)
}

/// One transfer call, classified
pub async fn send_transfer(
    client: &reqwest::Client,
    url: &str,
    transfer_id: usize,
    direction: Direction,
    amount: Balance,
) -> Verdict {
    let response = client
        .post(url)
        .json(&direction.request(amount))
        .send()
        .await;

    match response {
        Ok(resp) => {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            let verdict = Verdict::classify(status, envelope_code(&body));
            match verdict {
                Verdict::Success => info!("[{}] Success: {}", transfer_id, direction.label()),
                Verdict::Deadlock => warn!("[{}] DEADLOCK: {}", transfer_id, direction.label()),
                Verdict::Rejected(status) => {
                    warn!("[{}] Error {}: {}", transfer_id, status, body);
                }
                Verdict::TransportError => {}
            }
            verdict
        }
        Err(e) => {
            warn!("[{}] Request failed: {}", transfer_id, e);
            Verdict::TransportError
        }
    }
}

/// POST /reset
pub async fn reset(client: &reqwest::Client, api_url: &str) -> anyhow::Result<()> {
    client
        .post(format!("{}/reset", api_url.trim_end_matches('/')))
        .send()
        .await
        .context("reset request failed")?
        .error_for_status()
        .context("reset rejected")?;
    Ok(())
}

/// GET /accounts
pub async fn fetch_accounts(
    client: &reqwest::Client,
    api_url: &str,
) -> anyhow::Result<Vec<Account>> {
    let body: ApiResponse<AccountsResponseData> = client
        .get(format!("{}/accounts", api_url.trim_end_matches('/')))
        .send()
        .await
        .context("accounts request failed")?
        .error_for_status()?
        .json()
        .await
        .context("accounts response malformed")?;

    body.data
        .map(|d| d.accounts)
        .ok_or_else(|| anyhow::anyhow!("accounts response missing data: {}", body.msg))
}
