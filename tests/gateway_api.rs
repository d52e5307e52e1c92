//! End-to-end gateway tests over real HTTP, backed by the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use deadlock_bank::account::{Account, AccountStore, MemoryAccountStore, StoreError, StoreTx};
use deadlock_bank::gateway::{self, state::AppState};
use deadlock_bank::harness::{self, AttackConfig};
use deadlock_bank::transfer::{LockStrategy, TransferEngine};

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    async fn start(hold_delay: Duration) -> Self {
        Self::start_with_store(Arc::new(MemoryAccountStore::seeded()), hold_delay).await
    }

    async fn start_with_store(store: Arc<dyn AccountStore>, hold_delay: Duration) -> Self {
        let engine = TransferEngine::with_hold_delay(store, hold_delay);
        let state = Arc::new(AppState::new(engine));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            gateway::serve(listener, state, async {
                let _ = rx.await;
            })
            .await
            .unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            client: reqwest::Client::new(),
            shutdown: Some(tx),
        }
    }

    async fn reset(&self) -> Value {
        let resp = self
            .client
            .post(format!("{}/reset", self.base_url))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        resp.json().await.unwrap()
    }

    async fn transfer(&self, mode: &str, from: i32, to: i32, amount: i64) -> (u16, Value) {
        let resp = self
            .client
            .post(format!("{}/transfer/{}", self.base_url, mode))
            .json(&json!({ "from_account": from, "to_account": to, "amount": amount }))
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    async fn balances(&self) -> (i64, i64) {
        let accounts = harness::fetch_accounts(&self.client, &self.base_url)
            .await
            .unwrap();
        let find = |id| {
            accounts
                .iter()
                .find(|a| a.id == id)
                .map(|a| a.balance)
                .unwrap()
        };
        (find(1), find(2))
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

#[tokio::test]
async fn test_reset_seeds_alice_and_bob() {
    let server = TestServer::start(Duration::ZERO).await;

    let body = server.reset().await;
    assert_eq!(body["code"], 0);
    assert_eq!(
        body["data"]["message"],
        "Database reset. Alice (1) and Bob (2) have $1000."
    );
    assert_eq!(server.balances().await, (1000, 1000));

    // Idempotent
    server.reset().await;
    assert_eq!(server.balances().await, (1000, 1000));
}

#[tokio::test]
async fn test_unsafe_transfer_commits() {
    let server = TestServer::start(Duration::ZERO).await;
    server.reset().await;

    let (status, body) = server.transfer("unsafe", 1, 2, 100).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["status"], "success");
    assert_eq!(body["data"]["msg"], "Transfer complete");
    assert_eq!(server.balances().await, (900, 1100));
}

#[tokio::test]
async fn test_safe_transfer_commits() {
    let server = TestServer::start(Duration::ZERO).await;
    server.reset().await;

    let (status, body) = server.transfer("safe", 2, 1, 250).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["msg"], "Safe Transfer complete");
    assert_eq!(body["data"]["receipt"]["strategy"], "safe");
    assert_eq!(server.balances().await, (1250, 750));
}

#[tokio::test]
async fn test_insufficient_funds_changes_nothing() {
    let server = TestServer::start(Duration::ZERO).await;
    server.reset().await;

    for mode in ["unsafe", "safe"] {
        let (status, body) = server.transfer(mode, 1, 2, 5000).await;
        assert_eq!(status, 400, "{} should reject overdraft", mode);
        assert_eq!(body["code"], 1002);
        assert_eq!(body["msg"], "Insufficient funds");
    }
    assert_eq!(server.balances().await, (1000, 1000));
}

#[tokio::test]
async fn test_non_positive_amount_rejected() {
    let server = TestServer::start(Duration::ZERO).await;
    server.reset().await;

    let (status, body) = server.transfer("safe", 1, 2, 0).await;
    assert_eq!(status, 400);
    assert_eq!(body["code"], 1001);

    let (status, _) = server.transfer("unsafe", 1, 2, -10).await;
    assert_eq!(status, 400);
    assert_eq!(server.balances().await, (1000, 1000));
}

#[tokio::test]
async fn test_unknown_account_is_404() {
    let server = TestServer::start(Duration::ZERO).await;
    server.reset().await;

    let (status, body) = server.transfer("unsafe", 1, 99, 10).await;
    assert_eq!(status, 404);
    assert_eq!(body["code"], 4004);
    assert_eq!(server.balances().await, (1000, 1000));
}

#[tokio::test]
async fn test_self_transfer_is_net_zero() {
    let server = TestServer::start(Duration::ZERO).await;
    server.reset().await;

    let (status, _) = server.transfer("safe", 1, 1, 300).await;
    assert_eq!(status, 200);
    assert_eq!(server.balances().await, (1000, 1000));
}

#[tokio::test]
async fn test_health_and_openapi() {
    let server = TestServer::start(Duration::ZERO).await;

    let resp = server
        .client
        .get(format!("{}/health", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let doc: Value = server
        .client
        .get(format!("{}/api-docs/openapi.json", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(doc["paths"]["/transfer/safe"].is_object());
}

/// Opposite-direction pairs under sender-first locking: each pair closes an
/// AB-BA cycle while both first locks are held.
#[tokio::test]
async fn test_unsafe_opposite_pairs_deadlock() {
    let server = TestServer::start(Duration::from_millis(100)).await;
    server.reset().await;

    let mut deadlocks = 0;
    let mut successes = 0;
    for _ in 0..3 {
        let (a, b) = tokio::join!(
            server.transfer("unsafe", 1, 2, 10),
            server.transfer("unsafe", 2, 1, 10)
        );
        for (status, body) in [a, b] {
            match status {
                200 => successes += 1,
                500 => {
                    assert_eq!(body["code"], 5002);
                    deadlocks += 1;
                }
                other => panic!("unexpected status {}", other),
            }
        }
    }

    assert!(deadlocks >= 1, "expected at least one deadlock victim");
    assert!(successes >= 3, "one side of every pair must commit");

    let (alice, bob) = server.balances().await;
    assert_eq!(alice + bob, 2000);
}

#[tokio::test]
async fn test_safe_attack_never_deadlocks() {
    let server = TestServer::start(Duration::from_millis(20)).await;

    let config = AttackConfig {
        api_url: server.base_url.clone(),
        total_requests: 30,
        concurrency: 8,
        amount: 10,
        strategy: LockStrategy::Safe,
        reset_first: true,
    };
    let tally = harness::run_attack(&server.client, &config).await.unwrap();

    assert_eq!(tally.deadlock, 0);
    assert_eq!(tally.transport_error, 0);
    assert_eq!(tally.success, 30);

    let (alice, bob) = server.balances().await;
    assert_eq!(alice + bob, 2000);
}

#[tokio::test]
async fn test_unsafe_attack_conserves_money() {
    let server = TestServer::start(Duration::from_millis(20)).await;

    let config = AttackConfig {
        api_url: server.base_url.clone(),
        total_requests: 30,
        concurrency: 8,
        amount: 10,
        strategy: LockStrategy::Unsafe,
        reset_first: true,
    };
    let tally = harness::run_attack(&server.client, &config).await.unwrap();

    assert_eq!(tally.total(), 30);
    assert_eq!(tally.transport_error, 0);
    assert_eq!(tally.success + tally.deadlock, 30);

    let (alice, bob) = server.balances().await;
    assert_eq!(alice + bob, 2000);
    assert_eq!((alice - 1000) % 10, 0);
}

/// Store that accepts reads but fails every transaction, so transfers end in
/// a plain 500 `INTERNAL_ERROR`.
struct BrokenTxStore {
    inner: MemoryAccountStore,
}

#[async_trait]
impl AccountStore for BrokenTxStore {
    fn name(&self) -> &'static str {
        "broken-tx"
    }

    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        Err(StoreError::Database("connection reset by peer".to_string()))
    }

    async fn reset_all(&self, seed: &[Account]) -> Result<(), StoreError> {
        self.inner.reset_all(seed).await
    }

    async fn accounts(&self) -> Result<Vec<Account>, StoreError> {
        self.inner.accounts().await
    }
}

#[tokio::test]
async fn test_attack_counts_store_failures_as_rejected_not_deadlock() {
    let store = Arc::new(BrokenTxStore {
        inner: MemoryAccountStore::seeded(),
    });
    let server = TestServer::start_with_store(store, Duration::ZERO).await;

    let (status, body) = server.transfer("unsafe", 1, 2, 10).await;
    assert_eq!(status, 500);
    assert_eq!(body["code"], 5000);

    let config = AttackConfig {
        api_url: server.base_url.clone(),
        total_requests: 6,
        concurrency: 3,
        amount: 10,
        strategy: LockStrategy::Unsafe,
        reset_first: true,
    };
    let tally = harness::run_attack(&server.client, &config).await.unwrap();

    assert_eq!(tally.deadlock, 0);
    assert_eq!(tally.rejected, 6);
    assert_eq!(server.balances().await, (1000, 1000));
}
