//! Retry, backoff, and cache behavior of the gateway against a scripted
//! transport.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use reason_bench::config::Config;
use reason_bench::error::{BenchError, Result};
use reason_bench::gateway::{CompletionTransport, Gateway};
use reason_bench::prompts::Technique;

const VALID_BODY: &str = "*Understanding:* u\n*Reasoning Pathway:* r\n*Final Synthesis:* s";

struct FlakyTransport {
    calls: AtomicUsize,
    failures_before_success: usize,
}

impl FlakyTransport {
    fn new(failures_before_success: usize) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            failures_before_success,
        })
    }
}

#[async_trait]
impl CompletionTransport for FlakyTransport {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures_before_success {
            Err(BenchError::Transport {
                message: format!("simulated outage on call {}", call + 1),
            })
        } else {
            Ok(VALID_BODY.to_string())
        }
    }
}

fn config_with(backoff_ms: u64) -> Config {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.cache.dir = Some(tmp.keep());
    config.llm.backoff_base_ms = backoff_ms;
    config
}

#[tokio::test]
async fn fails_twice_succeeds_third_with_backoff() {
    let base_ms = 50u64;
    let transport = FlakyTransport::new(2);
    let gateway = Gateway::with_transport(&config_with(base_ms), transport.clone()).unwrap();

    let start = Instant::now();
    let response = gateway
        .query("What is the next number in the pattern?", Technique::Default)
        .await
        .unwrap();
    let elapsed = start.elapsed();

    assert!(response.is_valid());
    assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    // Backoff sleeps are base*2 then base*4
    assert!(
        elapsed >= Duration::from_millis(6 * base_ms),
        "expected >= {}ms of backoff, saw {:?}",
        6 * base_ms,
        elapsed
    );
}

#[tokio::test]
async fn identical_prompts_hit_cache_not_network() {
    let transport = FlakyTransport::new(0);
    let gateway = Gateway::with_transport(&config_with(1), transport.clone()).unwrap();

    let first = gateway.query("same question", Technique::SelfCritique).await.unwrap();
    let second = gateway.query("same question", Technique::SelfCritique).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(
        transport.calls.load(Ordering::SeqCst),
        1,
        "second call must be served from cache"
    );
}

#[tokio::test]
async fn different_techniques_do_not_share_cache_entries() {
    let transport = FlakyTransport::new(0);
    let gateway = Gateway::with_transport(&config_with(1), transport.clone()).unwrap();

    gateway.query("q", Technique::Default).await.unwrap();
    gateway.query("q", Technique::TreeOfThoughts).await.unwrap();

    assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn batch_isolates_individual_failures() {
    struct SelectiveTransport {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionTransport for SelectiveTransport {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if prompt.contains("poison") {
                Err(BenchError::Transport {
                    message: "always down".to_string(),
                })
            } else {
                Ok(VALID_BODY.to_string())
            }
        }
    }

    let transport = Arc::new(SelectiveTransport {
        calls: AtomicUsize::new(0),
    });
    let gateway = Gateway::with_transport(&config_with(1), transport).unwrap();

    let questions = vec![
        "good one".to_string(),
        "poison pill".to_string(),
        "another good one".to_string(),
    ];
    let results = gateway.batch_query(&questions, Technique::Default).await;

    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(results[1].is_err());
    assert!(results[2].is_ok());
}

#[tokio::test]
async fn backoff_does_not_block_sibling_queries() {
    // One slow-failing prompt next to fast ones: the batch finishes in
    // far less time than serialized backoff would take.
    struct MixedTransport;

    #[async_trait]
    impl CompletionTransport for MixedTransport {
        async fn complete(&self, prompt: &str) -> Result<String> {
            if prompt.contains("flaky") {
                Err(BenchError::Transport {
                    message: "down".to_string(),
                })
            } else {
                Ok(VALID_BODY.to_string())
            }
        }
    }

    let base_ms = 40u64;
    let gateway = Gateway::with_transport(&config_with(base_ms), Arc::new(MixedTransport)).unwrap();

    let questions: Vec<String> = (0..4)
        .map(|i| format!("flaky question {i}"))
        .chain(std::iter::once("healthy question".to_string()))
        .collect();

    let start = Instant::now();
    let results = gateway.batch_query(&questions, Technique::Default).await;
    let elapsed = start.elapsed();

    assert!(results[4].is_ok());
    assert_eq!(results.iter().filter(|r| r.is_err()).count(), 4);
    // Each flaky query sleeps 6*base on its own; serialized that would be
    // 4 * 6 * base. Concurrency keeps it near one query's worth.
    assert!(
        elapsed < Duration::from_millis(4 * 6 * base_ms),
        "batch appears to serialize backoff: {:?}",
        elapsed
    );
}
