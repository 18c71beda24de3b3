//! Batch enrichment of transfer records with block hash and revert rate.
//!
//! Every record needs two dependent node calls: find the block containing
//! the transaction, then ask for that block's revert rate. Records are
//! processed concurrently on spawned tasks, never more than
//! [`EnrichConfig::concurrency`] at once. Each task reports back to the
//! coordinator through its `JoinSet`; the coordinator alone writes into the
//! batch and collects failures, so no collection is shared between tasks.
//!
//! The pipeline never fails fast: every record is attempted, then any
//! per-record failures are folded into a single
//! [`CoreError::BatchEnrichmentFailed`] listed in batch order.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::{self, JoinError, JoinSet};
use tracing::{debug, warn};

use crate::config::{EnrichConfig, Schedule};
use crate::error::{CoreError, EnrichItemError};
use crate::rpc::NodeRpc;
use crate::types::{TokenTransferEvent, H256};

/// What one task learned about one record.
#[derive(Debug)]
struct TaskReport {
    index: usize,
    block_hash: Option<H256>,
    revert_rate: Option<f64>,
    failure: Option<String>,
}

pub struct BatchEnricher {
    rpc: Arc<dyn NodeRpc>,
    config: EnrichConfig,
}

impl BatchEnricher {
    pub fn new(rpc: Arc<dyn NodeRpc>, config: EnrichConfig) -> Self {
        Self { rpc, config }
    }

    pub fn config(&self) -> &EnrichConfig {
        &self.config
    }

    /// Fill in `block_hash` and `revert_rate` for every record in `batch`.
    ///
    /// Unmined transactions are left with both fields unset and do not
    /// count as failures. On `Err`, the records may already have been
    /// partially written; callers must treat the whole batch as failed.
    pub async fn enrich(&self, batch: &mut [TokenTransferEvent]) -> Result<(), CoreError> {
        if batch.is_empty() {
            return Ok(());
        }

        let hashes: Vec<H256> = batch.iter().map(|r| r.transaction_hash).collect();
        let mut reports = match self.config.schedule {
            Schedule::Waves => self.run_waves(&hashes).await,
            Schedule::Streaming => self.run_streaming(&hashes).await,
        };
        reports.sort_by_key(|r| r.index);

        let mut failures = Vec::new();
        for report in reports {
            let record = &mut batch[report.index];
            if let Some(block_hash) = report.block_hash {
                record.block_hash = Some(block_hash);
                record.revert_rate = report.revert_rate;
            }
            if let Some(message) = report.failure {
                warn!(index = report.index, tx = ?record.transaction_hash, %message, "enrichment failed");
                failures.push(EnrichItemError {
                    index: report.index,
                    tx_hash: record.transaction_hash,
                    message,
                });
            }
        }

        if failures.is_empty() {
            debug!(records = batch.len(), "batch enriched");
            Ok(())
        } else {
            Err(CoreError::BatchEnrichmentFailed(failures))
        }
    }

    /// Launch up to `concurrency` tasks, wait for the whole wave, repeat.
    async fn run_waves(&self, hashes: &[H256]) -> Vec<TaskReport> {
        let wave_size = self.config.concurrency.get();
        let mut reports = Vec::with_capacity(hashes.len());

        for (wave, start) in (0..hashes.len()).step_by(wave_size).enumerate() {
            let end = (start + wave_size).min(hashes.len());
            debug!(wave, size = end - start, "starting enrichment wave");

            let mut tasks = JoinSet::new();
            let mut ids = HashMap::new();
            for (index, hash) in hashes.iter().enumerate().take(end).skip(start) {
                let handle = tasks.spawn(enrich_one(
                    Arc::clone(&self.rpc),
                    index,
                    *hash,
                    self.config.call_timeout,
                ));
                ids.insert(handle.id(), index);
            }
            reports.extend(collect(tasks, ids, hashes, start..end).await);
        }

        reports
    }

    /// Keep up to `concurrency` tasks in flight with no barrier between them.
    async fn run_streaming(&self, hashes: &[H256]) -> Vec<TaskReport> {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.get()));
        let mut tasks = JoinSet::new();
        let mut ids = HashMap::new();

        for (index, hash) in hashes.iter().enumerate() {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            let rpc = Arc::clone(&self.rpc);
            let hash = *hash;
            let timeout = self.config.call_timeout;
            let handle = tasks.spawn(async move {
                let report = enrich_one(rpc, index, hash, timeout).await;
                drop(permit);
                report
            });
            ids.insert(handle.id(), index);
        }

        collect(tasks, ids, hashes, 0..hashes.len()).await
    }
}

/// Drain `tasks`, turning any task that died without reporting (panic or
/// abort) into a failure for the record it was spawned for.
async fn collect(
    mut tasks: JoinSet<TaskReport>,
    ids: HashMap<task::Id, usize>,
    hashes: &[H256],
    range: std::ops::Range<usize>,
) -> Vec<TaskReport> {
    let mut reports = Vec::with_capacity(range.len());
    let mut reported = vec![false; range.len()];

    while let Some(joined) = tasks.join_next().await {
        let report = match joined {
            Ok(report) => report,
            Err(e) => {
                let Some(&index) = ids.get(&e.id()) else {
                    warn!(error = %e, "unknown enrichment task failed");
                    continue;
                };
                TaskReport {
                    index,
                    block_hash: None,
                    revert_rate: None,
                    failure: Some(format!(
                        "enrichment task for tx {:?} did not complete: {}",
                        hashes[index],
                        describe_join_error(e)
                    )),
                }
            }
        };
        reported[report.index - range.start] = true;
        reports.push(report);
    }

    for (offset, done) in reported.into_iter().enumerate() {
        if !done {
            let index = range.start + offset;
            reports.push(TaskReport {
                index,
                block_hash: None,
                revert_rate: None,
                failure: Some(format!(
                    "enrichment task for tx {:?} was never started",
                    hashes[index]
                )),
            });
        }
    }
    reports
}

fn describe_join_error(e: JoinError) -> String {
    if !e.is_panic() {
        return e.to_string();
    }
    let payload: Box<dyn Any + Send> = e.into_panic();
    let message = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("non-string payload");
    format!("panicked: {message}")
}

async fn enrich_one(
    rpc: Arc<dyn NodeRpc>,
    index: usize,
    tx_hash: H256,
    timeout: Duration,
) -> TaskReport {
    let mut report = TaskReport {
        index,
        block_hash: None,
        revert_rate: None,
        failure: None,
    };

    let block_hash = match with_timeout(timeout, rpc.resolve_block_of_transaction(&tx_hash)).await
    {
        Ok(Some(block_hash)) => block_hash,
        Ok(None) => {
            debug!(index, tx = ?tx_hash, "transaction not mined yet");
            return report;
        }
        Err(e) => {
            report.failure = Some(format!("resolve block for tx {tx_hash:?}: {e}"));
            return report;
        }
    };

    match with_timeout(timeout, rpc.resolve_block_confidence(&block_hash)).await {
        Ok(rate) => report.revert_rate = rate,
        Err(e) => {
            report.failure = Some(format!(
                "resolve confidence for block {block_hash:?} of tx {tx_hash:?}: {e}"
            ));
        }
    }
    report.block_hash = Some(block_hash);
    report
}

async fn with_timeout<T>(
    timeout: Duration,
    call: impl Future<Output = Result<T, CoreError>>,
) -> Result<T, CoreError> {
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| CoreError::Timeout(timeout))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::mock::{MockNode, MockNodeBuilder};
    use crate::test_util::{event, hash, hex_of};

    const TX_LOOKUP: &str = "get_transaction_by_hash";

    fn enricher(rpc: Arc<MockNode>, concurrency: usize) -> BatchEnricher {
        BatchEnricher::new(rpc, EnrichConfig::new(concurrency).unwrap())
    }

    /// Transactions 1..=n, each mined in block 100+i with revert rate i/100.
    fn mined_node(n: u8) -> MockNodeBuilder {
        (1..=n).fold(MockNode::builder(), |b, i| {
            b.with_tx(hash(i), Some(hash(100 + i)))
                .with_revert_rate(hash(100 + i), Some(f64::from(i) / 100.0))
        })
    }

    #[tokio::test]
    async fn empty_batch_makes_no_calls() {
        let rpc = Arc::new(MockNode::builder().build());
        let mut batch: Vec<TokenTransferEvent> = Vec::new();
        enricher(Arc::clone(&rpc), 3).enrich(&mut batch).await.unwrap();
        assert!(batch.is_empty());
        assert!(rpc.calls().is_empty());
    }

    #[tokio::test]
    async fn all_success_fills_every_record_in_order() {
        let rpc = Arc::new(mined_node(5).build());
        let mut batch: Vec<_> = (1..=5).map(event).collect();

        enricher(Arc::clone(&rpc), 2).enrich(&mut batch).await.unwrap();

        assert_eq!(batch.len(), 5);
        for (i, record) in (1u8..).zip(&batch) {
            assert_eq!(record.transaction_hash, hash(i));
            assert_eq!(record.block_hash, Some(hash(100 + i)));
            assert_eq!(record.revert_rate, Some(f64::from(i) / 100.0));
        }
    }

    #[tokio::test]
    async fn unmined_transaction_is_not_a_failure() {
        let rpc = Arc::new(
            mined_node(2)
                .with_tx(hash(3), None)
                .build(),
        );
        let mut batch: Vec<_> = (1..=3).map(event).collect();

        enricher(Arc::clone(&rpc), 3).enrich(&mut batch).await.unwrap();

        assert!(batch[2].block_hash.is_none());
        assert!(batch[2].revert_rate.is_none());
        assert!(batch[0].block_hash.is_some());
        assert_eq!(rpc.calls_to("get_block_revert_rate_by_hash").len(), 2);
    }

    #[tokio::test]
    async fn block_lookup_failure_skips_confidence_and_leaves_record_untouched() {
        let rpc = Arc::new(mined_node(2).failing_tx(hash(2), "node busy").build());
        let mut batch: Vec<_> = (1..=2).map(event).collect();

        let err = enricher(Arc::clone(&rpc), 2)
            .enrich(&mut batch)
            .await
            .unwrap_err();

        let CoreError::BatchEnrichmentFailed(items) = &err else {
            panic!("expected aggregated failure, got {err:?}");
        };
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].index, 1);
        assert!(items[0]
            .message
            .starts_with(&format!("resolve block for tx {}", hex_of(hash(2)))));
        assert!(items[0].message.contains("node busy"));
        assert!(batch[1].block_hash.is_none());
        // Record 0 was still enriched in memory.
        assert!(batch[0].block_hash.is_some());
        let confidence_calls = rpc.calls_to("get_block_revert_rate_by_hash");
        assert_eq!(confidence_calls.len(), 1);
    }

    #[tokio::test]
    async fn confidence_failure_keeps_block_hash_and_names_tx() {
        let rpc = Arc::new(
            mined_node(3)
                .failing_block(hash(102), "risk unavailable")
                .build(),
        );
        let mut batch: Vec<_> = (1..=3).map(event).collect();

        let err = enricher(rpc, 3).enrich(&mut batch).await.unwrap_err();

        assert_eq!(batch[1].block_hash, Some(hash(102)));
        assert!(batch[1].revert_rate.is_none());
        let message = err.to_string();
        assert!(message.contains(&format!(
            "resolve confidence for block {}",
            hex_of(hash(102))
        )));
        assert!(message.contains(&hex_of(hash(2))));
        assert!(message.contains("risk unavailable"));
    }

    #[tokio::test]
    async fn unknown_transaction_is_a_failure() {
        let rpc = Arc::new(MockNode::builder().build());
        let mut batch = vec![event(9)];
        let err = enricher(rpc, 1).enrich(&mut batch).await.unwrap_err();
        assert!(err.to_string().contains("transaction not found"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn waves_are_three_three_one_and_never_overlap() {
        let rpc = Arc::new(
            mined_node(7)
                .with_delay(Duration::from_millis(40))
                .build(),
        );
        let mut batch: Vec<_> = (1..=7).map(event).collect();

        enricher(Arc::clone(&rpc), 3).enrich(&mut batch).await.unwrap();

        let calls = rpc.calls();
        let lookups: Vec<_> = calls.iter().filter(|c| c.method == TX_LOOKUP).collect();
        assert_eq!(lookups.len(), 7);
        assert!(rpc.max_in_flight() <= 3);

        let wave_of = |key: &str| {
            let pos = (1..=7u8)
                .position(|i| hex_of(hash(i)) == key)
                .expect("call for a batch record");
            pos / 3
        };
        let mut sizes = [0usize; 3];
        for call in &lookups {
            sizes[wave_of(&call.key)] += 1;
        }
        assert_eq!(sizes, [3, 3, 1]);

        // Every call of wave k (both lookups and confidence calls) finished
        // before any lookup of wave k+1 started.
        let block_wave = |key: &str| {
            (1..=7u8)
                .position(|i| hex_of(hash(100 + i)) == key)
                .map(|pos| pos / 3)
        };
        for later in &lookups {
            let w = wave_of(&later.key);
            for earlier in &calls {
                let earlier_wave = if earlier.method == TX_LOOKUP {
                    Some(wave_of(&earlier.key))
                } else {
                    block_wave(&earlier.key)
                };
                if earlier_wave.is_some_and(|e| e < w) {
                    assert!(
                        earlier.finished <= later.started,
                        "wave {w} started before wave {:?} finished",
                        earlier_wave
                    );
                }
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn waves_respect_concurrency_ceiling_for_large_batches() {
        let rpc = Arc::new(
            mined_node(40)
                .with_delay(Duration::from_millis(5))
                .build(),
        );
        let mut batch: Vec<_> = (1..=40).map(event).collect();

        enricher(Arc::clone(&rpc), 4).enrich(&mut batch).await.unwrap();

        assert!(rpc.max_in_flight() <= 4);
        assert!(batch.iter().all(|r| r.block_hash.is_some()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn streaming_schedule_respects_ceiling_and_completes() {
        let rpc = Arc::new(
            mined_node(20)
                .with_delay(Duration::from_millis(5))
                .build(),
        );
        let mut batch: Vec<_> = (1..=20).map(event).collect();
        let config = EnrichConfig::new(3)
            .unwrap()
            .with_schedule(Schedule::Streaming);

        BatchEnricher::new(Arc::clone(&rpc) as Arc<dyn NodeRpc>, config)
            .enrich(&mut batch)
            .await
            .unwrap();

        assert!(rpc.max_in_flight() <= 3);
        assert_eq!(rpc.calls_to(TX_LOOKUP).len(), 20);
        for (i, record) in (1u8..).zip(&batch) {
            assert_eq!(record.block_hash, Some(hash(100 + i)));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_failures_are_never_lost() {
        let n = 12u8;
        for _ in 0..20 {
            let rpc = Arc::new(
                (1..=n)
                    .fold(MockNode::builder(), |b, i| b.failing_tx(hash(i), "boom"))
                    .with_delay(Duration::from_millis(1))
                    .build(),
            );
            let mut batch: Vec<_> = (1..=n).map(event).collect();

            let err = enricher(rpc, 4).enrich(&mut batch).await.unwrap_err();

            let CoreError::BatchEnrichmentFailed(items) = err else {
                panic!("expected aggregated failure");
            };
            assert_eq!(items.len(), usize::from(n));
            let indexes: Vec<usize> = items.iter().map(|i| i.index).collect();
            assert_eq!(indexes, (0..usize::from(n)).collect::<Vec<_>>());
            let mut messages: Vec<&str> = items.iter().map(|i| i.message.as_str()).collect();
            messages.dedup();
            assert_eq!(messages.len(), usize::from(n));
        }
    }

    #[tokio::test]
    async fn duplicate_hashes_are_attributed_by_position() {
        let rpc = Arc::new(MockNode::builder().failing_tx(hash(1), "gone").build());
        let mut batch = vec![event(1), event(1)];

        let err = enricher(rpc, 2).enrich(&mut batch).await.unwrap_err();

        let CoreError::BatchEnrichmentFailed(items) = err else {
            panic!("expected aggregated failure");
        };
        assert_eq!(items.iter().map(|i| i.index).collect::<Vec<_>>(), [0, 1]);
    }

    #[tokio::test]
    async fn slow_calls_time_out_per_item() {
        let rpc = Arc::new(
            mined_node(2)
                .with_delay(Duration::from_millis(200))
                .build(),
        );
        let mut batch: Vec<_> = (1..=2).map(event).collect();
        let config = EnrichConfig::new(2)
            .unwrap()
            .with_call_timeout(Duration::from_millis(20))
            .unwrap();

        let err = BatchEnricher::new(rpc, config)
            .enrich(&mut batch)
            .await
            .unwrap_err();

        let CoreError::BatchEnrichmentFailed(items) = err else {
            panic!("expected aggregated failure");
        };
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.message.contains("timed out")));
    }

    #[tokio::test]
    async fn dropping_enrich_aborts_outstanding_calls() {
        let rpc = Arc::new(
            mined_node(4)
                .with_delay(Duration::from_millis(100))
                .build(),
        );
        let mut batch: Vec<_> = (1..=4).map(event).collect();
        let enricher = enricher(Arc::clone(&rpc), 4);

        let outcome =
            tokio::time::timeout(Duration::from_millis(20), enricher.enrich(&mut batch)).await;
        assert!(outcome.is_err(), "enrichment must still be running");

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(rpc.calls_to(TX_LOOKUP).is_empty());
        assert!(rpc.calls_to("get_block_revert_rate_by_hash").is_empty());
        assert!(batch.iter().all(|r| r.block_hash.is_none()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn panicking_tasks_are_blamed_on_their_own_records() {
        for schedule in [Schedule::Waves, Schedule::Streaming] {
            let rpc = Arc::new(
                mined_node(6)
                    .panicking_tx(hash(2), "lookup 2 exploded")
                    .panicking_tx(hash(5), "lookup 5 exploded")
                    .with_delay(Duration::from_millis(2))
                    .build(),
            );
            let mut batch: Vec<_> = (1..=6).map(event).collect();
            let config = EnrichConfig::new(3).unwrap().with_schedule(schedule);

            let err = BatchEnricher::new(rpc, config)
                .enrich(&mut batch)
                .await
                .unwrap_err();

            let CoreError::BatchEnrichmentFailed(items) = err else {
                panic!("expected aggregated failure");
            };
            assert_eq!(items.iter().map(|i| i.index).collect::<Vec<_>>(), [1, 4]);
            assert_eq!(items[0].tx_hash, hash(2));
            assert!(items[0].message.contains("lookup 2 exploded"));
            assert!(items[0].message.contains(&hex_of(hash(2))));
            assert!(items[1].message.contains("lookup 5 exploded"));
            assert!(batch[0].block_hash.is_some());
            assert!(batch[5].block_hash.is_some());
        }
    }
}
