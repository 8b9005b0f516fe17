use crate::classifier::{Classification, ContractClassifier, TokenCandidate};
use crate::network::Network;
use crate::repository::{Database, PersistedToken, TokenRepository, UpsertOutcome};
use crate::risk;
use crate::rpc::ChainRpc;
use crate::tracker::{ConfirmationTracker, TokenKey};
use anyhow::Result;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub network: Network,
    pub confirmation_depth: u64,
    pub poll_interval: Duration,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    pub failure_threshold: u32,
}

/// Per-network polling loop. Owns its own RPC client, tracker, and database
/// connection so one network's trouble never touches the other's task.
pub struct ChainMonitor<R> {
    rpc: R,
    classifier: ContractClassifier<R>,
    tracker: ConfirmationTracker,
    db: Database,
    config: MonitorConfig,
    last_processed: Option<u64>,
}

/// Bounded exponential backoff: base * 2^(failures-1), capped.
pub(crate) fn backoff_delay(base: Duration, cap: Duration, failures: u32) -> Duration {
    let shift = failures.saturating_sub(1).min(16);
    base.saturating_mul(1u32 << shift).min(cap)
}

/// Sleeps for `period`, or returns true immediately on shutdown.
async fn wait_or_cancelled(cancel: &CancellationToken, period: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => true,
        _ = sleep(period) => false,
    }
}

impl<R: ChainRpc + Clone> ChainMonitor<R> {
    pub fn new(rpc: R, db: Database, config: MonitorConfig) -> Self {
        ChainMonitor {
            classifier: ContractClassifier::new(rpc.clone(), config.network),
            tracker: ConfirmationTracker::new(config.confirmation_depth),
            rpc,
            db,
            config,
            last_processed: None,
        }
    }

    /// Runs until cancelled. Poll failures escalate only to longer waits;
    /// nothing here terminates the loop except shutdown.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!("[{}] starting chain monitor", self.config.network);
        let mut failures = 0u32;

        while !cancel.is_cancelled() {
            let wait = match self.poll_once().await {
                Ok(()) => {
                    failures = 0;
                    self.config.poll_interval
                }
                Err(e) => {
                    let wait = self.next_backoff(&mut failures);
                    warn!(
                        "[{}] poll failed ({e}); backing off {}s",
                        self.config.network,
                        wait.as_secs()
                    );
                    wait
                }
            };

            if wait_or_cancelled(&cancel, wait).await {
                break;
            }
        }

        info!("[{}] chain monitor stopped", self.config.network);
    }

    /// Wait for the next attempt after a failed poll. Once the consecutive
    /// failure count reaches the threshold, sustained outage is treated as
    /// a steady state: flat cap wait and the counter starts over.
    fn next_backoff(&self, failures: &mut u32) -> Duration {
        *failures += 1;
        if *failures >= self.config.failure_threshold {
            warn!(
                "[{}] {} consecutive poll failures, holding at {}s between attempts",
                self.config.network,
                *failures,
                self.config.backoff_cap.as_secs()
            );
            *failures = 0;
            return self.config.backoff_cap;
        }
        backoff_delay(self.config.backoff_base, self.config.backoff_cap, *failures)
    }

    /// One poll cycle: advance over new blocks, then sweep pending
    /// confirmations. A block that fails to process is logged and skipped;
    /// the watermark still advances to the swept head.
    async fn poll_once(&mut self) -> Result<()> {
        let head = self.rpc.head_block_number().await?;

        let last = match self.last_processed {
            Some(last) => last,
            None => {
                // watch for new deployments from here on; no backfill
                info!(
                    "[{}] starting at current head block {head}",
                    self.config.network
                );
                self.last_processed = Some(head);
                head
            }
        };

        if head > last {
            for number in last + 1..=head {
                if let Err(e) = self.process_block(number, head).await {
                    warn!(
                        "[{}] failed to process block {number}, skipping: {e}",
                        self.config.network
                    );
                }
            }
            self.last_processed = Some(head);
        }

        self.sweep_confirmations(head);
        Ok(())
    }

    async fn process_block(&mut self, number: u64, head: u64) -> Result<()> {
        let Some(block) = self.rpc.block_with_transactions(number).await? else {
            debug!(
                "[{}] block {number} not available yet",
                self.config.network
            );
            return Ok(());
        };

        debug!(
            "[{}] processing block {number} ({} txs)",
            self.config.network,
            block.transactions.len()
        );

        for tx in block.transactions.iter().filter(|tx| tx.to.is_none()) {
            match self.classifier.classify_creation(tx.hash).await {
                Classification::NotCreation => {}
                Classification::NotToken { contract } => {
                    debug!(
                        "[{}] contract {contract:?} is not a token, discarding",
                        self.config.network
                    );
                }
                Classification::Token { contract, metadata } => {
                    let creator = self.classifier.transaction_sender(tx.hash).await;
                    let candidate = TokenCandidate {
                        address: contract,
                        network: self.config.network,
                        block_number: number,
                        tx_hash: tx.hash,
                        creator,
                        metadata,
                    };
                    self.record_candidate(&candidate, head)?;
                }
            }
        }

        Ok(())
    }

    fn record_candidate(&mut self, candidate: &TokenCandidate, head: u64) -> Result<()> {
        let confirmed = self.tracker.confirmed_at(candidate.block_number, head);
        let row = PersistedToken::from_candidate(
            candidate,
            confirmed,
            chrono::Utc::now().timestamp(),
            risk::score(&candidate.metadata),
        );

        let repo = TokenRepository::new(&self.db.conn);
        match repo.upsert_candidate(&row)? {
            UpsertOutcome::Inserted => info!(
                "[{}] recorded token {} ({}) at {:?}, block {}, confirmed={confirmed}, risk={}",
                self.config.network,
                row.name.as_deref().unwrap_or("Unknown"),
                row.symbol.as_deref().unwrap_or("N/A"),
                row.address,
                row.block_number,
                row.risk_score
            ),
            UpsertOutcome::AlreadyKnown => debug!(
                "[{}] token {:?} already recorded",
                self.config.network, row.address
            ),
        }

        if !confirmed {
            self.tracker.track(
                TokenKey {
                    address: candidate.address,
                    network: candidate.network,
                },
                candidate.block_number,
            );
        }
        Ok(())
    }

    /// Promotes every pending entry that reached the confirmation depth.
    /// An entry leaves the tracker only after the confirm write succeeds.
    fn sweep_confirmations(&mut self, head: u64) {
        let ripe = self.tracker.ripe(head);
        if ripe.is_empty() {
            return;
        }

        let repo = TokenRepository::new(&self.db.conn);
        for key in ripe {
            match repo.confirm_token(&key.address, key.network) {
                Ok(true) => info!(
                    "[{}] confirmed token {:?} at head {head}",
                    self.config.network, key.address
                ),
                Ok(false) => debug!(
                    "[{}] token {:?} was already confirmed",
                    self.config.network, key.address
                ),
                Err(e) => {
                    warn!(
                        "[{}] failed to confirm {:?}, keeping it pending: {e}",
                        self.config.network, key.address
                    );
                    continue;
                }
            }
            self.tracker.remove(&key);
        }
    }
}
