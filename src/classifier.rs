use crate::network::Network;
use crate::rpc::{CallError, ChainRpc};
use alloy_primitives::{Address, B256, U256};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

const METADATA_ATTEMPTS: u32 = 3;
const METADATA_BACKOFF_BASE: Duration = Duration::from_secs(1);
const METADATA_BACKOFF_CAP: Duration = Duration::from_secs(10);

/// The four optional fields read off a freshly deployed contract. A missing
/// field means the contract rejected that call, not that anything failed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenMetadata {
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub decimals: Option<u8>,
    pub total_supply: Option<U256>,
}

impl TokenMetadata {
    /// A contract counts as a token iff it exposes a name or a symbol.
    pub fn looks_like_token(&self) -> bool {
        self.name.is_some() || self.symbol.is_some()
    }
}

/// One detection event, built per creation transaction that classified as a
/// token. Never stored as-is; the persistence row is derived from it.
#[derive(Debug, Clone)]
pub struct TokenCandidate {
    pub address: Address,
    pub network: Network,
    pub block_number: u64,
    pub tx_hash: B256,
    pub creator: Option<Address>,
    pub metadata: TokenMetadata,
}

/// Outcome of inspecting a creation-shaped transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// The receipt yielded no contract address (or could not be read).
    NotCreation,
    /// A contract was created but it exposes neither name nor symbol.
    NotToken { contract: Address },
    Token {
        contract: Address,
        metadata: TokenMetadata,
    },
}

pub struct ContractClassifier<R> {
    rpc: R,
    network: Network,
}

impl<R: ChainRpc> ContractClassifier<R> {
    pub fn new(rpc: R, network: Network) -> Self {
        Self { rpc, network }
    }

    /// Resolves a creation-shaped transaction to a classification. Receipt
    /// lookup failures are absorbed as "not a creation" so a flaky receipt
    /// read never fails the surrounding block.
    pub async fn classify_creation(&self, tx_hash: B256) -> Classification {
        let contract = match self.rpc.receipt_contract_address(tx_hash).await {
            Ok(Some(contract)) => contract,
            Ok(None) => {
                debug!(
                    "[{}] receipt for {tx_hash:?} has no contract address",
                    self.network
                );
                return Classification::NotCreation;
            }
            Err(e) => {
                warn!(
                    "[{}] failed to read receipt for {tx_hash:?}: {e}",
                    self.network
                );
                return Classification::NotCreation;
            }
        };

        match self.fetch_metadata(contract).await {
            Some(metadata) => {
                info!(
                    "[{}] token detected: {} ({}) at {contract:?}",
                    self.network,
                    metadata.name.as_deref().unwrap_or("Unknown"),
                    metadata.symbol.as_deref().unwrap_or("N/A"),
                );
                Classification::Token { contract, metadata }
            }
            None => Classification::NotToken { contract },
        }
    }

    /// Fetches the four token fields, retrying the whole read up to three
    /// times when it fails in transit. A contract that merely rejects the
    /// calls is settled on the first attempt.
    pub async fn fetch_metadata(&self, contract: Address) -> Option<TokenMetadata> {
        let mut delay = METADATA_BACKOFF_BASE;
        for attempt in 1..=METADATA_ATTEMPTS {
            match self.fetch_metadata_once(contract).await {
                Ok(metadata) if metadata.looks_like_token() => return Some(metadata),
                Ok(_) => {
                    debug!(
                        "[{}] contract {contract:?} exposes no token metadata",
                        self.network
                    );
                    return None;
                }
                Err(e) => {
                    if attempt == METADATA_ATTEMPTS {
                        warn!(
                            "[{}] giving up on metadata for {contract:?} after {attempt} attempts: {e}",
                            self.network
                        );
                        return None;
                    }
                    warn!(
                        "[{}] metadata fetch for {contract:?} failed in transit (attempt {attempt}): {e}",
                        self.network
                    );
                    sleep(delay).await;
                    delay = (delay * 2).min(METADATA_BACKOFF_CAP);
                }
            }
        }
        None
    }

    /// Single pass over the four fields. Per-field rejections become `None`
    /// for that field alone; only all four failing in transit makes the
    /// whole read transient.
    async fn fetch_metadata_once(&self, contract: Address) -> Result<TokenMetadata, CallError> {
        let mut transport_failures = 0u32;

        let name = self.field(self.rpc.token_name(contract).await, "name", &mut transport_failures);
        let symbol = self.field(
            self.rpc.token_symbol(contract).await,
            "symbol",
            &mut transport_failures,
        );
        let decimals = self.field(
            self.rpc.token_decimals(contract).await,
            "decimals",
            &mut transport_failures,
        );
        let total_supply = self.field(
            self.rpc.token_total_supply(contract).await,
            "totalSupply",
            &mut transport_failures,
        );

        if transport_failures == 4 {
            return Err(CallError::Transport(
                "all metadata reads failed in transit".into(),
            ));
        }

        Ok(TokenMetadata {
            name,
            symbol,
            decimals,
            total_supply,
        })
    }

    fn field<T>(
        &self,
        result: Result<T, CallError>,
        field: &str,
        transport_failures: &mut u32,
    ) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(CallError::Reverted(e)) => {
                debug!("[{}] {field}() rejected: {e}", self.network);
                None
            }
            Err(CallError::Transport(e)) => {
                debug!("[{}] {field}() failed in transit: {e}", self.network);
                *transport_failures += 1;
                None
            }
        }
    }

    /// Resolves the creating transaction's sender for provenance. Failure
    /// leaves the creator unknown rather than failing the candidate.
    pub async fn transaction_sender(&self, tx_hash: B256) -> Option<Address> {
        match self.rpc.transaction_sender(tx_hash).await {
            Ok(sender) => sender,
            Err(e) => {
                warn!(
                    "[{}] failed to resolve sender of {tx_hash:?}: {e}",
                    self.network
                );
                None
            }
        }
    }
}
