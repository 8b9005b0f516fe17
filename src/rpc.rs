use crate::erc20::Erc20;
use alloy::consensus::Transaction;
use alloy::network::TransactionResponse;
use alloy::providers::fillers::FillProvider;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{BlockNumberOrTag, TransactionRequest};
use alloy::sol_types::SolCall;
use alloy::transports::TransportResult;
use alloy_primitives::{Address, B256, U256};
use anyhow::{Context, Result};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::timeout;
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, warn};

type AlloyFullProvider = FillProvider<
    alloy::providers::fillers::JoinFill<
        alloy::providers::Identity,
        alloy::providers::fillers::JoinFill<
            alloy::providers::fillers::GasFiller,
            alloy::providers::fillers::JoinFill<
                alloy::providers::fillers::BlobGasFiller,
                alloy::providers::fillers::JoinFill<
                    alloy::providers::fillers::NonceFiller,
                    alloy::providers::fillers::ChainIdFiller,
                >,
            >,
        >,
    >,
    alloy::providers::RootProvider,
>;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Failure of a contract view call. `Reverted` means the node answered and
/// the contract rejected the call (or returned garbage); `Transport` means
/// the node never produced a usable answer.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CallError {
    #[error("contract call rejected: {0}")]
    Reverted(String),
    #[error("transport failure: {0}")]
    Transport(String),
}

/// One transaction of a fetched block, reduced to the fields the scanner
/// looks at. `to == None` is the contract-creation shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxSummary {
    pub hash: B256,
    pub to: Option<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSummary {
    pub number: u64,
    pub transactions: Vec<TxSummary>,
}

/// Chain reads consumed by the monitor and the classifier. Plain reads are
/// retried inside the implementation; token view calls are single-attempt
/// and report a tagged [`CallError`] so the classifier can decide what is
/// retryable.
#[allow(async_fn_in_trait)]
pub trait ChainRpc {
    async fn head_block_number(&self) -> Result<u64>;
    async fn block_with_transactions(&self, number: u64) -> Result<Option<BlockSummary>>;
    async fn receipt_contract_address(&self, hash: B256) -> Result<Option<Address>>;
    async fn transaction_sender(&self, hash: B256) -> Result<Option<Address>>;
    async fn token_name(&self, contract: Address) -> Result<String, CallError>;
    async fn token_symbol(&self, contract: Address) -> Result<String, CallError>;
    async fn token_decimals(&self, contract: Address) -> Result<u8, CallError>;
    async fn token_total_supply(&self, contract: Address) -> Result<U256, CallError>;
}

#[derive(Clone)]
pub struct RpcClient {
    providers: Vec<AlloyFullProvider>,
    urls: Vec<String>,
    current_provider: Arc<AtomicUsize>,
    max_retries: usize,
    poa_compat: bool,
}

impl RpcClient {
    pub fn new(rpc_urls: &[String], poa_compat: bool) -> Result<Self> {
        if rpc_urls.is_empty() {
            return Err(anyhow::anyhow!("At least one RPC URL must be provided"));
        }

        let mut providers = Vec::new();
        for url in rpc_urls {
            let parsed_url = url
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid RPC URL: {}", url))?;
            let provider: AlloyFullProvider = ProviderBuilder::new().connect_http(parsed_url);
            providers.push(provider);
        }

        Ok(RpcClient {
            providers,
            urls: rpc_urls.to_vec(),
            current_provider: Arc::new(AtomicUsize::new(0)),
            max_retries: 5,
            poa_compat,
        })
    }

    fn provider(&self) -> &AlloyFullProvider {
        let index = self.current_provider.load(Ordering::Relaxed) % self.providers.len();
        &self.providers[index]
    }

    pub fn current_url(&self) -> &str {
        let index = self.current_provider.load(Ordering::Relaxed) % self.urls.len();
        &self.urls[index]
    }

    fn rotate_provider(&self) {
        let current = self.current_provider.load(Ordering::Relaxed);
        let next = (current + 1) % self.providers.len();
        self.current_provider.store(next, Ordering::Relaxed);

        if self.providers.len() > 1 {
            debug!("Rotating to RPC provider #{}", next);
        }
    }

    fn retry_strategy(&self) -> impl Iterator<Item = Duration> {
        ExponentialBackoff::from_millis(100)
            .factor(2)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.max_retries)
    }

    fn handle_error(&self, error_str: &str) {
        warn!(
            "RPC error on {}: {}, rotating provider",
            self.current_url(),
            error_str
        );
        self.rotate_provider();
    }

    fn handle_timeout(&self) -> anyhow::Error {
        warn!(
            "Request timeout after {} seconds on {}, rotating provider",
            REQUEST_TIMEOUT.as_secs(),
            self.current_url()
        );
        self.rotate_provider();
        anyhow::anyhow!(
            "Request timeout after {} seconds",
            REQUEST_TIMEOUT.as_secs()
        )
    }

    /// Retried, timeout-bounded wrapper for plain reads. Every failed
    /// attempt rotates to the next configured endpoint.
    async fn retry_read<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: Fn(AlloyFullProvider) -> Fut,
        Fut: Future<Output = TransportResult<T>>,
    {
        Retry::spawn(self.retry_strategy(), || {
            let future = operation(self.provider().clone());
            async move {
                match timeout(REQUEST_TIMEOUT, future).await {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(e)) => {
                        self.handle_error(&e.to_string());
                        Err(anyhow::anyhow!("{e}"))
                    }
                    Err(_) => Err(self.handle_timeout()),
                }
            }
        })
        .await
    }

    async fn typed_block(&self, number: u64) -> Result<Option<BlockSummary>> {
        let block = self
            .retry_read(|provider| async move {
                provider
                    .get_block_by_number(BlockNumberOrTag::Number(number))
                    .full()
                    .await
            })
            .await?;

        Ok(block.map(|block| BlockSummary {
            number,
            transactions: block
                .transactions
                .into_transactions()
                .map(|tx| TxSummary {
                    hash: tx.tx_hash(),
                    to: tx.to(),
                })
                .collect(),
        }))
    }

    /// Compatibility path for chains whose headers do not decode as
    /// standard consensus headers. Fetches the block as raw JSON and
    /// extracts only the fields the scanner uses.
    async fn lenient_block(&self, number: u64) -> Result<Option<BlockSummary>> {
        let tag = format!("0x{number:x}");
        let raw: Value = self
            .retry_read(|provider| {
                let tag = tag.clone();
                async move {
                    provider
                        .client()
                        .request("eth_getBlockByNumber", (tag, true))
                        .await
                }
            })
            .await?;

        decode_lenient_block(&raw)
    }

    async fn call_view<C: SolCall>(&self, to: Address, call: C) -> Result<C::Return, CallError> {
        let request = TransactionRequest::default()
            .to(to)
            .input(call.abi_encode().into());

        match timeout(REQUEST_TIMEOUT, self.provider().call(request)).await {
            Ok(Ok(data)) => C::abi_decode_returns(&data)
                .map_err(|e| CallError::Reverted(format!("undecodable return data: {e}"))),
            Ok(Err(e)) if e.as_error_resp().is_some() => Err(CallError::Reverted(e.to_string())),
            Ok(Err(e)) => {
                self.handle_error(&e.to_string());
                Err(CallError::Transport(e.to_string()))
            }
            Err(_) => {
                self.rotate_provider();
                Err(CallError::Transport(format!(
                    "request timed out after {} seconds",
                    REQUEST_TIMEOUT.as_secs()
                )))
            }
        }
    }
}

impl ChainRpc for RpcClient {
    async fn head_block_number(&self) -> Result<u64> {
        self.retry_read(|provider| async move { provider.get_block_number().await })
            .await
    }

    async fn block_with_transactions(&self, number: u64) -> Result<Option<BlockSummary>> {
        if self.poa_compat {
            self.lenient_block(number).await
        } else {
            self.typed_block(number).await
        }
    }

    async fn receipt_contract_address(&self, hash: B256) -> Result<Option<Address>> {
        let receipt = self
            .retry_read(|provider| async move { provider.get_transaction_receipt(hash).await })
            .await?;
        Ok(receipt.and_then(|receipt| receipt.contract_address))
    }

    async fn transaction_sender(&self, hash: B256) -> Result<Option<Address>> {
        let tx = self
            .retry_read(|provider| async move { provider.get_transaction_by_hash(hash).await })
            .await?;
        Ok(tx.map(|tx| tx.from()))
    }

    async fn token_name(&self, contract: Address) -> Result<String, CallError> {
        self.call_view(contract, Erc20::nameCall {}).await
    }

    async fn token_symbol(&self, contract: Address) -> Result<String, CallError> {
        self.call_view(contract, Erc20::symbolCall {}).await
    }

    async fn token_decimals(&self, contract: Address) -> Result<u8, CallError> {
        self.call_view(contract, Erc20::decimalsCall {}).await
    }

    async fn token_total_supply(&self, contract: Address) -> Result<U256, CallError> {
        self.call_view(contract, Erc20::totalSupplyCall {}).await
    }
}

fn decode_lenient_block(raw: &Value) -> Result<Option<BlockSummary>> {
    if raw.is_null() {
        return Ok(None);
    }

    let number_hex = raw
        .get("number")
        .and_then(Value::as_str)
        .context("block JSON is missing a number field")?;
    let number = u64::from_str_radix(number_hex.trim_start_matches("0x"), 16)
        .with_context(|| format!("invalid block number '{number_hex}'"))?;

    let mut transactions = Vec::new();
    if let Some(txs) = raw.get("transactions").and_then(Value::as_array) {
        for tx in txs {
            let Some(hash) = tx.get("hash").and_then(Value::as_str) else {
                // hash-only entries carry no recipient, nothing to scan
                continue;
            };
            let hash: B256 = match hash.parse() {
                Ok(hash) => hash,
                Err(e) => {
                    warn!("Skipping transaction with malformed hash {hash}: {e}");
                    continue;
                }
            };
            let to = match tx.get("to").and_then(Value::as_str) {
                Some(to) => match to.parse::<Address>() {
                    Ok(to) => Some(to),
                    Err(e) => {
                        warn!("Skipping transaction {hash} with malformed recipient: {e}");
                        continue;
                    }
                },
                None => None,
            };
            transactions.push(TxSummary { hash, to });
        }
    }

    Ok(Some(BlockSummary {
        number,
        transactions,
    }))
}

#[cfg(test)]
pub(crate) mod fake {
    //! Scripted in-memory chain used by classifier and monitor tests.

    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Clone, Default)]
    pub(crate) struct FakeToken {
        pub name: Option<String>,
        pub symbol: Option<String>,
        pub decimals: Option<u8>,
        pub total_supply: Option<U256>,
    }

    #[derive(Debug, Clone, Copy)]
    pub(crate) enum ReceiptScript {
        Created(Address),
        NoContract,
        Error,
    }

    #[derive(Default)]
    struct State {
        head: u64,
        blocks: HashMap<u64, BlockSummary>,
        receipts: HashMap<B256, ReceiptScript>,
        senders: HashMap<B256, Address>,
        tokens: HashMap<Address, FakeToken>,
        metadata_transport_failures: u32,
        metadata_calls: u32,
    }

    #[derive(Clone, Default)]
    pub(crate) struct FakeRpc {
        state: Arc<Mutex<State>>,
    }

    impl FakeRpc {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_head(&self, head: u64) {
            self.state.lock().unwrap().head = head;
        }

        pub fn add_block(&self, block: BlockSummary) {
            self.state
                .lock()
                .unwrap()
                .blocks
                .insert(block.number, block);
        }

        pub fn script_receipt(&self, hash: B256, script: ReceiptScript) {
            self.state.lock().unwrap().receipts.insert(hash, script);
        }

        pub fn set_sender(&self, hash: B256, sender: Address) {
            self.state.lock().unwrap().senders.insert(hash, sender);
        }

        pub fn deploy_token(&self, contract: Address, token: FakeToken) {
            self.state.lock().unwrap().tokens.insert(contract, token);
        }

        /// Makes the next `count` token view calls fail at the transport
        /// level, regardless of contract.
        pub fn fail_metadata_calls(&self, count: u32) {
            self.state.lock().unwrap().metadata_transport_failures = count;
        }

        pub fn metadata_calls(&self) -> u32 {
            self.state.lock().unwrap().metadata_calls
        }

        fn token_field<T>(
            &self,
            contract: Address,
            get: impl Fn(&FakeToken) -> Option<T>,
        ) -> Result<T, CallError> {
            let mut state = self.state.lock().unwrap();
            state.metadata_calls += 1;
            if state.metadata_transport_failures > 0 {
                state.metadata_transport_failures -= 1;
                return Err(CallError::Transport("injected transport failure".into()));
            }
            let token = state
                .tokens
                .get(&contract)
                .ok_or_else(|| CallError::Reverted("no code at address".into()))?;
            get(token).ok_or_else(|| CallError::Reverted("execution reverted".into()))
        }
    }

    impl ChainRpc for FakeRpc {
        async fn head_block_number(&self) -> Result<u64> {
            Ok(self.state.lock().unwrap().head)
        }

        async fn block_with_transactions(&self, number: u64) -> Result<Option<BlockSummary>> {
            Ok(self.state.lock().unwrap().blocks.get(&number).cloned())
        }

        async fn receipt_contract_address(&self, hash: B256) -> Result<Option<Address>> {
            match self.state.lock().unwrap().receipts.get(&hash) {
                Some(ReceiptScript::Created(address)) => Ok(Some(*address)),
                Some(ReceiptScript::NoContract) | None => Ok(None),
                Some(ReceiptScript::Error) => Err(anyhow::anyhow!("receipt lookup failed")),
            }
        }

        async fn transaction_sender(&self, hash: B256) -> Result<Option<Address>> {
            Ok(self.state.lock().unwrap().senders.get(&hash).copied())
        }

        async fn token_name(&self, contract: Address) -> Result<String, CallError> {
            self.token_field(contract, |token| token.name.clone())
        }

        async fn token_symbol(&self, contract: Address) -> Result<String, CallError> {
            self.token_field(contract, |token| token.symbol.clone())
        }

        async fn token_decimals(&self, contract: Address) -> Result<u8, CallError> {
            self.token_field(contract, |token| token.decimals)
        }

        async fn token_total_supply(&self, contract: Address) -> Result<U256, CallError> {
            self.token_field(contract, |token| token.total_supply)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lenient_decode_tolerates_nonstandard_header_fields() {
        let raw = json!({
            "number": "0x1b4",
            "extraData": "0xd883010b05846765746888676f312e32302e35856c696e7578000000000000b5",
            "difficulty": "0x2",
            "transactions": [
                {
                    "hash": "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b",
                    "to": "0x5df9b87991262f6ba471f09758cde1c0fc1de734"
                },
                {
                    "hash": "0x3a1fba5abd9d41457944abd85fd20d6a10c481d1ab16f0e756ba91c9e0f9e52b",
                    "to": null
                }
            ]
        });

        let block = decode_lenient_block(&raw).unwrap().unwrap();
        assert_eq!(block.number, 436);
        assert_eq!(block.transactions.len(), 2);
        assert!(block.transactions[0].to.is_some());
        assert!(block.transactions[1].to.is_none());
    }

    #[test]
    fn lenient_decode_maps_null_to_missing_block() {
        assert!(decode_lenient_block(&Value::Null).unwrap().is_none());
    }

    #[test]
    fn lenient_decode_skips_hash_only_transaction_lists() {
        let raw = json!({
            "number": "0xa",
            "transactions": ["0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b"]
        });

        let block = decode_lenient_block(&raw).unwrap().unwrap();
        assert!(block.transactions.is_empty());
    }

    #[test]
    fn lenient_decode_requires_a_block_number() {
        let raw = json!({ "transactions": [] });
        assert!(decode_lenient_block(&raw).is_err());
    }
}
