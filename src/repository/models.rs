use crate::classifier::TokenCandidate;
use crate::network::Network;
use alloy_primitives::{Address, B256, U256};

/// One row of the `tokens` table. Metadata is frozen at detection time;
/// only `confirmed` is ever mutated afterwards, and only from false to
/// true.
#[derive(Debug, Clone)]
pub struct PersistedToken {
    pub address: Address,
    pub network: Network,
    pub block_number: u64,
    pub detected_at: i64,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub decimals: Option<u8>,
    pub total_supply: Option<U256>,
    pub creator_address: Option<Address>,
    pub tx_hash: B256,
    pub confirmed: bool,
    pub is_verified: bool,
    pub risk_score: u8,
}

impl PersistedToken {
    pub fn from_candidate(
        candidate: &TokenCandidate,
        confirmed: bool,
        detected_at: i64,
        risk_score: u8,
    ) -> Self {
        PersistedToken {
            address: candidate.address,
            network: candidate.network,
            block_number: candidate.block_number,
            detected_at,
            name: candidate.metadata.name.clone(),
            symbol: candidate.metadata.symbol.clone(),
            decimals: candidate.metadata.decimals,
            total_supply: candidate.metadata.total_supply,
            creator_address: candidate.creator,
            tx_hash: candidate.tx_hash,
            confirmed,
            is_verified: false,
            risk_score,
        }
    }
}
