use crate::classifier::TokenMetadata;
use alloy_primitives::U256;

/// Heuristic risk score for a token candidate, computed once at detection
/// time. Deterministic and explicitly non-authoritative: tiny supply +3,
/// nonstandard decimals +1, missing name +2, missing symbol +2, capped
/// at 10.
pub fn score(metadata: &TokenMetadata) -> u8 {
    let mut score = 0u8;

    if let Some(supply) = metadata.total_supply {
        if supply < U256::from(1000u64) {
            score += 3;
        }
    }

    if let Some(decimals) = metadata.decimals {
        if decimals != 18 {
            score += 1;
        }
    }

    if metadata.name.is_none() {
        score += 2;
    }
    if metadata.symbol.is_none() {
        score += 2;
    }

    score.min(10)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_name_and_symbol_scores_four() {
        let metadata = TokenMetadata {
            name: None,
            symbol: None,
            decimals: Some(18),
            total_supply: Some(U256::from(10u64).pow(U256::from(24u64))),
        };
        assert_eq!(score(&metadata), 4);
    }

    #[test]
    fn tiny_supply_scores_three() {
        let metadata = TokenMetadata {
            name: Some("X".into()),
            symbol: Some("X".into()),
            decimals: Some(18),
            total_supply: Some(U256::from(500u64)),
        };
        assert_eq!(score(&metadata), 3);
    }

    #[test]
    fn every_heuristic_together_stays_within_bounds() {
        let metadata = TokenMetadata {
            name: None,
            symbol: None,
            decimals: Some(9),
            total_supply: Some(U256::from(1u64)),
        };
        assert_eq!(score(&metadata), 8);
    }

    #[test]
    fn absent_fields_trigger_no_supply_or_decimals_penalty() {
        let metadata = TokenMetadata {
            name: Some("Plain".into()),
            symbol: Some("PLN".into()),
            decimals: None,
            total_supply: None,
        };
        assert_eq!(score(&metadata), 0);
    }
}
