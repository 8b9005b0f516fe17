use super::models::PersistedToken;
use crate::network::Network;
use alloy_primitives::{Address, B256, U256};
use anyhow::Result;
use rusqlite::{OptionalExtension, Row, ToSql, params, params_from_iter};
use std::str::FromStr;

/// Whether an upsert created a new row or hit an already-known token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    AlreadyKnown,
}

#[derive(Debug)]
pub struct TokenStats {
    pub total_tokens: u64,
    pub tokens_last_24h: u64,
    pub tokens_last_hour: u64,
    pub by_network: Vec<(String, u64)>,
    pub hourly: Vec<HourlyCount>,
}

#[derive(Debug, Clone, Copy)]
pub struct HourlyCount {
    pub hour_start: i64,
    pub count: u64,
}

pub struct TokenRepository<'a> {
    conn: &'a rusqlite::Connection,
}

impl<'a> TokenRepository<'a> {
    // The ON CONFLICT clause makes insert races between writers degrade to
    // the confirmed-OR update instead of an error.
    const INSERT_TOKEN: &'static str = "INSERT INTO tokens (
            address, network, block_number, detected_at, name, symbol,
            decimals, total_supply, creator_address, tx_hash,
            confirmed, is_verified, risk_score
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        ON CONFLICT(address, network)
        DO UPDATE SET confirmed = tokens.confirmed OR excluded.confirmed";

    const SELECT_CONFIRMED: &'static str =
        "SELECT confirmed FROM tokens WHERE address = ?1 AND network = ?2";

    const MERGE_CONFIRMED: &'static str =
        "UPDATE tokens SET confirmed = confirmed OR ?3 WHERE address = ?1 AND network = ?2";

    const CONFIRM_TOKEN: &'static str =
        "UPDATE tokens SET confirmed = 1 WHERE address = ?1 AND network = ?2 AND confirmed = 0";

    const SELECT_TOKEN: &'static str = "SELECT address, network, block_number, detected_at, \
         name, symbol, decimals, total_supply, creator_address, tx_hash, \
         confirmed, is_verified, risk_score FROM tokens";

    pub fn new(conn: &'a rusqlite::Connection) -> Self {
        Self { conn }
    }

    /// Idempotent by (address, network): the first write inserts the full
    /// record, every later one only merges the confirmed flag and leaves
    /// the stored metadata untouched.
    pub fn upsert_candidate(&self, token: &PersistedToken) -> Result<UpsertOutcome> {
        let address = format!("{:?}", token.address);
        let network = token.network.as_str();

        let existing: Option<bool> = self
            .conn
            .query_row(Self::SELECT_CONFIRMED, params![address, network], |row| {
                row.get(0)
            })
            .optional()?;

        if existing.is_some() {
            self.conn.execute(
                Self::MERGE_CONFIRMED,
                params![address, network, token.confirmed],
            )?;
            return Ok(UpsertOutcome::AlreadyKnown);
        }

        self.conn.execute(
            Self::INSERT_TOKEN,
            params![
                address,
                network,
                token.block_number,
                token.detected_at,
                token.name,
                token.symbol,
                token.decimals,
                token.total_supply.map(|supply| supply.to_string()),
                token.creator_address.map(|creator| format!("{creator:?}")),
                format!("{:?}", token.tx_hash),
                token.confirmed,
                token.is_verified,
                token.risk_score,
            ],
        )?;
        Ok(UpsertOutcome::Inserted)
    }

    /// Flips `confirmed` to true; returns whether a row actually changed.
    pub fn confirm_token(&self, address: &Address, network: Network) -> Result<bool> {
        let changed = self.conn.execute(
            Self::CONFIRM_TOKEN,
            params![format!("{address:?}"), network.as_str()],
        )?;
        Ok(changed > 0)
    }

    pub fn find_by_address(
        &self,
        address: &Address,
        network: Network,
    ) -> Result<Option<PersistedToken>> {
        let query = format!("{} WHERE address = ?1 AND network = ?2", Self::SELECT_TOKEN);
        let token = self
            .conn
            .query_row(
                &query,
                params![format!("{address:?}"), network.as_str()],
                Self::row_to_token,
            )
            .optional()?;
        Ok(token)
    }

    pub fn recent_tokens(
        &self,
        network: Option<Network>,
        confirmed_only: bool,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<PersistedToken>> {
        let mut query = Self::SELECT_TOKEN.to_string();
        let mut conditions: Vec<&str> = Vec::new();
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(network) = network {
            conditions.push("network = ?");
            params.push(Box::new(network.as_str()));
        }

        if confirmed_only {
            conditions.push("confirmed = 1");
        }

        if !conditions.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&conditions.join(" AND "));
        }

        query.push_str(&format!(
            " ORDER BY detected_at DESC, id DESC LIMIT {limit} OFFSET {offset}"
        ));

        let mut stmt = self.conn.prepare(&query)?;
        let tokens = stmt
            .query_map(params_from_iter(params), Self::row_to_token)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tokens)
    }

    /// Newest tokens that tripped at least one risk heuristic.
    pub fn recent_alerts(&self, limit: usize) -> Result<Vec<PersistedToken>> {
        let query = format!(
            "{} WHERE risk_score > 0 ORDER BY detected_at DESC, id DESC LIMIT {limit}",
            Self::SELECT_TOKEN
        );
        let mut stmt = self.conn.prepare(&query)?;
        let tokens = stmt
            .query_map([], Self::row_to_token)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tokens)
    }

    pub fn stats(&self, now: i64) -> Result<TokenStats> {
        let total_tokens: u64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM tokens", [], |row| row.get(0))?;

        let tokens_last_24h: u64 = self.conn.query_row(
            "SELECT COUNT(*) FROM tokens WHERE detected_at >= ?1",
            params![now - 86_400],
            |row| row.get(0),
        )?;

        let tokens_last_hour: u64 = self.conn.query_row(
            "SELECT COUNT(*) FROM tokens WHERE detected_at >= ?1",
            params![now - 3_600],
            |row| row.get(0),
        )?;

        let mut stmt = self
            .conn
            .prepare("SELECT network, COUNT(*) FROM tokens GROUP BY network ORDER BY network")?;
        let by_network = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<(String, u64)>, _>>()?;

        let start = now - 86_400;
        let mut counts = [0u64; 24];
        let mut stmt = self.conn.prepare(
            "SELECT (detected_at - ?1) / 3600, COUNT(*) FROM tokens
             WHERE detected_at >= ?1 AND detected_at <= ?2
             GROUP BY 1",
        )?;
        let buckets = stmt
            .query_map(params![start, now], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, u64>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        for (bucket, count) in buckets {
            let index = bucket.clamp(0, 23) as usize;
            counts[index] += count;
        }
        let hourly = counts
            .iter()
            .enumerate()
            .map(|(i, &count)| HourlyCount {
                hour_start: start + (i as i64) * 3_600,
                count,
            })
            .collect();

        Ok(TokenStats {
            total_tokens,
            tokens_last_24h,
            tokens_last_hour,
            by_network,
            hourly,
        })
    }

    fn row_to_token(row: &Row) -> rusqlite::Result<PersistedToken> {
        let address = Address::from_str(&row.get::<_, String>(0)?).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;

        let network = Network::from_str(&row.get::<_, String>(1)?).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, e.into())
        })?;

        let total_supply = row
            .get::<_, Option<String>>(7)?
            .map(|supply| {
                U256::from_str(&supply).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        7,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })
            })
            .transpose()?;

        let creator_address = row
            .get::<_, Option<String>>(8)?
            .map(|creator| {
                Address::from_str(&creator).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        8,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })
            })
            .transpose()?;

        let tx_hash = B256::from_str(&row.get::<_, String>(9)?).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(9, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(PersistedToken {
            address,
            network,
            block_number: row.get(2)?,
            detected_at: row.get(3)?,
            name: row.get(4)?,
            symbol: row.get(5)?,
            decimals: row.get(6)?,
            total_supply,
            creator_address,
            tx_hash,
            confirmed: row.get(10)?,
            is_verified: row.get(11)?,
            risk_score: row.get(12)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::Database;

    fn sample_token(byte: u8, network: Network) -> PersistedToken {
        PersistedToken {
            address: Address::repeat_byte(byte),
            network,
            block_number: 1_000,
            detected_at: 1_700_000_000,
            name: Some("Test Token".into()),
            symbol: Some("TEST".into()),
            decimals: Some(18),
            total_supply: Some(U256::from(1_000_000u64)),
            creator_address: Some(Address::repeat_byte(0xAA)),
            tx_hash: B256::repeat_byte(byte),
            confirmed: false,
            is_verified: false,
            risk_score: 0,
        }
    }

    fn count(db: &Database) -> u64 {
        db.conn
            .query_row("SELECT COUNT(*) FROM tokens", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn duplicate_detections_leave_exactly_one_row() {
        let db = Database::in_memory().unwrap();
        let repo = TokenRepository::new(&db.conn);
        let token = sample_token(1, Network::Eth);

        assert_eq!(
            repo.upsert_candidate(&token).unwrap(),
            UpsertOutcome::Inserted
        );
        assert_eq!(
            repo.upsert_candidate(&token).unwrap(),
            UpsertOutcome::AlreadyKnown
        );
        assert_eq!(count(&db), 1);
    }

    #[test]
    fn confirmed_never_reverts_to_false() {
        let db = Database::in_memory().unwrap();
        let repo = TokenRepository::new(&db.conn);

        let mut token = sample_token(1, Network::Eth);
        token.confirmed = true;
        repo.upsert_candidate(&token).unwrap();

        token.confirmed = false;
        repo.upsert_candidate(&token).unwrap();

        let stored = repo
            .find_by_address(&token.address, Network::Eth)
            .unwrap()
            .unwrap();
        assert!(stored.confirmed);
    }

    #[test]
    fn upsert_of_known_token_leaves_metadata_untouched() {
        let db = Database::in_memory().unwrap();
        let repo = TokenRepository::new(&db.conn);

        let token = sample_token(1, Network::Eth);
        repo.upsert_candidate(&token).unwrap();

        let mut rewrite = token.clone();
        rewrite.name = Some("Imposter".into());
        rewrite.block_number = 9_999;
        repo.upsert_candidate(&rewrite).unwrap();

        let stored = repo
            .find_by_address(&token.address, Network::Eth)
            .unwrap()
            .unwrap();
        assert_eq!(stored.name.as_deref(), Some("Test Token"));
        assert_eq!(stored.block_number, 1_000);
    }

    #[test]
    fn confirm_token_flips_once_then_noops() {
        let db = Database::in_memory().unwrap();
        let repo = TokenRepository::new(&db.conn);
        let token = sample_token(1, Network::Eth);
        repo.upsert_candidate(&token).unwrap();

        assert!(repo.confirm_token(&token.address, Network::Eth).unwrap());
        assert!(!repo.confirm_token(&token.address, Network::Eth).unwrap());

        let stored = repo
            .find_by_address(&token.address, Network::Eth)
            .unwrap()
            .unwrap();
        assert!(stored.confirmed);
    }

    #[test]
    fn same_address_on_both_networks_is_two_rows() {
        let db = Database::in_memory().unwrap();
        let repo = TokenRepository::new(&db.conn);

        repo.upsert_candidate(&sample_token(1, Network::Eth))
            .unwrap();
        repo.upsert_candidate(&sample_token(1, Network::Bsc))
            .unwrap();

        assert_eq!(count(&db), 2);
    }

    #[test]
    fn recent_tokens_filters_unconfirmed_and_network() {
        let db = Database::in_memory().unwrap();
        let repo = TokenRepository::new(&db.conn);

        let mut confirmed_eth = sample_token(1, Network::Eth);
        confirmed_eth.confirmed = true;
        repo.upsert_candidate(&confirmed_eth).unwrap();

        let mut confirmed_bsc = sample_token(2, Network::Bsc);
        confirmed_bsc.confirmed = true;
        repo.upsert_candidate(&confirmed_bsc).unwrap();

        repo.upsert_candidate(&sample_token(3, Network::Eth))
            .unwrap();

        let confirmed = repo.recent_tokens(None, true, 10, 0).unwrap();
        assert_eq!(confirmed.len(), 2);

        let eth_only = repo.recent_tokens(Some(Network::Eth), true, 10, 0).unwrap();
        assert_eq!(eth_only.len(), 1);
        assert_eq!(eth_only[0].address, confirmed_eth.address);

        let everything = repo.recent_tokens(None, false, 10, 0).unwrap();
        assert_eq!(everything.len(), 3);
    }

    #[test]
    fn alerts_only_cover_nonzero_risk() {
        let db = Database::in_memory().unwrap();
        let repo = TokenRepository::new(&db.conn);

        repo.upsert_candidate(&sample_token(1, Network::Eth))
            .unwrap();
        let mut risky = sample_token(2, Network::Eth);
        risky.risk_score = 4;
        repo.upsert_candidate(&risky).unwrap();

        let alerts = repo.recent_alerts(10).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].risk_score, 4);
    }

    #[test]
    fn stats_count_time_windows_and_networks() {
        let db = Database::in_memory().unwrap();
        let repo = TokenRepository::new(&db.conn);
        let now = 1_700_000_000;

        let mut fresh = sample_token(1, Network::Eth);
        fresh.detected_at = now - 600;
        repo.upsert_candidate(&fresh).unwrap();

        let mut yesterday = sample_token(2, Network::Bsc);
        yesterday.detected_at = now - 20 * 3_600;
        repo.upsert_candidate(&yesterday).unwrap();

        let mut ancient = sample_token(3, Network::Eth);
        ancient.detected_at = now - 10 * 86_400;
        repo.upsert_candidate(&ancient).unwrap();

        let stats = repo.stats(now).unwrap();
        assert_eq!(stats.total_tokens, 3);
        assert_eq!(stats.tokens_last_24h, 2);
        assert_eq!(stats.tokens_last_hour, 1);
        assert_eq!(stats.by_network, vec![("BSC".into(), 1), ("ETH".into(), 2)]);
        assert_eq!(stats.hourly.len(), 24);
        assert_eq!(stats.hourly.iter().map(|h| h.count).sum::<u64>(), 2);
        assert_eq!(stats.hourly[23].count, 1);
    }

    #[test]
    fn round_trips_every_column() {
        let db = Database::in_memory().unwrap();
        let repo = TokenRepository::new(&db.conn);

        let mut token = sample_token(7, Network::Bsc);
        token.decimals = None;
        token.total_supply = Some(U256::from(10u64).pow(U256::from(24u64)));
        token.creator_address = None;
        token.risk_score = 8;
        repo.upsert_candidate(&token).unwrap();

        let stored = repo
            .find_by_address(&token.address, Network::Bsc)
            .unwrap()
            .unwrap();
        assert_eq!(stored.address, token.address);
        assert_eq!(stored.network, Network::Bsc);
        assert_eq!(stored.decimals, None);
        assert_eq!(stored.total_supply, token.total_supply);
        assert_eq!(stored.creator_address, None);
        assert_eq!(stored.tx_hash, token.tx_hash);
        assert_eq!(stored.risk_score, 8);
    }
}
