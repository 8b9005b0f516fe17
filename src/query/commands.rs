use crate::network::Network;
use crate::query::formatters::{self, OutputFormat};
use crate::repository::TokenRepository;
use alloy_primitives::Address;
use anyhow::{Context, Result};
use std::str::FromStr;

const MAX_PAGE_SIZE: usize = 100;
const MAX_ALERT_LIMIT: usize = 50;

pub struct RecentQuery {
    pub page: usize,
    pub page_size: usize,
    pub network: Option<Network>,
    pub include_unconfirmed: bool,
}

pub fn cmd_recent(repo: &TokenRepository, query: &RecentQuery, format: &OutputFormat) -> Result<()> {
    let page = query.page.max(1);
    let page_size = query.page_size.clamp(1, MAX_PAGE_SIZE);
    let offset = (page - 1) * page_size;

    let tokens = repo.recent_tokens(
        query.network,
        !query.include_unconfirmed,
        page_size,
        offset,
    )?;
    println!("{}", formatters::format_tokens(&tokens, format));
    Ok(())
}

pub fn cmd_show(
    repo: &TokenRepository,
    address: &str,
    network: Network,
    format: &OutputFormat,
) -> Result<()> {
    let address = Address::from_str(address.trim())
        .with_context(|| format!("Invalid address format: {address}"))?;

    match repo.find_by_address(&address, network)? {
        Some(token) => println!("{}", formatters::format_token(&token, format)),
        None => println!("No token at {address:?} on {network}."),
    }
    Ok(())
}

pub fn cmd_stats(repo: &TokenRepository, format: &OutputFormat) -> Result<()> {
    let stats = repo.stats(chrono::Utc::now().timestamp())?;
    println!("{}", formatters::format_stats(&stats, format));
    Ok(())
}

pub fn cmd_alerts(repo: &TokenRepository, limit: usize, format: &OutputFormat) -> Result<()> {
    let tokens = repo.recent_alerts(limit.clamp(1, MAX_ALERT_LIMIT))?;
    println!("{}", formatters::format_tokens(&tokens, format));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::Database;

    #[test]
    fn show_rejects_malformed_addresses() {
        let db = Database::in_memory().unwrap();
        let repo = TokenRepository::new(&db.conn);
        let err = cmd_show(&repo, "0x1234", Network::Eth, &OutputFormat::Table).unwrap_err();
        assert!(err.to_string().contains("Invalid address format"));
    }

    #[test]
    fn recent_tolerates_out_of_range_paging() {
        let db = Database::in_memory().unwrap();
        let repo = TokenRepository::new(&db.conn);
        let query = RecentQuery {
            page: 0,
            page_size: 10_000,
            network: None,
            include_unconfirmed: true,
        };
        cmd_recent(&repo, &query, &OutputFormat::Table).unwrap();
    }
}
