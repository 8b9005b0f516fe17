use crate::repository::{PersistedToken, TokenStats};
use comfy_table::{Cell, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use csv::Writer;
use serde_json::json;

#[derive(Debug, Clone)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "csv" => OutputFormat::Csv,
            _ => OutputFormat::Table,
        }
    }
}

fn format_timestamp(timestamp: i64) -> String {
    chrono::DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

pub fn format_tokens(tokens: &[PersistedToken], format: &OutputFormat) -> String {
    match format {
        OutputFormat::Table => format_tokens_table(tokens),
        OutputFormat::Json => format_tokens_json(tokens),
        OutputFormat::Csv => format_tokens_csv(tokens),
    }
}

fn format_tokens_table(tokens: &[PersistedToken]) -> String {
    if tokens.is_empty() {
        return "No tokens found.".to_string();
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            "Detected (UTC)",
            "Network",
            "Name",
            "Symbol",
            "Address",
            "Block",
            "Risk",
            "Confirmed",
        ]);

    for token in tokens {
        table.add_row(vec![
            Cell::new(format_timestamp(token.detected_at)),
            Cell::new(token.network.as_str()),
            Cell::new(token.name.as_deref().unwrap_or("Unknown")),
            Cell::new(token.symbol.as_deref().unwrap_or("N/A")),
            Cell::new(format!("{:?}", token.address)),
            Cell::new(token.block_number),
            Cell::new(token.risk_score),
            Cell::new(if token.confirmed { "yes" } else { "no" }),
        ]);
    }

    table.to_string()
}

fn token_to_json(token: &PersistedToken) -> serde_json::Value {
    json!({
        "address": format!("{:?}", token.address),
        "network": token.network,
        "block_number": token.block_number,
        "detected_at": format_timestamp(token.detected_at),
        "name": token.name,
        "symbol": token.symbol,
        "decimals": token.decimals,
        "total_supply": token.total_supply.map(|supply| supply.to_string()),
        "creator_address": token.creator_address.map(|creator| format!("{creator:?}")),
        "tx_hash": format!("{:?}", token.tx_hash),
        "confirmed": token.confirmed,
        "is_verified": token.is_verified,
        "risk_score": token.risk_score,
    })
}

fn format_tokens_json(tokens: &[PersistedToken]) -> String {
    let json_tokens: Vec<_> = tokens.iter().map(token_to_json).collect();
    serde_json::to_string_pretty(&json_tokens).unwrap_or_else(|_| "[]".to_string())
}

fn format_tokens_csv(tokens: &[PersistedToken]) -> String {
    let mut wtr = Writer::from_writer(vec![]);

    let _ = wtr.write_record([
        "detected_at",
        "network",
        "address",
        "name",
        "symbol",
        "decimals",
        "total_supply",
        "creator_address",
        "tx_hash",
        "block_number",
        "confirmed",
        "is_verified",
        "risk_score",
    ]);

    for token in tokens {
        let _ = wtr.write_record([
            &format_timestamp(token.detected_at),
            &token.network.to_string(),
            &format!("{:?}", token.address),
            &token.name.clone().unwrap_or_default(),
            &token.symbol.clone().unwrap_or_default(),
            &token
                .decimals
                .map(|decimals| decimals.to_string())
                .unwrap_or_default(),
            &token
                .total_supply
                .map(|supply| supply.to_string())
                .unwrap_or_default(),
            &token
                .creator_address
                .map(|creator| format!("{creator:?}"))
                .unwrap_or_default(),
            &format!("{:?}", token.tx_hash),
            &token.block_number.to_string(),
            &token.confirmed.to_string(),
            &token.is_verified.to_string(),
            &token.risk_score.to_string(),
        ]);
    }

    String::from_utf8(wtr.into_inner().unwrap_or_default()).unwrap_or_default()
}

pub fn format_token(token: &PersistedToken, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_header(vec!["Field", "Value"]);

            table.add_row(vec![
                Cell::new("Address"),
                Cell::new(format!("{:?}", token.address)),
            ]);
            table.add_row(vec![Cell::new("Network"), Cell::new(token.network.as_str())]);
            table.add_row(vec![
                Cell::new("Name"),
                Cell::new(token.name.as_deref().unwrap_or("Unknown")),
            ]);
            table.add_row(vec![
                Cell::new("Symbol"),
                Cell::new(token.symbol.as_deref().unwrap_or("N/A")),
            ]);
            table.add_row(vec![
                Cell::new("Decimals"),
                Cell::new(
                    token
                        .decimals
                        .map(|decimals| decimals.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                ),
            ]);
            table.add_row(vec![
                Cell::new("Total supply"),
                Cell::new(
                    token
                        .total_supply
                        .map(|supply| supply.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                ),
            ]);
            table.add_row(vec![
                Cell::new("Creator"),
                Cell::new(
                    token
                        .creator_address
                        .map(|creator| format!("{creator:?}"))
                        .unwrap_or_else(|| "-".to_string()),
                ),
            ]);
            table.add_row(vec![
                Cell::new("Creation tx"),
                Cell::new(format!("{:?}", token.tx_hash)),
            ]);
            table.add_row(vec![Cell::new("Block"), Cell::new(token.block_number)]);
            table.add_row(vec![
                Cell::new("Detected (UTC)"),
                Cell::new(format_timestamp(token.detected_at)),
            ]);
            table.add_row(vec![
                Cell::new("Confirmed"),
                Cell::new(if token.confirmed { "yes" } else { "no" }),
            ]);
            table.add_row(vec![
                Cell::new("Verified"),
                Cell::new(if token.is_verified { "yes" } else { "no" }),
            ]);
            table.add_row(vec![Cell::new("Risk score"), Cell::new(token.risk_score)]);
            table.to_string()
        }
        OutputFormat::Json => serde_json::to_string_pretty(&token_to_json(token))
            .unwrap_or_else(|_| "{}".to_string()),
        OutputFormat::Csv => format_tokens_csv(std::slice::from_ref(token)),
    }
}

pub fn format_stats(stats: &TokenStats, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Table => {
            let mut summary = Table::new();
            summary
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_header(vec!["Metric", "Tokens"]);
            summary.add_row(vec![Cell::new("Total"), Cell::new(stats.total_tokens)]);
            summary.add_row(vec![
                Cell::new("Last 24 hours"),
                Cell::new(stats.tokens_last_24h),
            ]);
            summary.add_row(vec![
                Cell::new("Last hour"),
                Cell::new(stats.tokens_last_hour),
            ]);
            for (network, count) in &stats.by_network {
                summary.add_row(vec![Cell::new(format!("On {network}")), Cell::new(count)]);
            }

            let mut histogram = Table::new();
            histogram
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_header(vec!["Hour (UTC)", "Tokens"]);
            for hour in &stats.hourly {
                histogram.add_row(vec![
                    Cell::new(format_timestamp(hour.hour_start)),
                    Cell::new(hour.count),
                ]);
            }

            format!("{summary}\n{histogram}")
        }
        OutputFormat::Json => {
            let by_network: serde_json::Map<String, serde_json::Value> = stats
                .by_network
                .iter()
                .map(|(network, count)| (network.clone(), json!(count)))
                .collect();
            let hourly: Vec<_> = stats
                .hourly
                .iter()
                .map(|hour| {
                    json!({
                        "hour": format_timestamp(hour.hour_start),
                        "count": hour.count,
                    })
                })
                .collect();
            serde_json::to_string_pretty(&json!({
                "total_tokens": stats.total_tokens,
                "tokens_last_24h": stats.tokens_last_24h,
                "tokens_last_hour": stats.tokens_last_hour,
                "by_network": by_network,
                "hourly_distribution": hourly,
            }))
            .unwrap_or_else(|_| "{}".to_string())
        }
        OutputFormat::Csv => {
            let mut wtr = Writer::from_writer(vec![]);
            let _ = wtr.write_record(["metric", "value"]);
            let _ = wtr.write_record(["total".to_string(), stats.total_tokens.to_string()]);
            let _ = wtr.write_record(["last_24h".to_string(), stats.tokens_last_24h.to_string()]);
            let _ = wtr.write_record(["last_hour".to_string(), stats.tokens_last_hour.to_string()]);
            for (network, count) in &stats.by_network {
                let _ = wtr.write_record([format!("network_{network}"), count.to_string()]);
            }
            for hour in &stats.hourly {
                let _ = wtr.write_record([
                    format!("hour_{}", format_timestamp(hour.hour_start)),
                    hour.count.to_string(),
                ]);
            }
            String::from_utf8(wtr.into_inner().unwrap_or_default()).unwrap_or_default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_token_list_renders_a_placeholder() {
        assert_eq!(format_tokens(&[], &OutputFormat::Table), "No tokens found.");
    }

    #[test]
    fn json_output_serializes_network_as_uppercase() {
        use crate::network::Network;
        use alloy_primitives::{Address, B256};

        let token = PersistedToken {
            address: Address::repeat_byte(1),
            network: Network::Bsc,
            block_number: 7,
            detected_at: 1_700_000_000,
            name: None,
            symbol: Some("TKN".into()),
            decimals: Some(18),
            total_supply: None,
            creator_address: None,
            tx_hash: B256::repeat_byte(2),
            confirmed: true,
            is_verified: false,
            risk_score: 2,
        };

        let rendered = format_tokens(std::slice::from_ref(&token), &OutputFormat::Json);
        assert!(rendered.contains("\"BSC\""));
        assert!(rendered.contains("\"risk_score\": 2"));
    }
}
