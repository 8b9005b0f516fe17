use alloy_primitives::{Address, B256, U256};
use anyhow::Result;
use clap::Parser;
use rand::Rng;
use token_scanner::config;
use token_scanner::network::Network;
use token_scanner::repository::{Database, PersistedToken, TokenRepository, UpsertOutcome};

const TOKEN_NAMES: &[&str] = &[
    "SafeMoon",
    "ElonCoin",
    "DogeKiller",
    "ShibaSwap",
    "MoonToken",
    "RocketFuel",
    "DiamondHands",
    "ToTheMoon",
    "WhaleToken",
    "PumpCoin",
    "MetaVerse",
    "CryptoGem",
    "DeFiToken",
    "YieldFarm",
    "StakingPro",
    "BurnToken",
    "ReflectCoin",
    "SafeVault",
    "MegaMoon",
    "UltraCoin",
];

const NAME_SUFFIXES: &[&str] = &["", " V2", " Token", " Coin"];
const SYMBOL_PREFIXES: &[&str] = &[
    "SAFE", "MOON", "DOGE", "SHIB", "ELON", "META", "DEFI", "YIELD", "BURN", "MEGA",
];
const SYMBOL_SUFFIXES: &[&str] = &["", "X", "V2", "PRO", "MAX"];

#[derive(Parser)]
#[command(name = "seed")]
#[command(about = "Populate the database with sample token data", long_about = None)]
struct Cli {
    /// Number of tokens to generate.
    #[arg(long, default_value = "100")]
    count: usize,

    /// Delete all existing tokens first.
    #[arg(long, default_value = "false")]
    clear: bool,
}

fn random_address<R: Rng>(rng: &mut R) -> Address {
    let mut bytes = [0u8; 20];
    rng.fill(&mut bytes[..]);
    Address::from(bytes)
}

fn random_tx_hash<R: Rng>(rng: &mut R) -> B256 {
    let mut bytes = [0u8; 32];
    rng.fill(&mut bytes[..]);
    B256::from(bytes)
}

fn pick<'a, R: Rng>(rng: &mut R, choices: &[&'a str]) -> &'a str {
    choices[rng.gen_range(0..choices.len())]
}

fn generate_token<R: Rng>(rng: &mut R, now: i64) -> PersistedToken {
    let network = if rng.gen_bool(0.5) {
        Network::Eth
    } else {
        Network::Bsc
    };
    let block_number = match network {
        Network::Eth => rng.gen_range(15_000_000..21_000_000),
        Network::Bsc => rng.gen_range(20_000_000..35_000_000),
    };

    let name = format!(
        "{}{}",
        pick(rng, TOKEN_NAMES),
        pick(rng, NAME_SUFFIXES)
    );
    let symbol = format!(
        "{}{}",
        pick(rng, SYMBOL_PREFIXES),
        pick(rng, SYMBOL_SUFFIXES)
    );

    let whole_supply: u64 = rng.gen_range(1_000_000..1_000_000_000_000);
    let total_supply = U256::from(whole_supply) * U256::from(10u64).pow(U256::from(18));

    // Spread detections over the trailing week.
    let hours_ago: i64 = rng.gen_range(0..168);

    PersistedToken {
        address: random_address(rng),
        network,
        block_number,
        detected_at: now - hours_ago * 3600,
        name: Some(name),
        symbol: Some(symbol),
        decimals: Some([18u8, 9, 6, 8][rng.gen_range(0..4)]),
        total_supply: Some(total_supply),
        creator_address: Some(random_address(rng)),
        tx_hash: random_tx_hash(rng),
        confirmed: rng.gen_bool(0.75),
        is_verified: rng.gen_bool(0.33),
        risk_score: rng.gen_range(0..=10),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let db = Database::new(&config::database_path())?;
    let repo = TokenRepository::new(&db.conn);

    if cli.clear {
        let cleared = db.conn.execute("DELETE FROM tokens", [])?;
        println!("Cleared {cleared} tokens from database");
    }

    println!("Generating {} sample tokens...", cli.count);

    let mut rng = rand::thread_rng();
    let now = chrono::Utc::now().timestamp();
    let mut inserted = 0;
    for _ in 0..cli.count {
        let token = generate_token(&mut rng, now);
        if matches!(repo.upsert_candidate(&token)?, UpsertOutcome::Inserted) {
            inserted += 1;
        }
    }

    println!("Created {inserted} tokens");

    let stats = repo.stats(now)?;
    println!("\nDatabase stats:");
    println!("  Total tokens: {}", stats.total_tokens);
    for (network, count) in &stats.by_network {
        println!("  {network} tokens: {count}");
    }

    Ok(())
}
