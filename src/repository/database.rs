use anyhow::{Context, Result};
use rusqlite::Connection;

pub struct Database {
    pub conn: Connection,
}

impl Database {
    pub fn new(db_path: &str) -> Result<Self> {
        let db_path = db_path.strip_prefix("sqlite:").unwrap_or(db_path);
        let conn = Connection::open(db_path).context("Failed to open database")?;

        let db = Database { conn };
        db.create_tables()?;
        Ok(db)
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.create_tables()?;
        Ok(db)
    }

    pub fn create_tables(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS tokens (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                address TEXT NOT NULL,
                network TEXT NOT NULL,
                block_number INTEGER NOT NULL,
                detected_at INTEGER NOT NULL,
                name TEXT,
                symbol TEXT,
                decimals INTEGER,
                total_supply TEXT,
                creator_address TEXT,
                tx_hash TEXT NOT NULL,
                confirmed INTEGER NOT NULL DEFAULT 0,
                is_verified INTEGER NOT NULL DEFAULT 0,
                risk_score INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        // (address, network) is the token identity; concurrent first-insert
        // races resolve through this constraint
        self.conn.execute(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_tokens_addr_network
             ON tokens(address, network)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_tokens_detected_at
             ON tokens(detected_at)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_tokens_network
             ON tokens(network)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_tokens_confirmed
             ON tokens(confirmed)",
            [],
        )?;

        Ok(())
    }

    pub fn reset(&self) -> Result<()> {
        self.conn.execute("DROP TABLE IF EXISTS tokens", [])?;
        self.create_tables()
    }
}
