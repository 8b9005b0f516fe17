use anyhow::Result;
use clap::Parser;
use token_scanner::config;
use token_scanner::repository::Database;

#[derive(Parser)]
#[command(name = "migrate")]
#[command(about = "Create or reset the token database schema", long_about = None)]
struct Cli {
    /// Drop existing tables before recreating them.
    #[arg(long, default_value = "false")]
    fresh: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let database_path = config::database_path();

    println!("Running migrations on database: {database_path}");

    let db = Database::new(&database_path)?;
    if cli.fresh {
        println!("Dropping existing tables");
        db.reset()?;
    }

    println!("Migrations completed successfully!");

    Ok(())
}
