use anyhow::Result;
use clap::{Parser, Subcommand};
use token_scanner::config;
use token_scanner::network::Network;
use token_scanner::query::commands::{
    RecentQuery, cmd_alerts, cmd_recent, cmd_show, cmd_stats,
};
use token_scanner::query::formatters::OutputFormat;
use token_scanner::repository::{Database, TokenRepository};

#[derive(Parser)]
#[command(name = "query")]
#[command(about = "Query detected token contracts", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "table")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Recent {
        #[arg(long, default_value = "1")]
        page: usize,

        #[arg(long, default_value = "20")]
        page_size: usize,

        #[arg(long)]
        network: Option<Network>,

        #[arg(long, default_value = "false")]
        include_unconfirmed: bool,
    },
    Show {
        address: String,

        #[arg(long)]
        network: Network,
    },
    Stats,
    Alerts {
        #[arg(long, default_value = "20")]
        limit: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let format = OutputFormat::from(cli.format.as_str());

    let db = Database::new(&config::database_path())?;
    let repo = TokenRepository::new(&db.conn);

    match cli.command {
        Commands::Recent {
            page,
            page_size,
            network,
            include_unconfirmed,
        } => {
            let query = RecentQuery {
                page,
                page_size,
                network,
                include_unconfirmed,
            };
            cmd_recent(&repo, &query, &format)?;
        }
        Commands::Show { address, network } => {
            cmd_show(&repo, &address, network, &format)?;
        }
        Commands::Stats => {
            cmd_stats(&repo, &format)?;
        }
        Commands::Alerts { limit } => {
            cmd_alerts(&repo, limit, &format)?;
        }
    }

    Ok(())
}
