//! dealkit CLI
//!
//! Command-line front end for escrow deals over the durable file store.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dealkit_lib::{DealEvent, DealkitConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod ui;

#[derive(Parser)]
#[command(name = "dealkit")]
#[command(about = "dealkit - list, join and settle peer-to-peer escrow deals", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// TOML config file
    #[arg(short, long, global = true, env = "DEALKIT_CONFIG")]
    config: Option<PathBuf>,

    /// Store directory (overrides config and DEALKIT_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Backup directory (overrides config and DEALKIT_BACKUP_DIR)
    #[arg(long, global = true)]
    backup_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Create and drive deals
    Deal {
        #[command(subcommand)]
        action: DealAction,
    },

    /// Export every deal as CSV
    Export {
        /// Output file
        #[arg(default_value = "deals_export.csv")]
        output: PathBuf,
    },

    /// Write a JSON snapshot of the store to the backup directory
    Backup,

    /// Load a JSON snapshot into the store
    Restore {
        /// Backup file to read
        input: PathBuf,
    },

    /// Run the payment monitor
    Monitor {
        /// Run a single pass and exit
        #[arg(long)]
        once: bool,
    },

    /// Interactive line-driven session as one user
    Chat {
        /// Acting user id
        #[arg(short, long)]
        user: i64,

        /// Display name
        #[arg(short, long)]
        name: Option<String>,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Register a user or refresh their display name
    Register {
        user: i64,

        #[arg(short, long)]
        name: Option<String>,
    },

    /// Set a user's payout wallet
    Wallet { user: i64, address: String },

    /// Link a channel to a user
    Channel {
        user: i64,
        #[arg(allow_negative_numbers = true)]
        channel_id: i64,
    },

    /// Show a user
    Show { user: i64 },
}

#[derive(Subcommand)]
enum DealAction {
    /// List a new deal
    Create {
        /// Seller user id
        #[arg(long)]
        seller: i64,

        /// Price, e.g. 100 or 99,5
        #[arg(long)]
        amount: String,

        /// channel, gift, nft or other
        #[arg(long, default_value = "other")]
        category: String,

        /// Link to the item or its name
        #[arg(long)]
        item: String,

        #[arg(long, default_value = "")]
        description: String,
    },

    /// Show a deal
    Show { deal_id: String },

    /// Inspect a deal before joining it
    Preview {
        deal_id: String,
        #[arg(short, long)]
        user: i64,
    },

    /// Join a deal as buyer
    Join {
        deal_id: String,
        #[arg(short, long)]
        user: i64,
    },

    /// Report payment sent
    Paid {
        deal_id: String,
        #[arg(short, long)]
        user: i64,
    },

    /// Leave a deal before paying
    Leave {
        deal_id: String,
        #[arg(short, long)]
        user: i64,
    },

    /// Confirm payment received and close the deal
    Finish {
        deal_id: String,
        #[arg(short, long)]
        user: i64,
    },

    /// Cancel a deal
    Cancel {
        deal_id: String,
        #[arg(short, long)]
        user: i64,
    },

    /// Deals where a user is seller or buyer
    List { user: i64 },

    /// Deals still waiting on a buyer or payment
    Open,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = DealkitConfig::load(cli.config.as_deref()).context("failed to load config")?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(dir) = cli.backup_dir {
        config.backup_dir = dir;
    }

    // Initialize tracing
    let filter = if cli.verbose {
        EnvFilter::new("dealkit=debug,dealkit_lib=debug")
    } else {
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Dispatch commands
    match cli.command {
        Commands::User { action } => match action {
            UserAction::Register { user, name } => {
                commands::user::register(&config, user, name.as_deref()).await?;
            }
            UserAction::Wallet { user, address } => {
                commands::user::wallet(&config, user, &address).await?;
            }
            UserAction::Channel { user, channel_id } => {
                commands::user::channel(&config, user, channel_id).await?;
            }
            UserAction::Show { user } => {
                commands::user::show(&config, user).await?;
            }
        },
        Commands::Deal { action } => match action {
            DealAction::Create {
                seller,
                amount,
                category,
                item,
                description,
            } => {
                commands::deal::create(&config, seller, &amount, &category, &item, &description)
                    .await?;
            }
            DealAction::Show { deal_id } => {
                commands::deal::show(&config, &deal_id).await?;
            }
            DealAction::Preview { deal_id, user } => {
                commands::deal::preview(&config, &deal_id, user).await?;
            }
            DealAction::Join { deal_id, user } => {
                commands::deal::transition(&config, &deal_id, DealEvent::Join, user).await?;
            }
            DealAction::Paid { deal_id, user } => {
                commands::deal::transition(&config, &deal_id, DealEvent::MarkPaid, user).await?;
            }
            DealAction::Leave { deal_id, user } => {
                commands::deal::transition(&config, &deal_id, DealEvent::Leave, user).await?;
            }
            DealAction::Finish { deal_id, user } => {
                commands::deal::transition(&config, &deal_id, DealEvent::Finish, user).await?;
            }
            DealAction::Cancel { deal_id, user } => {
                commands::deal::transition(&config, &deal_id, DealEvent::Cancel, user).await?;
            }
            DealAction::List { user } => {
                commands::deal::list(&config, user).await?;
            }
            DealAction::Open => {
                commands::deal::open(&config).await?;
            }
        },
        Commands::Export { output } => {
            commands::export::run(&config, &output).await?;
        }
        Commands::Backup => {
            commands::backup::backup(&config).await?;
        }
        Commands::Restore { input } => {
            commands::backup::restore(&config, &input).await?;
        }
        Commands::Monitor { once } => {
            commands::monitor::run(&config, once).await?;
        }
        Commands::Chat { user, name } => {
            commands::chat::run(&config, user, name.as_deref()).await?;
        }
    }

    Ok(())
}
