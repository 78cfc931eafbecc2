use std::env;

use clap::{Args, Parser, Subcommand};
use donation_engine::db_types::Role;
use donation_server::config::DEFAULT_DATABASE_URL;

mod formatting;
mod jwt_token;
mod ledger;

use jwt_token::print_jwt_token;

#[derive(Parser, Debug)]
#[command(version = "0.1.0", about = "Operator tools for the donation ledger")]
pub struct Arguments {
    /// The ledger database. Defaults to DPS_DATABASE_URL, or the server's default location.
    #[arg(short = 'd', long = "database")]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    #[clap(name = "audit", about = "Compare every batch total against the sum of its settled donations")]
    Audit,
    #[clap(name = "repair", about = "Reset batch totals to the value recomputed from the ledger")]
    Repair(RepairParams),
    #[clap(name = "orphans", about = "List PENDING donations that never received a processor reference")]
    Orphans(OrphanParams),
    #[clap(name = "flags", about = "List batch adjustments that could not be applied")]
    Flags {
        /// Include flags that a repair has already resolved
        #[arg(short = 'a', long = "all")]
        all: bool,
    },
    #[clap(name = "token", about = "Issue a staff bearer token signed with DPS_JWT_SECRET")]
    AccessToken(TokenParams),
}

#[derive(Debug, Args)]
pub struct RepairParams {
    /// The batch to repair
    #[arg(short = 'b', long = "batch", conflicts_with = "all", required_unless_present = "all")]
    batch_id: Option<i64>,
    /// Repair every batch
    #[arg(short = 'a', long = "all")]
    all: bool,
}

#[derive(Debug, Args)]
pub struct OrphanParams {
    /// Instead of placeholders only, list every PENDING donation older than this many hours
    #[arg(short = 'o', long = "older-than")]
    hours: Option<i64>,
}

#[derive(Debug, Args)]
pub struct TokenParams {
    /// The coordinator id the token is issued to
    #[arg(short = 'u', long = "user")]
    user_id: i64,
    /// Roles the token grants
    #[arg(short = 'r', long = "role", default_value = "coordinator")]
    roles: Vec<Role>,
    /// The display name carried in the token
    #[arg(short = 'n', long = "name")]
    name: Option<String>,
    /// How long the token is valid for, in hours
    #[arg(short = 'x', long = "hours", default_value = "12")]
    hours: i64,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();
    let cli = Arguments::parse();
    let url = cli
        .database_url
        .or_else(|| env::var("DPS_DATABASE_URL").ok())
        .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
    let result = match cli.command {
        Command::Audit => ledger::audit(&url).await,
        Command::Repair(params) => ledger::repair(&url, params.batch_id, params.all).await,
        Command::Orphans(params) => ledger::orphans(&url, params.hours).await,
        Command::Flags { all } => ledger::flags(&url, all).await,
        Command::AccessToken(params) => print_jwt_token(params),
    };
    if let Err(e) = result {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}
