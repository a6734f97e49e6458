// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// UBIC NODE - state bootstrap and inspection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use clap::{Parser, Subcommand};
use log::{error, info};
use std::path::{Path, PathBuf};
use ubic_core::{CertType, NodeConfig};
use ubic_node::db::StateDb;
use ubic_node::views::{self, CertificateView};
use ubic_node::NodeContext;

#[derive(Parser)]
#[command(name = "ubic-node")]
#[command(about = "UBIC node - passport-backed UBI ledger", long_about = None)]
#[command(version)]
struct Cli {
    /// Node config file (TOML). Without one, UBIC_* environment variables are used
    #[arg(short, long, env = "UBIC_CONFIG")]
    config: Option<PathBuf>,

    /// Overrides `data_dir` from the config
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open (or create) the state database and print a summary
    Status,

    /// Show one account with its UBI position
    Account {
        /// Hex address link
        address: String,
    },

    /// List delegates, active ones first
    Delegates,

    /// List certificates of one type (root, csca, dsc)
    Certificates {
        #[arg(default_value = "dsc")]
        cert_type: String,
    },
}

fn parse_cert_type(value: &str) -> Result<CertType, String> {
    match value.to_ascii_lowercase().as_str() {
        "root" => Ok(CertType::Root),
        "csca" => Ok(CertType::Csca),
        "dsc" => Ok(CertType::Dsc),
        other => Err(format!("unknown certificate type '{}'", other)),
    }
}

fn now_secs() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

/// Load persisted state, or build genesis state on first run and persist it
fn open_context(config: &NodeConfig, db: &StateDb) -> Result<NodeContext, Box<dyn std::error::Error>> {
    if db.is_empty() {
        info!("No saved state, building genesis");
        let ctx = NodeContext::from_config(config)?;
        db.save(&ctx.snapshot())?;
        return Ok(ctx);
    }
    config.validate()?;
    let params = config.protocol_params()?;
    let snapshot = db.load()?;
    info!(
        "Loaded {} headers, {} accounts, {} certificates",
        snapshot.headers.len(),
        snapshot.accounts.len(),
        snapshot.certificates.len()
    );
    Ok(NodeContext::from_snapshot(params, config.pool.clone(), snapshot)?)
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => NodeConfig::load_from_file(path)?,
        None => NodeConfig::load_from_env()?,
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.display().to_string();
    }

    let db = StateDb::open(Path::new(&config.data_dir).join("state"))?;
    let ctx = open_context(&config, &db)?;

    match cli.command.unwrap_or(Commands::Status) {
        Commands::Status => {
            let index = views::index_view(&ctx);
            println!("{}", serde_json::to_string_pretty(&index)?);
            let stats = db.stats();
            info!(
                "Database: {} headers, {} bytes on disk",
                stats.headers_count, stats.size_on_disk
            );
        }
        Commands::Account { address } => {
            let link = hex::decode(address.trim_start_matches("0x"))?;
            match views::address_view(&ctx, &link)? {
                Some(view) => println!("{}", serde_json::to_string_pretty(&view)?),
                None => println!("Account not found"),
            }
        }
        Commands::Delegates => {
            let delegates = views::delegate_views(&ctx, now_secs());
            println!("{}", serde_json::to_string_pretty(&delegates)?);
        }
        Commands::Certificates { cert_type } => {
            let cert_type = parse_cert_type(&cert_type)?;
            let certs: Vec<CertificateView> = ctx
                .certificates(cert_type)
                .iter()
                .map(CertificateView::from)
                .collect();
            println!("{}", serde_json::to_string_pretty(&certs)?);
        }
    }

    db.save(&ctx.snapshot())?;
    Ok(())
}

fn main() {
    ubic_node::logger::init();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!("{}", e);
        std::process::exit(1);
    }
}
