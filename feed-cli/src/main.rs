use std::{
    error,
    io::{Error, ErrorKind, Result},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use clap::{Parser, Subcommand};
use medialane_feed::{
    api::client::Client,
    session::{FeedSession, FetchOutcome},
    source::{EventSource, MemorySource, RpcSource, Scope},
    view, Config, TypeFilter,
};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// YAML config file. Defaults apply when omitted.
    #[clap(long)]
    config: Option<PathBuf>,

    /// Endpoint for RPC calls, overrides the config and environment.
    #[clap(long)]
    endpoint: Option<String>,

    /// Which subcommand to call.
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Prints the activity feed.
    Activity {
        /// Restrict the feed to one wallet.
        #[clap(long)]
        wallet: Option<String>,
        /// Case-insensitive search over asset name, user, details and tx hash.
        #[clap(long, default_value = "")]
        search: String,
        /// Activity type, or "all".
        #[clap(long = "type", default_value = "all")]
        type_filter: TypeFilter,
        /// Number of pages to load.
        #[clap(long, default_value_t = 1)]
        pages: usize,
        /// Reads activities from a JSON file instead of the node.
        #[clap(long)]
        fixture: Option<PathBuf>,
    },
    /// Prints the decoded activities of one transaction.
    Receipt { tx_hash: String },
    /// Prints the chain id and head block.
    Ping,
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn error::Error>> {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "warn"),
    );
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    config.apply_env();
    if let Some(endpoint) = cli.endpoint {
        config.rpc_endpoint = endpoint;
    }

    match cli.command {
        Command::Activity {
            wallet,
            search,
            type_filter,
            pages,
            fixture,
        } => {
            let scope = match wallet {
                Some(address) => Scope::wallet(&address)?,
                None => Scope::Global,
            };
            let source: Arc<dyn EventSource> = match fixture {
                Some(path) => Arc::new(MemorySource::from_json_file(&path)?),
                None => Arc::new(RpcSource::from_config(&config)?),
            };
            activity(&config, source, scope, &search, type_filter, pages).await?;
        }
        Command::Receipt { tx_hash } => receipt(&config, &tx_hash).await?,
        Command::Ping => ping(&config).await?,
    }
    Ok(())
}

async fn activity(
    config: &Config,
    source: Arc<dyn EventSource>,
    scope: Scope,
    search: &str,
    type_filter: TypeFilter,
    pages: usize,
) -> Result<()> {
    let mut options = config.session_options(scope);
    // the query is final, nothing to debounce
    options.search_debounce = Duration::ZERO;
    let session = FeedSession::new(source, options);

    if let Err(e) = session.refresh().await {
        log::warn!("refresh failed: {}", e);
    }
    for _ in 1..pages {
        match session.load_more().await {
            Ok(FetchOutcome::Applied) => {}
            Ok(outcome) => {
                log::debug!("stopped loading pages: {:?}", outcome);
                break;
            }
            Err(e) => {
                log::warn!("load more failed: {}", e);
                break;
            }
        }
    }

    session.set_search_query(search);
    session.set_type_filter(type_filter);

    let state = session.view();
    print!("{}", view::render(&state, &config.explorer_url));
    log::info!(
        "{}: showing {} of {} loaded activities",
        state.scope,
        state.activities.len(),
        state.total_loaded
    );
    session.close();
    Ok(())
}

async fn receipt(config: &Config, tx_hash: &str) -> Result<()> {
    let client = Client::from_endpoint(&config.rpc_endpoint)?;
    let decoder = config.decoder()?;
    let receipt = client.get_transaction_receipt(tx_hash).await?;

    let block_number = receipt.block_number.ok_or_else(|| {
        Error::new(
            ErrorKind::Other,
            format!("transaction {} is not in a block yet", tx_hash),
        )
    })?;
    let timestamp = client.get_block_header(block_number).await?.timestamp;

    for (index, event) in receipt.events.into_iter().enumerate() {
        let event = event.emitted(&receipt.transaction_hash, Some(block_number));
        match decoder.decode(&event, index, timestamp)? {
            Some(activity) => println!(
                "{}",
                serde_json::to_string_pretty(&activity)
                    .map_err(|e| Error::new(ErrorKind::Other, e.to_string()))?
            ),
            None => log::info!("event {} from {} is not feed activity", index, event.from_address),
        }
    }
    Ok(())
}

async fn ping(config: &Config) -> Result<()> {
    let client = Client::from_endpoint(&config.rpc_endpoint)?;
    let chain_id = client.chain_id().await?;
    let head = client.block_number().await?;
    println!("chain id: {}", chain_id);
    println!("head block: {}", head);
    Ok(())
}

#[test]
fn test_cli() {
    use clap::CommandFactory;

    Cli::command().debug_assert();

    let mut activity = Cli::command()
        .find_subcommand("activity")
        .cloned()
        .unwrap();
    let help = activity.render_long_help().to_string();
    assert!(help.contains("tx hash"));

    let cli = Cli::parse_from(["feed-cli", "activity", "--type", "sale", "--search", "0xca"]);
    match cli.command {
        Command::Activity {
            search,
            type_filter,
            ..
        } => {
            assert_eq!(search, "0xca");
            assert_eq!(type_filter, "sale".parse::<TypeFilter>().unwrap());
        }
        other => panic!("unexpected command {:?}", other),
    }
}
