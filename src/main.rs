use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;

use dropwatch::config::AppConfig;
use dropwatch::engine::{PriceRefreshEngine, RefreshResult};
use dropwatch::fetch::HttpFetcher;
use dropwatch::models::NotificationDestination;
use dropwatch::notify::{NotificationFanout, TelegramTransport};
use dropwatch::scheduler::{RefreshScheduler, SweepRunner};
use dropwatch::store::{ProductStore, SqliteStore};

#[derive(Parser)]
#[command(name = "dropwatch", about = "Tracks store page prices and notifies on drops")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the periodic sweep scheduler until interrupted
    Run,
    /// Run a single sweep over all tracked products
    Sweep,
    /// Refresh one product immediately
    Refresh { id: String },
    /// Start tracking a product page
    Track { url: String },
    /// Stop tracking a product
    Untrack { id: String },
    /// List tracked products
    List,
    /// Add a notification destination
    AddDestination {
        chat_id: i64,
        #[arg(long)]
        thread_id: Option<i64>,
    },
    /// Remove a notification destination
    RemoveDestination {
        chat_id: i64,
        #[arg(long)]
        thread_id: Option<i64>,
    },
}

fn destination_from_args(chat_id: i64, thread_id: Option<i64>) -> NotificationDestination {
    match thread_id {
        Some(thread_id) => NotificationDestination::Threaded { chat_id, thread_id },
        None => NotificationDestination::Flat { chat_id },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dropwatch=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    let store: Arc<dyn ProductStore> = Arc::new(SqliteStore::connect(&config.database).await?);
    let fetcher = Arc::new(HttpFetcher::new(config.fetcher.clone())?);
    let engine = Arc::new(PriceRefreshEngine::new(
        Arc::clone(&store),
        fetcher,
    ));

    match cli.command {
        Command::Run => {
            let runner = build_runner(&config, Arc::clone(&engine), Arc::clone(&store))?;
            let mut scheduler = RefreshScheduler::new(runner, config.scheduler.clone()).await?;
            scheduler.start().await?;

            info!("dropwatch running, press Ctrl-C to stop");
            tokio::signal::ctrl_c().await?;
            info!("shutting down");
            scheduler.shutdown().await?;
        }
        Command::Sweep => {
            let runner = build_runner(&config, Arc::clone(&engine), Arc::clone(&store))?;
            match runner.try_run_sweep().await? {
                Some(report) => println!(
                    "checked {} products: {} updated, {} events, {} fetch failures, {} extraction failures",
                    report.products_checked,
                    report.updated,
                    report.events_emitted,
                    report.fetch_failures,
                    report.extraction_failures,
                ),
                None => println!("a sweep is already in progress"),
            }
        }
        Command::Refresh { id } => match engine.refresh(&id).await? {
            RefreshResult::Updated { product, event } => {
                println!(
                    "{}: {} (on sale: {})",
                    product.title, product.current_price, product.on_sale
                );
                if let Some(event) = event {
                    println!(
                        "price drop: {} -> {}",
                        event.old_effective_price, event.new_effective_price
                    );
                }
            }
            RefreshResult::NotFound => println!("no tracked product with id {id}"),
            RefreshResult::FetchFailed { error } => println!("fetch failed: {error}"),
            RefreshResult::ExtractionFailed { error } => println!("extraction failed: {error}"),
        },
        Command::Track { url } => {
            let product = engine.track(&url).await?;
            println!(
                "tracking {} ({}) at {}",
                product.title, product.id, product.current_price
            );
        }
        Command::Untrack { id } => {
            if engine.untrack(&id).await? {
                println!("stopped tracking {id}");
            } else {
                println!("no tracked product with id {id}");
            }
        }
        Command::List => {
            for product in store.list_products().await? {
                println!(
                    "{}  {}  {}  {}{}",
                    product.id,
                    product.title,
                    product.url,
                    product.current_price,
                    if product.on_sale { " (on sale)" } else { "" },
                );
            }
        }
        Command::AddDestination { chat_id, thread_id } => {
            let destination = destination_from_args(chat_id, thread_id);
            store.add_destination(&destination).await?;
            println!("added destination {destination}");
        }
        Command::RemoveDestination { chat_id, thread_id } => {
            let destination = destination_from_args(chat_id, thread_id);
            if store.remove_destination(&destination).await? {
                println!("removed destination {destination}");
            } else {
                println!("no such destination {destination}");
            }
        }
    }

    Ok(())
}

fn build_runner(
    config: &AppConfig,
    engine: Arc<PriceRefreshEngine>,
    store: Arc<dyn ProductStore>,
) -> Result<Arc<SweepRunner>> {
    let transport = Arc::new(TelegramTransport::new(&config.telegram)?);
    let fanout = Arc::new(NotificationFanout::new(transport));
    Ok(Arc::new(SweepRunner::new(engine, fanout, store)))
}
