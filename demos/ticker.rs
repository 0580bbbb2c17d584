//! Terminal ticker: prints the watchlist every time the engine publishes.
//!
//! ```text
//! RUST_LOG=ticker_sync=debug cargo run --example ticker
//! ```
//!
//! Pass coin ids as arguments to add them to the watchlist first.

use ticker_sync::{SyncConfig, SyncEngine, SyncStatus};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = SyncConfig::from_env();
    let engine = SyncEngine::from_config(&config)?;

    let service = engine.service();
    for id in std::env::args().skip(1) {
        service.search(&id).await;
        let hit = service
            .search_state()
            .results
            .into_iter()
            .find(|coin| coin.id == id);
        match hit {
            Some(coin) => {
                service.add_coin(&coin)?;
            }
            None => eprintln!("No coin with id {:?}", id),
        }
    }

    println!(
        "Tracking {} (auto-update: {}, every {}s)",
        engine.watchlist().ids().join(", "),
        engine.preferences().auto_update_enabled,
        engine.refresh_interval().as_secs()
    );

    let mut updates = engine.subscribe();
    engine.start();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                match &state.status {
                    SyncStatus::Loading => println!("Refreshing..."),
                    SyncStatus::Failed(message) => {
                        println!("Error: {}", message);
                        if let Some(age) = state.age() {
                            let stale = state.is_stale(engine.refresh_interval().as_secs() * 2);
                            println!(
                                "  showing prices from {}s ago{}",
                                age.as_secs(),
                                if stale { " (stale)" } else { "" }
                            );
                        }
                    }
                    SyncStatus::Succeeded(at) => {
                        println!("Last updated {}", at.format("%H:%M:%S"));
                        for coin in &state.coins {
                            let arrow = if coin.is_up() { "▲" } else { "▼" };
                            println!(
                                "  {:<8} {:<20} {:>14} {} {:+.2}%",
                                coin.symbol.to_uppercase(),
                                coin.name,
                                format!("${:.2}", coin.current_price.unwrap_or_default()),
                                arrow,
                                coin.price_change_percentage_24h.unwrap_or_default()
                            );
                        }
                    }
                    SyncStatus::Idle => {}
                }
            }
        }
    }

    engine.shutdown();
    let metrics = engine.metrics();
    println!(
        "{} fetches, {:.0}% ok, p50 {:.0}ms",
        metrics.total_fetches,
        metrics.success_rate * 100.0,
        metrics.latency_p50_ms
    );
    Ok(())
}
