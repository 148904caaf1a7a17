// demos/src/bin/dry_run.rs
//
// A full mirroring session between two in-memory venues.
//
// The remote book drifts for a few rounds; each update is mirrored onto
// origin at a premium. Origin asks are then filled, the fills are hedged on
// remote, and remote fills complete the hedges. Finally a volatility spike
// trips the circuit breaker and the bot aborts back to idle.
//
// Run this example with:
//   cargo run --bin dry_run
//   (from the demos directory)
//
// Set LOGLEVEL=DEBUG for the full event trace.

use liquidity_mirror::prelude::*;
use liquidity_mirror::{HistoryConfig, mirror::dummy::fill_side};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), MirrorError> {
    setup_logger();
    info!("Liquidity mirror dry run");

    let balance = Balance::new(Decimal::from(100), Decimal::from(100_000));
    let origin = Arc::new(DummyVenue::new("origin").with_balance(balance));
    let remote = Arc::new(DummyVenue::new("remote").with_balance(balance));

    let config = MirrorConfig::new(Decimal::new(102, 2))
        .with_min_value(Decimal::from(500))
        .with_max_orders(6)
        .with_tolerance(Decimal::new(1, 3), ToleranceMode::Relative)
        .with_max_volatility(Decimal::new(5, 2))
        .with_history(HistoryConfig {
            capacity: 50,
            interval_ms: 0,
            rolling_num: 5,
        });

    let bot = MirrorBot::new(origin.clone(), remote.clone(), config)?;
    bot.start().await?;

    // Phase 1: mirror a drifting book
    for round in 0..5 {
        let mid = Decimal::from(1000 + round * 3);
        remote.publish_book(make_book(mid)?);
        settle().await;
        info!(
            "round {}: origin quotes {:?}",
            round,
            origin
                .orders()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
        );
    }

    // Phase 2: origin asks get lifted, hedges are matched on remote
    origin.set_behavior(fill_side(Side::Ask));
    let fills = origin.tick();
    info!("origin filled {} asks", fills.len());
    settle().await;

    remote.set_behavior(fill_side(Side::Bid));
    let matched = remote.tick();
    info!("remote matched {} hedges", matched.len());
    settle().await;

    let stats = bot.stats();
    info!(
        "matched {} worth {}, pending {}, premium profit {}",
        stats.num_matched, stats.value_matched, stats.num_pending, stats.premium_profit
    );

    // Phase 3: a spike trips the breaker
    remote.publish_book(make_book(Decimal::from(1200))?);
    settle().await;

    if bot.state() == BotState::Idle {
        info!("bot aborted on volatility, origin holds {} orders", origin.orders().len());
    } else {
        warn!("bot still {}, stopping", bot.state());
        bot.stop().await?;
    }

    info!("final diagnostics: {}", bot.diagnostics().to_json());
    Ok(())
}

/// Five levels per side around `mid`
fn make_book(mid: Decimal) -> Result<BookUpdate, MirrorError> {
    let mut bids = Vec::new();
    let mut asks = Vec::new();
    for step in 1..=5 {
        let offset = Decimal::from(step * 2);
        let quantity = Decimal::new(5 + step, 1);
        bids.push(Level::new(quantity, mid - offset)?);
        asks.push(Level::new(quantity, mid + offset)?);
    }
    Ok(BookUpdate::Sided { bids, asks })
}

/// Gives the dispatch tasks time to drain
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
