use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Notify;
use tracing::{info, warn};

use thread_store::handler::{parse_args, respond, HandlerResult};
use thread_store::store::{MemoryBackend, MemoryConnection};
use thread_store::{
    logging, Args, Callbacks, Config, HandlerRegistry, Inline, Manager, Query,
};

/// Faction used by the demo requests.
const DEMO_FACTION: u64 = 123;
const DEMO_MEMBERS: &[&str] = &["alice", "bob", "carol"];
const DEMO_ROUNDS: u32 = 5;
const DEMO_TICK: Duration = Duration::from_millis(200);

#[derive(Deserialize)]
struct FactionArgs {
    faction: u64,
}

/// Members of a faction, plus a hit counter to show writes from workers.
fn fetch_members(conn: &mut MemoryConnection, args: &Args) -> HandlerResult {
    let FactionArgs { faction } = parse_args(args)?;
    let members = conn.smembers(&format!("faction:{}:members", faction))?;
    let hits = conn.incr_by("test", 1)?;

    respond(&json!({
        "faction": faction,
        "members": members,
        "hits": hits,
    }))
}

fn seed_members(conn: &mut MemoryConnection, capture: &Value, args: &Args) -> HandlerResult {
    let FactionArgs { faction } = parse_args(args)?;
    let members: Vec<String> = parse_args(capture)?;

    let key = format!("faction:{}:members", faction);
    let mut added = 0;
    for member in members {
        if conn.sadd(&key, member)? {
            added += 1;
        }
    }
    respond(&added)
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::from_env()?;
    logging::init(&config.logging);

    info!(
        version = thread_store::PKG_VERSION,
        build = thread_store::BUILD_VERSION,
        "Starting thread_store demo host..."
    );
    config.log_summary();

    // The host is single-threaded; all blocking work goes to the pool
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config))
}

async fn async_main(config: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let notify = Arc::new(Notify::new());
    let backend = MemoryBackend::from_dsn(&config.store.dsn)?;
    let registry = HandlerRegistry::new().with("fetch_members", fetch_members);

    let mut manager = Manager::connect(backend, registry, config.store.clone(), notify.clone())?;

    let seed = Inline::with_capture(seed_members, &DEMO_MEMBERS)?;
    let seeded = manager.submit_and_await(Query::inline(seed, json!({ "faction": DEMO_FACTION })))?;
    info!(added = %seeded.payload(), "Demo data seeded");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut ticker = tokio::time::interval(DEMO_TICK);
    let mut round = 0;

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
            _ = notify.notified() => {
                if let Err(e) = manager.drain_due() {
                    warn!(error = %e, "Callback failed");
                }
            }
            _ = ticker.tick() => {
                if round == DEMO_ROUNDS {
                    break;
                }
                round += 1;
                submit_round(&mut manager, round)?;
            }
        }
    }

    // Future-based request, resolved by the same drain loop
    let members = manager.request(Query::named(
        "fetch_members",
        json!({ "faction": DEMO_FACTION }),
    ))?;
    tokio::pin!(members);
    loop {
        tokio::select! {
            outcome = &mut members => {
                match outcome {
                    Ok(response) => info!(response = %response.payload(), "Request resolved"),
                    Err(failure) => warn!(stage = %failure.stage(), "Request failed: {}", failure.message()),
                }
                break;
            }
            _ = notify.notified() => {
                manager.drain_due()?;
            }
        }
    }

    manager.await_all()?;

    let stats = manager.stats();
    info!(
        workers = stats.workers,
        submitted = stats.submitted,
        completed = stats.completed,
        failed = stats.failed,
        "Demo finished"
    );

    manager.shutdown();
    Ok(())
}

/// One tick of demo traffic: a burst of reads and one malformed request.
fn submit_round(
    manager: &mut Manager<MemoryBackend>,
    round: u32,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    for _ in 0..3 {
        manager.submit(
            Query::named("fetch_members", json!({ "faction": DEMO_FACTION })),
            Callbacks::none().on_success(move |response| {
                info!(round, response = %response.payload(), "Members fetched");
                Ok(())
            }),
        )?;
    }

    manager.submit(
        Query::named("fetch_members", json!({ "faction": "not-a-number" })),
        Callbacks::none().on_error(move |failure| {
            warn!(round, stage = %failure.stage(), "Expected failure: {}", failure.message());
            Ok(())
        }),
    )?;

    info!(
        round,
        workers = manager.worker_count(),
        load = manager.load(),
        "Round submitted"
    );
    Ok(())
}
