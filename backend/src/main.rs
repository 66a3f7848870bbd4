use std::sync::Arc;
use tourney_server::{
    config::Config,
    db::{self, MemoryStore, SqliteStore, TournamentStore},
    game::SimulatedEngine,
    tournament::{TournamentConfig, TournamentContext, TournamentManager, TournamentSystem},
    ws::SessionTracker,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load config
    let config = Config::from_env()?;
    let demo = config.demo.clone();

    // Results go to sqlite when a database is configured
    let store: Arc<dyn TournamentStore> = match &config.database_url {
        Some(url) => {
            let pool = db::create_pool(url).await?;
            tracing::info!("Database connected");
            db::run_migrations(&pool).await?;
            Arc::new(SqliteStore::new(pool))
        }
        None => {
            tracing::info!("DATABASE_URL not set, keeping results in memory");
            Arc::new(MemoryStore::new())
        }
    };

    let engine = match demo.seed {
        Some(seed) => SimulatedEngine::with_seed(seed, demo.move_delay),
        None => SimulatedEngine::new(demo.move_delay),
    };
    let sessions = Arc::new(SessionTracker::new());

    let ctx = Arc::new(TournamentContext::new(
        Arc::new(engine),
        sessions.clone(),
        store,
        config.clock,
        config.event_capacity,
    ));
    let manager = TournamentManager::new(ctx);

    // Build the demo tournament
    let name = format!("Demo {}", demo.system);
    let tournament_config = match demo.system {
        TournamentSystem::Arena => TournamentConfig::arena(name, demo.minutes),
        TournamentSystem::Swiss => TournamentConfig::swiss(name, demo.rounds),
        TournamentSystem::RoundRobin => TournamentConfig::round_robin(name, demo.rounds),
    }
    .with_before_start(demo.before_start_minutes)
    .with_variant(demo.variant.clone());

    let tournament = manager.create(tournament_config).await?;

    for i in 1..=demo.players {
        let username = format!("player_{:02}", i);
        manager.join(tournament.id(), &username).await?;
        sessions.connect(&username, tournament.id());
    }

    // Run until the clock finishes or the process is interrupted
    tokio::select! {
        _ = tournament.wait_finished() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, shutting down");
            manager.shutdown_all().await;
        }
    }

    for standing in tournament.standings().await {
        tracing::info!(
            "#{:<3} {:<12} {:>3} points in {} games",
            standing.position,
            standing.username,
            standing.score,
            standing.games
        );
    }

    manager.cleanup_finished().await;
    Ok(())
}
