//! receipts - birthday-gated reflections for a small circle of friends

use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use receipts::{
    config::{Args, StoreBackend},
    notify::{DisabledNotifier, EmailJsNotifier, Notifier},
    scheduler::ReminderScheduler,
    server,
    store::{DocumentStore, MemoryStore, NatsKvStore},
    Club, ClubSettings,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("receipts={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let calendar = args.calendar().map_err(anyhow::Error::msg)?;
    let admin_secret = args
        .admin_secret()
        .ok_or_else(|| anyhow::anyhow!("ADMIN_SECRET is required"))?;

    info!("======================================");
    info!("  receipts");
    info!("  come back on your birthday");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("Timezone: {} (today is {})", calendar.zone(), calendar.today());
    info!("Site URL: {}", args.site_url);
    info!("Store: {:?}", args.store_backend);
    if args.store_backend == StoreBackend::Nats {
        info!("NATS: {} bucket={} key={}", args.nats.nats_url, args.nats.nats_bucket, args.nats.nats_key);
    }
    info!("Reminder interval: {}s", args.reminder_interval_secs);
    info!("Session TTL: {}s", args.session_ttl_secs);
    info!("Admin secret: {}", if args.admin_secret.is_some() { "set" } else { "dev default" });
    info!("======================================");

    let store: Arc<dyn DocumentStore> = match args.store_backend {
        StoreBackend::Nats => match NatsKvStore::connect(&args.nats_config()).await {
            Ok(store) => Arc::new(store),
            Err(e) if args.dev_mode => {
                warn!("NATS unavailable (dev mode, continuing in memory): {}", e);
                Arc::new(MemoryStore::new())
            }
            Err(e) => {
                error!("NATS unavailable: {}", e);
                std::process::exit(1);
            }
        },
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
    };

    let notifier: Arc<dyn Notifier> = match args.emailjs_config() {
        Some(config) => Arc::new(EmailJsNotifier::new(config)?),
        None => {
            warn!("EmailJS not configured, notifications disabled");
            Arc::new(DisabledNotifier)
        }
    };

    let club = Arc::new(
        Club::new(
            store,
            notifier,
            ClubSettings {
                admin_secret,
                site_url: args.site_url.clone(),
                calendar,
            },
        )
        .with_session_ttl(args.session_ttl()),
    );

    info!("Notifier: {}", club.notifier_id());
    club.load().await;

    let watch_handle = match club.sync().spawn_watch().await {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Remote updates unavailable, running without them: {}", e);
            None
        }
    };

    let (stop_scheduler, shutdown) = watch::channel(false);
    let scheduler = tokio::spawn(
        ReminderScheduler::new(Arc::clone(&club), args.reminder_interval()).run(shutdown),
    );

    let app = server::create_router(Arc::clone(&club), args.static_dir.as_deref());
    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    info!("Listening on {}", args.listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down");
    let _ = stop_scheduler.send(true);
    if let Err(e) = scheduler.await {
        warn!("Reminder scheduler ended abnormally: {}", e);
    }
    if let Some(handle) = watch_handle {
        handle.abort();
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
