//! OTP Gateway - Entry point.

use anyhow::Context;
use otp_gateway::{
    api::{create_router_with_rate_limit, AppState, Backends, RateLimitState},
    config::Config,
    EphemeralStore, HttpForwarder, MemoryStore, MemoryUserStore, PgUserStore, RedisStore,
    TwilioNotifier, UserStore,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use twilio_client::TwilioClient;

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&config);

    info!("Starting OTP Gateway");

    if let Err(e) = run(config).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

/// Initialize logging. `RUST_LOG` takes precedence over the configured level.
fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.log.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    // Initialize ephemeral storage
    let store: Arc<dyn EphemeralStore> = match &config.store.redis_url {
        Some(url) => Arc::new(
            RedisStore::connect(url, config.store.op_timeout)
                .await
                .context("Failed to connect to Redis")?,
        ),
        None => {
            warn!("No redis_url configured, challenges are held in process memory");
            Arc::new(MemoryStore::new())
        }
    };

    // Initialize user storage
    let users: Arc<dyn UserStore> = match &config.database.url {
        Some(url) => Arc::new(
            PgUserStore::connect(
                url,
                config.database.max_connections,
                config.database.acquire_timeout,
            )
            .await
            .context("Failed to connect to Postgres")?,
        ),
        None => {
            warn!("No database url configured, users are held in process memory");
            Arc::new(MemoryUserStore::new())
        }
    };

    // Initialize outbound clients
    let twilio = TwilioClient::new(
        config.twilio.api_url.clone(),
        config.twilio.account_sid.clone(),
        config.twilio.auth_token.clone(),
        config.twilio.messaging_service_sid.clone(),
        config.twilio.timeout,
    )
    .context("Failed to create Twilio client")?;
    if config.twilio.account_sid.is_empty() {
        warn!("Twilio account SID is not configured, SMS delivery will fail");
    }

    let forwarder = HttpForwarder::new(config.upstream.core_url.clone(), config.upstream.timeout)
        .context("Failed to create downstream client")?;

    // Create application state
    let state = AppState::new(
        &config,
        Backends {
            store,
            users,
            notifier: Arc::new(TwilioNotifier::new(twilio)),
            forwarder: Arc::new(forwarder),
        },
    )
    .context("Failed to build application state")?;

    // Create router with rate limiting
    let rate_limit = RateLimitState::new(config.rate_limit.global_per_minute);
    let app = create_router_with_rate_limit(state, rate_limit, config.server.request_timeout);

    // Bind to address
    let addr = listen_addr(&config)?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")
}

fn listen_addr(config: &Config) -> anyhow::Result<SocketAddr> {
    let ip = config
        .server
        .listen_addr
        .parse()
        .with_context(|| format!("Invalid listen address {:?}", config.server.listen_addr))?;
    Ok(SocketAddr::new(ip, config.server.port))
}
