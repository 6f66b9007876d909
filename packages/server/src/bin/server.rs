//! Yoriai coordinator server.
//!
//! Accepts authenticated WebSocket connections, tracks presence, fans out room messages and
//! typing indicators, and exposes the membership-mutation REST routes.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin yoriai-server
//! cargo run --bin yoriai-server -- --host 0.0.0.0 --port 3000 --seed config/seed.example.json
//! ```

use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use yoriai_server::{
    config::{ConfigError, HeartbeatConfig, SeedData, ServerConfig},
    infrastructure::{
        auth::StaticTokenVerifier,
        message_pusher::WebSocketMessagePusher,
        notification::PersonalChannelNotifier,
        repository::{InMemoryMembershipStore, InMemoryMessageStore},
    },
    ui::Server,
    usecase::{Collaborators, Coordinator, CoordinatorConfig},
};
use yoriai_shared::{
    logger::setup_logger,
    time::{Clock, SystemClock},
};

#[derive(Parser, Debug)]
#[command(name = "yoriai-server")]
#[command(about = "Real-time presence and room broadcast coordinator", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,

    /// JSON seed file with users (tokens) and rooms; a demo seed is used when omitted
    #[arg(long)]
    seed: Option<PathBuf>,

    /// Typing indicator expiry in milliseconds
    #[arg(long, default_value = "5000")]
    typing_expiry_ms: u64,

    /// Interval between WebSocket pings in seconds (at least 1)
    #[arg(long, default_value = "30", value_parser = clap::value_parser!(u64).range(1..))]
    heartbeat_interval_secs: u64,

    /// Extra silence tolerated after a missed ping, in seconds
    #[arg(long, default_value = "10")]
    heartbeat_timeout_secs: u64,

    /// Maximum number of messages kept by the in-memory message store
    #[arg(long, default_value = "10000")]
    message_capacity: usize,

    /// Default log level when RUST_LOG is not set
    #[arg(long, default_value = "debug")]
    log_level: String,
}

impl Args {
    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
            message_capacity: self.message_capacity,
            heartbeat: HeartbeatConfig {
                interval: Duration::from_secs(self.heartbeat_interval_secs),
                timeout: Duration::from_secs(self.heartbeat_timeout_secs),
            },
            coordinator: CoordinatorConfig {
                typing_expiry: Duration::from_millis(self.typing_expiry_ms),
            },
        }
    }

    fn seed(&self) -> Result<SeedData, ConfigError> {
        match &self.seed {
            Some(path) => SeedData::load(path),
            None => Ok(SeedData::demo()),
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), &args.log_level);

    let config = args.server_config();
    let seed = match args.seed().and_then(SeedData::validate) {
        Ok(seed) => seed,
        Err(e) => {
            tracing::error!("Failed to load seed: {}", e);
            std::process::exit(1);
        }
    };
    tracing::info!(
        users = seed.tokens.len(),
        rooms = seed.rooms.len(),
        "Seed loaded"
    );

    // Initialize dependencies in order:
    // 1. Collaborators (auth, stores, pusher, notifier)
    // 2. Coordinator
    // 3. Server
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let message_pusher = Arc::new(WebSocketMessagePusher::new());
    let membership_store = Arc::new(InMemoryMembershipStore::with_rooms(seed.rooms));
    let message_store = Arc::new(InMemoryMessageStore::new(
        seed.directory,
        config.message_capacity,
        clock.clone(),
    ));
    let notification_fanout = Arc::new(PersonalChannelNotifier::new(
        membership_store.clone(),
        message_pusher.clone(),
    ));
    let auth_verifier = Arc::new(StaticTokenVerifier::new(seed.tokens));

    let coordinator = Arc::new(Coordinator::new(
        Collaborators {
            auth_verifier,
            membership_store: membership_store.clone(),
            message_store,
            notification_fanout,
            message_pusher,
            clock: clock.clone(),
        },
        config.coordinator,
    ));

    let server = Server::new(coordinator, membership_store, config.heartbeat, clock);
    if let Err(e) = server.run(&config.bind_addr()).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
