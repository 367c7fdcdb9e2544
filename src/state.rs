//! Application State: the set of shared services every gateway request
//! touches. Bundled behind a single `Arc` and threaded through axum via
//! `Extension` rather than a global, so tests can build their own instance.

use crate::auth::BcryptCache;
use crate::channel::ChannelRegistry;
use crate::config::Config;
use crate::multiplayer::MatchRegistry;
use crate::presence::BotPresenceCache;
use crate::session::SessionRegistry;
use sea_orm::DatabaseConnection;

pub struct AppState {
    pub db: DatabaseConnection,
    pub bcrypt_cache: BcryptCache,
    pub sessions: SessionRegistry,
    pub channels: ChannelRegistry,
    pub matches: MatchRegistry,
    pub bot_presence: BotPresenceCache,
    pub config: Config,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: Config) -> Self {
        let matches = MatchRegistry::new(config.match_registry.capacity);
        Self {
            db,
            bcrypt_cache: BcryptCache::new(),
            sessions: SessionRegistry::new(),
            channels: ChannelRegistry::new(),
            matches,
            bot_presence: BotPresenceCache::default(),
            config,
        }
    }
}
