use log::LevelFilter;
use serde::Deserialize;
use std::{env, fs::read_to_string, path::Path};

/// The server version extracted from the Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable key to load the config from
const CONFIG_ENV_KEY: &str = "BANCHO_RELAY_CONFIG_JSON";

pub fn load_config() -> Option<Config> {
    // Attempt to load the config from the env
    if let Ok(env) = env::var(CONFIG_ENV_KEY) {
        let config: Config = match serde_json::from_str(&env) {
            Ok(value) => value,
            Err(err) => {
                eprintln!("Failed to load env config (Using default): {:?}", err);
                return None;
            }
        };
        return Some(config);
    }

    // Attempt to load the config from disk
    let file = Path::new("config.json");
    if !file.exists() {
        return None;
    }

    let data = match read_to_string(file) {
        Ok(value) => value,
        Err(err) => {
            eprintln!("Failed to load config file (Using defaults): {:?}", err);
            return None;
        }
    };

    let config: Config = match serde_json::from_str(&data) {
        Ok(value) => value,
        Err(err) => {
            eprintln!("Failed to load config file (Using default): {:?}", err);
            return None;
        }
    };

    Some(config)
}

#[derive(Deserialize)]
#[serde(default)]
pub struct Config {
    pub port: u16,
    pub database_file: String,
    pub logging: LevelFilter,
    pub log_dir: String,
    pub gateway: GatewayConfig,
    pub score_submission: ScoreSubmissionConfig,
    pub match_registry: MatchRegistryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 80,
            database_file: "data/bancho.db".to_string(),
            logging: LevelFilter::Info,
            log_dir: "data/logs".to_string(),
            gateway: Default::default(),
            score_submission: Default::default(),
            match_registry: Default::default(),
        }
    }
}

/// Gateway-facing knobs: how often the inactivity sweeper runs, how long a
/// session can go silent before it's reclaimed by a fresh login of the same
/// name, and how long it can go silent before the sweeper evicts it outright.
#[derive(Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub idle_sweep_interval_secs: u64,
    pub idle_timeout_secs: u64,
    pub ghost_reclaim_silence_secs: u64,
    /// Oldest client build date (`YYYYMMDD`) accepted at login; compared
    /// lexicographically since the client sends it in that format.
    pub min_client_build_date: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            idle_sweep_interval_secs: 30,
            idle_timeout_secs: 60,
            ghost_reclaim_silence_secs: 10,
            min_client_build_date: "20200101".to_string(),
        }
    }
}

/// Per-mode pp caps (indexed `[mode][flashlight]`) above which a submitted
/// score triggers automatic restriction, plus where replay files live.
#[derive(Deserialize)]
#[serde(default)]
pub struct ScoreSubmissionConfig {
    pub pp_cap_no_flashlight: [f32; 4],
    pub pp_cap_flashlight: [f32; 4],
    pub replay_dir: String,
}

impl Default for ScoreSubmissionConfig {
    fn default() -> Self {
        Self {
            pp_cap_no_flashlight: [700.0, 700.0, 700.0, 1200.0],
            pp_cap_flashlight: [600.0, 600.0, 600.0, 1000.0],
            replay_dir: "data/osr".to_string(),
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
pub struct MatchRegistryConfig {
    pub capacity: usize,
}

impl Default for MatchRegistryConfig {
    fn default() -> Self {
        Self { capacity: 64 }
    }
}
