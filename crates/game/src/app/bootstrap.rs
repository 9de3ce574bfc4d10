use std::path::PathBuf;

use platformer_engine::ActorRegistry;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::demo;
use super::loop_runner::LoopConfig;

const MAP_ENV_VAR: &str = "PLATFORMER_MAP";
const TICKS_ENV_VAR: &str = "PLATFORMER_TICKS";

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) registry: ActorRegistry,
}

pub(crate) fn build_app() -> AppWiring {
    init_tracing();
    info!("=== Platformer Startup ===");

    let config = LoopConfig {
        map_path: std::env::var(MAP_ENV_VAR).ok().map(PathBuf::from),
        ticks: parse_ticks(std::env::var(TICKS_ENV_VAR).ok().as_deref()),
        ..LoopConfig::default()
    };

    AppWiring {
        config,
        registry: demo::demo_registry(),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn parse_ticks(raw: Option<&str>) -> u32 {
    let default = LoopConfig::default().ticks;
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return default;
    };
    raw.parse().unwrap_or_else(|_| {
        warn!(var = TICKS_ENV_VAR, value = %raw, "invalid_tick_count");
        default
    })
}
