use std::path::PathBuf;
use std::process::ExitCode;

use platformer_engine::{
    ActorRegistry, DescriptionError, ImageHandle, Map, MapConfig, MapDescription, MapEvent,
    MapLoadError, MapLoader, Rect, RenderSink,
};
use thiserror::Error;
use tracing::{debug, error, info};

use super::bootstrap::AppWiring;
use super::demo::{DEMO_MAP, DEMO_MAP_ORIGIN};

/// Headless simulation settings.
#[derive(Debug, Clone)]
pub(crate) struct LoopConfig {
    /// JSON map description; the built-in demo when unset.
    pub map_path: Option<PathBuf>,
    pub ticks: u32,
    pub viewport: (u32, u32),
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            map_path: None,
            ticks: 600,
            viewport: (320, 192),
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error(transparent)]
    Description(#[from] DescriptionError),
    #[error(transparent)]
    Load(#[from] MapLoadError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RunSummary {
    pub ticks: u32,
    pub blits: u64,
    pub sounds: u32,
    pub triggers_fired: u32,
    pub actors: usize,
}

/// Render sink that only counts what would be drawn.
#[derive(Debug)]
struct CountingSink {
    size: (u32, u32),
    blits: u64,
}

impl RenderSink for CountingSink {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn blit(
        &mut self,
        _image: ImageHandle,
        _screen_pos: (i32, i32),
        _source_area: Option<Rect>,
        _alpha: Option<u8>,
    ) {
        self.blits += 1;
    }
}

pub(crate) fn run(app: AppWiring) -> ExitCode {
    match simulate(&app.config, app.registry) {
        Ok(summary) => {
            info!(
                ticks = summary.ticks,
                blits = summary.blits,
                sounds = summary.sounds,
                triggers_fired = summary.triggers_fired,
                actors = summary.actors,
                "simulation_finished"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "startup_failed");
            ExitCode::FAILURE
        }
    }
}

pub(crate) fn load_map(config: &LoopConfig, registry: ActorRegistry) -> Result<Map, AppError> {
    let description = match &config.map_path {
        Some(path) => MapDescription::from_path(path)?,
        None => MapDescription::from_json_str(DEMO_MAP, DEMO_MAP_ORIGIN)?,
    };
    let map_config = MapConfig {
        viewport: config.viewport,
        ..MapConfig::default()
    };
    let map = MapLoader::new(registry)
        .with_config(map_config)
        .load(&description)?;
    Ok(map)
}

pub(crate) fn simulate(config: &LoopConfig, registry: ActorRegistry) -> Result<RunSummary, AppError> {
    let mut map = load_map(config, registry)?;
    let mut sink = CountingSink {
        size: config.viewport,
        blits: 0,
    };
    let mut summary = RunSummary::default();

    for tick in 0..config.ticks {
        map.update();
        map.draw(&mut sink);
        for event in map.drain_events() {
            match event {
                MapEvent::PlaySound { name, volume } => {
                    debug!(tick, sound = %name, volume, "play_sound");
                    summary.sounds += 1;
                }
                MapEvent::TriggerFired { name } => {
                    info!(tick, trigger = %name, "trigger_fired_event");
                    summary.triggers_fired += 1;
                }
            }
        }
        summary.ticks += 1;
    }

    summary.blits = sink.blits;
    summary.actors = map.actors().count();
    Ok(summary)
}
