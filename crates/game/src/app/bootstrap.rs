use std::cell::RefCell;
use std::rc::Rc;

use cove_engine::content::compile_def_database;
use cove_engine::world::PlayerProgress;
use cove_engine::{resolve_app_paths, ContentCompileError, LoopConfig, Scene, StartupError};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::gameplay::{self, GameState};
use super::save::SaveStore;

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("failed to compile defs: {0}")]
    Content(#[from] ContentCompileError),
    #[error("the level catalog is empty; add a <LevelDef> under assets/base/defs")]
    NoLevels,
}

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) overworld: Box<dyn Scene>,
    pub(crate) level: Box<dyn Scene>,
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    init_tracing();
    info!("=== Skull Cove Startup ===");

    let paths = resolve_app_paths()?;
    let defs = compile_def_database(&paths.defs_dir())?;
    if defs.level_count() == 0 {
        return Err(BootstrapError::NoLevels);
    }

    let store = SaveStore::new(&paths.saves_dir);
    let progress = store.load_or_default(PlayerProgress::new_game(
        defs.level_count(),
        &defs.tuning().player,
    ));
    let state = Rc::new(RefCell::new(GameState::new(paths, defs, progress, store)));
    let (overworld, level) = gameplay::build_scene_pair(&state);

    let config = LoopConfig::default().with_env_overrides();
    info!(
        debug_outlines = config.debug_outlines,
        target_tps = config.target_tps,
        "game_configured"
    );

    Ok(AppWiring {
        config,
        overworld,
        level,
    })
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
