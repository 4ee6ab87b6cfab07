use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use cove_engine::world::{LevelOutcome, PlayerProgress};
use cove_engine::{AppPaths, DefDatabase, LevelDef, Scene};
use tracing::{info, warn};

use super::save::SaveStore;

mod level;
mod overworld;


pub(crate) use level::LevelScene;
pub(crate) use overworld::OverworldScene;

/// State shared by both scenes: the catalog, the player record and the
/// store it is written to.
pub(crate) struct GameState {
    paths: AppPaths,
    defs: DefDatabase,
    progress: PlayerProgress,
    store: SaveStore,
    /// Level whose node the overworld marker starts on.
    marker_level: u32,
}

pub(crate) type SharedState = Rc<RefCell<GameState>>;

impl GameState {
    pub(crate) fn new(
        paths: AppPaths,
        defs: DefDatabase,
        mut progress: PlayerProgress,
        store: SaveStore,
    ) -> Self {
        if defs.level(progress.current_level).is_none() {
            progress.current_level = defs.levels().first().map_or(1, |level| level.id);
        }
        let marker_level = progress.current_level;
        Self {
            paths,
            defs,
            progress,
            store,
            marker_level,
        }
    }

    pub(crate) fn defs(&self) -> &DefDatabase {
        &self.defs
    }

    pub(crate) fn progress(&self) -> &PlayerProgress {
        &self.progress
    }

    pub(crate) fn current_level(&self) -> u32 {
        self.progress.current_level
    }

    pub(crate) fn marker_level(&self) -> u32 {
        self.marker_level
    }

    pub(crate) fn is_selectable(&self, level: u32) -> bool {
        self.defs.level(level).is_some() && self.progress.is_unlocked(level)
    }

    /// Moves the selection; ignored for locked or unknown levels.
    pub(crate) fn select_level(&mut self, level: u32) -> bool {
        if !self.is_selectable(level) {
            return false;
        }
        self.progress.current_level = level;
        true
    }

    pub(crate) fn current_level_def(&self) -> Option<&LevelDef> {
        self.defs.level(self.progress.current_level)
    }

    pub(crate) fn level_dir(&self, level: &LevelDef) -> PathBuf {
        self.paths.levels_dir.join(&level.directory)
    }

    /// Folds a finished attempt into the record and writes it out. A failed
    /// write keeps the in-memory record.
    pub(crate) fn record_outcome(&mut self, outcome: &LevelOutcome) {
        outcome.apply_to(&mut self.progress);
        if self.defs.level(self.progress.current_level).is_none() {
            self.progress.current_level = outcome.level_id;
        }
        self.marker_level = outcome.level_id;
        info!(
            level_id = outcome.level_id,
            completed = outcome.completed,
            max_level = self.progress.max_level,
            current_level = self.progress.current_level,
            total_score = self.progress.total_score(),
            "progress_updated"
        );
        self.persist();
    }

    /// Called when the overworld hands control to a level.
    pub(crate) fn mark_departure(&mut self) {
        self.marker_level = self.progress.current_level;
        self.persist();
    }

    fn persist(&self) {
        if let Err(error) = self.store.save(&self.progress) {
            warn!(error = %error, path = %self.store.path().display(), "save_failed");
        }
    }
}

pub(crate) fn build_scene_pair(state: &SharedState) -> (Box<dyn Scene>, Box<dyn Scene>) {
    (
        Box::new(OverworldScene::new(Rc::clone(state))),
        Box::new(LevelScene::new(Rc::clone(state))),
    )
}
