mod assembly;
mod camera;
mod collision;
mod enemy;
mod geometry;
mod grid;
mod interactions;
mod player;
mod progress;
mod session;
mod tiles;
mod tuning;

pub use assembly::{
    assemble_level, AssembledLevel, LayerKind, LevelLayers, LevelLoadError, LoadProgress,
};
pub use camera::Camera;
pub use collision::{
    resolve_horizontal, resolve_patrol, resolve_vertical, HorizontalHit, PatrolContact,
    VerticalContact, WallSide,
};
pub use enemy::Enemy;
pub use geometry::{Penetration, Rect, Vec2, TILE_SIZE};
pub use grid::{GridError, LayerGrid, EMPTY_CELL};
pub use interactions::{classify_enemy_contact, EnemyContact};
pub use player::{DamageOutcome, MoveIntent, Player, PlayerInput, PlayerState, PlayerTickReport};
pub use progress::{
    weighted_score, Abilities, InitialState, LevelRecord, LevelStats, PlayerProgress, Preferences,
    DEFAULT_LEVEL_COUNT, PROGRESS_VERSION,
};
pub use session::{
    DrawLayer, Effect, EffectKind, LevelEvent, LevelLoader, LevelOutcome, LevelSession,
    SessionState, DRAW_ORDER,
};
pub use tiles::{
    FlagAnimation, FlagState, LoopingAnimation, Partition, Pickup, SpriteFrame, StaticTile,
    TileRole, TileWorld, VisualBehavior,
};
pub use tuning::{
    CameraTuning, EnemyTuning, GameTuning, HazardTuning, PlayerTuning, SessionTuning,
    VIEWPORT_HEIGHT, VIEWPORT_WIDTH,
};
