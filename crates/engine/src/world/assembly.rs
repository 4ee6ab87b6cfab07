use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::sprite_keys::{pickup_sprite_key, tile_sprite_key, FLAG_SPRITE_ROOT};

use super::enemy::Enemy;
use super::geometry::{Rect, Vec2, TILE_SIZE};
use super::grid::{GridError, LayerGrid, EMPTY_CELL};
use super::progress::InitialState;
use super::tiles::{
    FlagAnimation, LoopingAnimation, Partition, Pickup, StaticTile, TileRole, TileWorld,
    VisualBehavior,
};
use super::tuning::GameTuning;

const LAYER_COUNT: usize = 12;
const TILE_ANIMATION_FRAMES: u32 = 4;
const TILE_FRAMES_PER_TICK: f32 = 0.15;
const FLAG_FRAMES: u32 = 6;
const COIN_SIZE: f32 = 32.0;
const COLLECTIBLE_SIZE: f32 = 40.0;
const COLLECTIBLE_COLLIDE_HEIGHT: f32 = 26.0;

/// Terrain codes drawn behind the player that never collide.
const BACKGROUND_TERRAIN_CODES: [i32; 16] =
    [4, 5, 6, 7, 8, 9, 10, 13, 16, 17, 18, 19, 20, 21, 22, 23];

const PLAYER_SPAWN_CODE: i32 = 0;
const GOAL_CODE: i32 = 1;

/// One CSV file per layer: `level_<n>/level_<n>_<layer>.csv`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    BgPalms,
    BgTerrain,
    Terrain,
    Crates,
    Grass,
    Coins,
    Collectibles,
    Spikes,
    EnemyConstraints,
    Enemies,
    FgPalms,
    Player,
}

impl LayerKind {
    /// Construction order. Constraints precede enemies so each enemy can
    /// bind to its neighbours.
    pub const ALL: [LayerKind; LAYER_COUNT] = [
        LayerKind::BgPalms,
        LayerKind::BgTerrain,
        LayerKind::Terrain,
        LayerKind::Crates,
        LayerKind::Grass,
        LayerKind::Coins,
        LayerKind::Collectibles,
        LayerKind::Spikes,
        LayerKind::EnemyConstraints,
        LayerKind::Enemies,
        LayerKind::FgPalms,
        LayerKind::Player,
    ];

    const fn index(self) -> usize {
        match self {
            LayerKind::BgPalms => 0,
            LayerKind::BgTerrain => 1,
            LayerKind::Terrain => 2,
            LayerKind::Crates => 3,
            LayerKind::Grass => 4,
            LayerKind::Coins => 5,
            LayerKind::Collectibles => 6,
            LayerKind::Spikes => 7,
            LayerKind::EnemyConstraints => 8,
            LayerKind::Enemies => 9,
            LayerKind::FgPalms => 10,
            LayerKind::Player => 11,
        }
    }

    pub const fn file_stem(self) -> &'static str {
        match self {
            LayerKind::BgPalms => "bg_palms",
            LayerKind::BgTerrain => "bg_terrain",
            LayerKind::Terrain => "terrain",
            LayerKind::Crates => "crates",
            LayerKind::Grass => "grass",
            LayerKind::Coins => "coins",
            LayerKind::Collectibles => "collectibles",
            LayerKind::Spikes => "spikes",
            LayerKind::EnemyConstraints => "enemies_constraints",
            LayerKind::Enemies => "enemies",
            LayerKind::FgPalms => "fg_palms",
            LayerKind::Player => "player",
        }
    }

    pub const fn is_required(self) -> bool {
        matches!(
            self,
            LayerKind::Terrain
                | LayerKind::Player
                | LayerKind::Enemies
                | LayerKind::EnemyConstraints
                | LayerKind::Coins
                | LayerKind::Spikes
                | LayerKind::FgPalms
        )
    }

    /// Valid codes are `0..variant_count`.
    pub const fn variant_count(self) -> i32 {
        match self {
            LayerKind::Terrain | LayerKind::BgTerrain => 24,
            LayerKind::BgPalms | LayerKind::FgPalms => 6,
            LayerKind::Grass => 8,
            LayerKind::Collectibles => 3,
            LayerKind::Coins | LayerKind::Player => 2,
            LayerKind::Crates
            | LayerKind::Spikes
            | LayerKind::EnemyConstraints
            | LayerKind::Enemies => 1,
        }
    }

    pub fn file_name(self, level_id: u32) -> String {
        format!("level_{level_id}_{}.csv", self.file_stem())
    }
}

#[derive(Debug, Error)]
pub enum LevelLoadError {
    #[error("required layer '{layer}' not found at {path}")]
    MissingLayerFile { layer: &'static str, path: PathBuf },
    #[error("required layer '{layer}' was not provided")]
    MissingLayer { layer: &'static str },
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error("player layer has no spawn cell (code {PLAYER_SPAWN_CODE})")]
    MissingSpawn,
    #[error("player layer has no goal cell (code {GOAL_CODE})")]
    MissingGoal,
    #[error("failed to spawn level loader thread")]
    SpawnWorker(#[source] std::io::Error),
    #[error("level loader thread panicked")]
    WorkerPanicked,
}

/// Raw grids for one level, before any tiles are built.
#[derive(Debug, Clone, Default)]
pub struct LevelLayers {
    grids: [Option<LayerGrid>; LAYER_COUNT],
}

impl LevelLayers {
    pub fn load_dir(dir: &Path, level_id: u32) -> Result<Self, LevelLoadError> {
        let mut layers = Self::default();
        for kind in LayerKind::ALL {
            let path = dir.join(kind.file_name(level_id));
            if !path.is_file() {
                if kind.is_required() {
                    return Err(LevelLoadError::MissingLayerFile {
                        layer: kind.file_stem(),
                        path,
                    });
                }
                debug!(layer = kind.file_stem(), path = %path.display(), "optional_layer_missing");
                continue;
            }
            layers.insert(kind, LayerGrid::load_csv(&path)?);
        }
        Ok(layers)
    }

    pub fn insert(&mut self, kind: LayerKind, grid: LayerGrid) {
        self.grids[kind.index()] = Some(grid);
    }

    pub fn grid(&self, kind: LayerKind) -> Option<&LayerGrid> {
        self.grids[kind.index()].as_ref()
    }

    /// Cells the assembler will visit, for the loading indicator.
    pub fn cell_count(&self) -> usize {
        self.grids.iter().flatten().map(LayerGrid::cell_count).sum()
    }

    fn required(&self, kind: LayerKind) -> Result<&LayerGrid, LevelLoadError> {
        self.grid(kind).ok_or(LevelLoadError::MissingLayer {
            layer: kind.file_stem(),
        })
    }
}

/// Shared counter read by the loading indicator while a worker assembles.
#[derive(Debug, Clone, Default)]
pub struct LoadProgress {
    processed: Arc<AtomicUsize>,
    total: Arc<AtomicUsize>,
}

impl LoadProgress {
    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }

    pub fn fraction(&self) -> f32 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (self.processed() as f32 / total as f32).min(1.0)
    }

    fn set_total(&self, total: usize) {
        self.total.store(total, Ordering::Relaxed);
    }

    fn advance(&self, cells: usize) {
        self.processed.fetch_add(cells, Ordering::Relaxed);
    }
}

/// Everything a session needs, built once and then handed over.
#[derive(Debug, Clone)]
pub struct AssembledLevel {
    pub world: TileWorld,
    pub enemies: Vec<Enemy>,
    pub player_spawn: Vec2,
    pub goal: StaticTile,
    pub bounds: Rect,
    pub initial: InitialState,
}

pub fn assemble_level(
    layers: &LevelLayers,
    tuning: &GameTuning,
    progress: &LoadProgress,
) -> Result<AssembledLevel, LevelLoadError> {
    for kind in LayerKind::ALL {
        if kind.is_required() {
            layers.required(kind)?;
        }
    }
    let player_grid = layers.required(LayerKind::Player)?;
    let bounds = Rect::new(
        0.0,
        0.0,
        player_grid.width() as f32 * TILE_SIZE,
        player_grid.height() as f32 * TILE_SIZE,
    );
    progress.set_total(layers.cell_count());

    let mut world = TileWorld::default();
    let mut enemies = Vec::new();
    let mut spawn = None;
    let mut goal = None;

    for kind in LayerKind::ALL {
        let Some(grid) = layers.grid(kind) else {
            continue;
        };
        for (column, row, code) in grid.cells() {
            if code == EMPTY_CELL {
                continue;
            }
            if !(0..kind.variant_count()).contains(&code) {
                debug!(
                    layer = kind.file_stem(),
                    column,
                    row,
                    code,
                    "tile_code_out_of_range"
                );
                continue;
            }
            let cell = cell_rect(column, row);
            match kind {
                LayerKind::Enemies => {
                    let constraints = nearest_constraints(&world, cell);
                    let rect = Rect::from_midbottom(
                        cell.midbottom(),
                        tuning.enemy.width,
                        tuning.enemy.height,
                    );
                    enemies.push(Enemy::new(rect, &tuning.enemy, constraints));
                }
                LayerKind::Player if code == PLAYER_SPAWN_CODE => {
                    spawn = Some(Vec2::new(cell.x, cell.y));
                }
                LayerKind::Player => {
                    goal = Some(goal_tile(cell));
                }
                _ => {
                    if let Some((partition, tile)) = build_tile(kind, code, cell, tuning) {
                        world.push(partition, tile);
                    }
                }
            }
        }
        progress.advance(grid.cell_count());
    }

    let player_spawn = spawn.ok_or(LevelLoadError::MissingSpawn)?;
    let goal = goal.ok_or(LevelLoadError::MissingGoal)?;
    let initial = count_initial_state(&world, enemies.len());

    Ok(AssembledLevel {
        world,
        enemies,
        player_spawn,
        goal,
        bounds,
        initial,
    })
}

fn cell_rect(column: usize, row: usize) -> Rect {
    Rect::new(
        column as f32 * TILE_SIZE,
        row as f32 * TILE_SIZE,
        TILE_SIZE,
        TILE_SIZE,
    )
}

fn looping() -> VisualBehavior {
    VisualBehavior::Looping(LoopingAnimation::new(
        TILE_ANIMATION_FRAMES,
        TILE_FRAMES_PER_TICK,
    ))
}

fn build_tile(
    kind: LayerKind,
    code: i32,
    cell: Rect,
    tuning: &GameTuning,
) -> Option<(Partition, StaticTile)> {
    let mut tile = StaticTile {
        rect: cell,
        collide_rect: None,
        role: TileRole::Decoration,
        variant: code,
        sprite_key: String::new(),
        behavior: VisualBehavior::Static,
    };

    let partition = match kind {
        LayerKind::Terrain if BACKGROUND_TERRAIN_CODES.contains(&code) => Partition::BgTerrain,
        LayerKind::Terrain => {
            tile.role = TileRole::Solid;
            Partition::Terrain
        }
        LayerKind::BgTerrain => Partition::BgTerrain,
        LayerKind::BgPalms => {
            tile.behavior = looping();
            Partition::BgPalms
        }
        LayerKind::FgPalms => {
            tile.role = TileRole::Solid;
            tile.behavior = looping();
            Partition::FgPalms
        }
        LayerKind::Crates => Partition::Crates,
        LayerKind::Grass => Partition::Grass,
        LayerKind::Coins => {
            let pickup = if code == 0 {
                Pickup::GoldCoin
            } else {
                Pickup::SilverCoin
            };
            tile.rect = Rect::from_center(cell.center(), COIN_SIZE, COIN_SIZE);
            tile.role = TileRole::Pickup(pickup);
            tile.behavior = looping();
            Partition::Coins
        }
        LayerKind::Collectibles => {
            let pickup = match code {
                0 => Pickup::GoldenSkull,
                1 => Pickup::RedDiamond,
                _ => Pickup::GreenBottle,
            };
            let rect = Rect::from_center(cell.center(), COLLECTIBLE_SIZE, COLLECTIBLE_SIZE);
            tile.rect = rect;
            tile.collide_rect = Some(Rect::new(
                rect.left(),
                rect.bottom() - COLLECTIBLE_COLLIDE_HEIGHT,
                rect.width,
                COLLECTIBLE_COLLIDE_HEIGHT,
            ));
            tile.role = TileRole::Pickup(pickup);
            tile.behavior = looping();
            Partition::Collectibles
        }
        LayerKind::Spikes => {
            let inset = tuning.hazard.spike_inset_top;
            tile.collide_rect = Some(Rect::new(
                cell.left(),
                cell.top() + inset,
                cell.width,
                cell.height - inset,
            ));
            tile.role = TileRole::Hazard {
                damage: tuning.hazard.spike_damage,
            };
            Partition::Spikes
        }
        LayerKind::EnemyConstraints => {
            tile.role = TileRole::Constraint;
            Partition::EnemyConstraints
        }
        LayerKind::Enemies | LayerKind::Player => return None,
    };

    tile.sprite_key = match tile.role {
        TileRole::Pickup(pickup) => pickup_sprite_key(pickup).to_string(),
        _ => tile_sprite_key(partition, code),
    };
    Some((partition, tile))
}

fn goal_tile(cell: Rect) -> StaticTile {
    StaticTile {
        rect: cell,
        collide_rect: None,
        role: TileRole::Goal,
        variant: GOAL_CODE,
        sprite_key: FLAG_SPRITE_ROOT.to_string(),
        behavior: VisualBehavior::Flag(FlagAnimation::new(FLAG_FRAMES, TILE_FRAMES_PER_TICK)),
    }
}

/// Closest constraint on the enemy's row to the left and to the right.
fn nearest_constraints(world: &TileWorld, cell: Rect) -> Vec<Rect> {
    let on_row = world
        .tiles(Partition::EnemyConstraints)
        .iter()
        .map(|tile| tile.rect)
        .filter(|rect| rect.top() == cell.top());

    let mut left: Option<Rect> = None;
    let mut right: Option<Rect> = None;
    for rect in on_row {
        if rect.left() < cell.left() {
            if left.map_or(true, |best| rect.left() > best.left()) {
                left = Some(rect);
            }
        } else if rect.left() > cell.left()
            && right.map_or(true, |best| rect.left() < best.left())
        {
            right = Some(rect);
        }
    }
    left.into_iter().chain(right).collect()
}

fn count_initial_state(world: &TileWorld, enemies: usize) -> InitialState {
    let mut initial = InitialState {
        enemies: enemies as u32,
        ..InitialState::default()
    };
    for tile in world.tiles(Partition::Coins) {
        match tile.role {
            TileRole::Pickup(Pickup::GoldCoin) => initial.gold_coins += 1,
            TileRole::Pickup(Pickup::SilverCoin) => initial.silver_coins += 1,
            _ => {}
        }
    }
    initial
}
