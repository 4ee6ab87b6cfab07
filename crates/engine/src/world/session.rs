//! One level attempt: loading handoff, the fixed per-tick order, the
//! pause-then-hand-off sequence, and the declared draw order.

use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::app::{DrawCommand, DrawList, DrawSpace, DrawVisual, Rgba, TickDiagnostics};
use crate::sprite_keys::{player_sprite_key, ENEMY_SPRITE_KEY};

use super::assembly::{assemble_level, AssembledLevel, LevelLayers, LevelLoadError, LoadProgress};
use super::camera::Camera;
use super::enemy::Enemy;
use super::geometry::{Rect, Vec2};
use super::interactions::{
    check_enemies, check_fall_out, check_pickups, check_spikes, reached_goal,
};
use super::player::{Player, PlayerInput};
use super::progress::{Abilities, InitialState, LevelStats, PlayerProgress};
use super::tiles::{LoopingAnimation, Partition, Pickup, SpriteFrame, StaticTile, TileWorld};
use super::tuning::GameTuning;

const LOADER_THREAD_NAME: &str = "level-loader";
const SKY_COLOR: Rgba = [0xdd, 0xc6, 0xa1, 0xff];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Loading,
    Playing,
    /// Input is off; physics and animation keep running until the delay ends.
    Pausing,
    /// The outcome has been handed to the menu. Ticks are no-ops.
    Paused,
}

/// Notifications for the audio and effects collaborators, cleared at the
/// start of every tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LevelEvent {
    Jumped { at: Vec2 },
    Landed { at: Vec2 },
    PlayerHit { health: f32 },
    PlayerDied,
    EnemyStomped { at: Vec2 },
    Collected { pickup: Pickup, at: Vec2 },
    GoalReached,
    FellOut,
}

/// Result of an attempt, handed to the menu once the pause delay ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelOutcome {
    pub level_id: u32,
    pub completed: bool,
    /// Level to unlock and select next: the following one on completion,
    /// the same one otherwise.
    pub next_level: u32,
    pub stats: LevelStats,
    pub initial: InitialState,
}

impl LevelOutcome {
    pub fn apply_to(&self, progress: &mut PlayerProgress) {
        progress.update_level_data(self.level_id, &self.stats, &self.initial);
        progress.unlock_up_to(self.next_level);
        progress.current_level = self.next_level.min(progress.max_level);
    }
}

/// Drawing slots, painted back to front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawLayer {
    Tiles(Partition),
    Enemies,
    Goal,
    Player,
    Effects,
}

pub const DRAW_ORDER: [DrawLayer; 13] = [
    DrawLayer::Tiles(Partition::BgTerrain),
    DrawLayer::Tiles(Partition::BgPalms),
    DrawLayer::Tiles(Partition::Terrain),
    DrawLayer::Tiles(Partition::Crates),
    DrawLayer::Tiles(Partition::Grass),
    DrawLayer::Tiles(Partition::Coins),
    DrawLayer::Tiles(Partition::Collectibles),
    DrawLayer::Tiles(Partition::Spikes),
    DrawLayer::Enemies,
    DrawLayer::Goal,
    DrawLayer::Tiles(Partition::FgPalms),
    DrawLayer::Player,
    DrawLayer::Effects,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    JumpDust,
    LandDust,
    Explosion,
    CoinPickup,
    SkullPickup,
}

impl EffectKind {
    const fn sprite_key(self) -> &'static str {
        match self {
            EffectKind::JumpDust => "effects/jump",
            EffectKind::LandDust => "effects/land",
            EffectKind::Explosion => "effects/explosion",
            EffectKind::CoinPickup => "effects/coin",
            EffectKind::SkullPickup => "effects/skull",
        }
    }

    const fn frame_count(self) -> u32 {
        match self {
            EffectKind::JumpDust | EffectKind::LandDust => 6,
            EffectKind::Explosion => 7,
            EffectKind::CoinPickup | EffectKind::SkullPickup => 4,
        }
    }

    fn placed_at(self, anchor: Vec2) -> Rect {
        match self {
            EffectKind::JumpDust | EffectKind::LandDust => {
                Rect::from_midbottom(anchor, 64.0, 32.0)
            }
            EffectKind::Explosion => Rect::from_center(anchor, 96.0, 96.0),
            EffectKind::CoinPickup | EffectKind::SkullPickup => {
                Rect::from_center(anchor, 48.0, 48.0)
            }
        }
    }
}

/// Plays its frames once, then expires.
#[derive(Debug, Clone, PartialEq)]
pub struct Effect {
    kind: EffectKind,
    rect: Rect,
    animation: LoopingAnimation,
}

impl Effect {
    fn new(kind: EffectKind, anchor: Vec2, frames_per_tick: f32) -> Self {
        Self {
            kind,
            rect: kind.placed_at(anchor),
            animation: LoopingAnimation::new(kind.frame_count(), frames_per_tick),
        }
    }

    pub fn kind(&self) -> EffectKind {
        self.kind
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// Returns false once the last frame has played.
    fn advance(&mut self) -> bool {
        !self.animation.advance()
    }
}

type LoadResult = Result<AssembledLevel, LevelLoadError>;

/// Builds a level on a worker thread. The main loop polls it once per tick;
/// the worker's result is the only thing that crosses the thread boundary.
#[derive(Debug)]
pub struct LevelLoader {
    progress: LoadProgress,
    handle: Option<JoinHandle<LoadResult>>,
}

impl LevelLoader {
    /// Reads `level_<id>_<layer>.csv` files from `dir` and assembles them.
    pub fn spawn(dir: PathBuf, level_id: u32, tuning: GameTuning) -> Result<Self, LevelLoadError> {
        Self::spawn_with(move |progress| {
            let layers = LevelLayers::load_dir(&dir, level_id)?;
            assemble_level(&layers, &tuning, &progress)
        })
    }

    /// Assembles grids that are already in memory.
    pub fn from_layers(layers: LevelLayers, tuning: GameTuning) -> Result<Self, LevelLoadError> {
        Self::spawn_with(move |progress| assemble_level(&layers, &tuning, &progress))
    }

    fn spawn_with<F>(job: F) -> Result<Self, LevelLoadError>
    where
        F: FnOnce(LoadProgress) -> LoadResult + Send + 'static,
    {
        let progress = LoadProgress::default();
        let worker_progress = progress.clone();
        let handle = thread::Builder::new()
            .name(LOADER_THREAD_NAME.to_string())
            .spawn(move || job(worker_progress))
            .map_err(LevelLoadError::SpawnWorker)?;
        Ok(Self {
            progress,
            handle: Some(handle),
        })
    }

    pub fn progress(&self) -> &LoadProgress {
        &self.progress
    }

    /// `None` while the worker runs, and again after the result was taken.
    pub fn poll(&mut self) -> Option<LoadResult> {
        if !self.handle.as_ref()?.is_finished() {
            return None;
        }
        let handle = self.handle.take()?;
        Some(
            handle
                .join()
                .unwrap_or(Err(LevelLoadError::WorkerPanicked)),
        )
    }

    /// Blocks until the worker finishes.
    pub fn wait(mut self) -> LoadResult {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .unwrap_or(Err(LevelLoadError::WorkerPanicked)),
            None => Err(LevelLoadError::WorkerPanicked),
        }
    }
}

/// Everything that exists only once loading finished.
#[derive(Debug)]
struct ActiveLevel {
    world: TileWorld,
    solids: Vec<Rect>,
    enemies: Vec<Enemy>,
    player: Player,
    goal: StaticTile,
    bounds: Rect,
    camera: Camera,
    stats: LevelStats,
    initial: InitialState,
    effects: Vec<Effect>,
}

impl ActiveLevel {
    fn new(
        assembled: AssembledLevel,
        tuning: &GameTuning,
        abilities: Abilities,
        max_health: f32,
    ) -> Self {
        let AssembledLevel {
            world,
            enemies,
            player_spawn,
            goal,
            bounds,
            initial,
        } = assembled;
        let solids = world.solids().copied().collect();
        let player = Player::new(player_spawn, tuning.player, abilities, max_health);
        let mut camera = Camera::new(bounds, tuning.camera);
        camera.follow(&player.rect());
        Self {
            world,
            solids,
            enemies,
            player,
            goal,
            bounds,
            camera,
            stats: LevelStats::default(),
            initial,
            effects: Vec::new(),
        }
    }

    fn spawn_effect(&mut self, kind: EffectKind, anchor: Vec2, frames_per_tick: f32) {
        self.effects.push(Effect::new(kind, anchor, frames_per_tick));
    }
}

pub type OutcomeCallback = Box<dyn FnMut(LevelOutcome)>;

/// Composition root of one level attempt. Owns the world, the entities, the
/// camera and the counters; nothing here outlives the session.
pub struct LevelSession {
    level_id: u32,
    tuning: GameTuning,
    abilities: Abilities,
    max_health: f32,
    state: SessionState,
    loader: Option<LevelLoader>,
    load_error: Option<LevelLoadError>,
    level: Option<ActiveLevel>,
    events: Vec<LevelEvent>,
    completed: bool,
    pause_elapsed: Duration,
    outcome: Option<LevelOutcome>,
    on_finished: Option<OutcomeCallback>,
}

impl LevelSession {
    pub fn new(
        level_id: u32,
        loader: LevelLoader,
        tuning: GameTuning,
        abilities: Abilities,
        max_health: f32,
    ) -> Self {
        Self {
            level_id,
            tuning,
            abilities,
            max_health,
            state: SessionState::Loading,
            loader: Some(loader),
            load_error: None,
            level: None,
            events: Vec::new(),
            completed: false,
            pause_elapsed: Duration::ZERO,
            outcome: None,
            on_finished: None,
        }
    }

    /// Called once, when the pause delay after completion or death ends.
    pub fn set_on_finished(&mut self, callback: impl FnMut(LevelOutcome) + 'static) {
        self.on_finished = Some(Box::new(callback));
    }

    pub fn level_id(&self) -> u32 {
        self.level_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Set when the level could not be built; the session then never leaves
    /// `Loading`.
    pub fn load_error(&self) -> Option<&LevelLoadError> {
        self.load_error.as_ref()
    }

    /// Fraction of grid cells assembled so far; 1.0 once loaded.
    pub fn load_fraction(&self) -> f32 {
        match (&self.loader, &self.level) {
            (_, Some(_)) => 1.0,
            (Some(loader), None) => loader.progress().fraction(),
            (None, None) => 0.0,
        }
    }

    pub fn events(&self) -> &[LevelEvent] {
        &self.events
    }

    pub fn outcome(&self) -> Option<&LevelOutcome> {
        self.outcome.as_ref()
    }

    pub fn input_enabled(&self) -> bool {
        self.state == SessionState::Playing
    }

    pub fn player(&self) -> Option<&Player> {
        self.level.as_ref().map(|level| &level.player)
    }

    pub fn stats(&self) -> Option<&LevelStats> {
        self.level.as_ref().map(|level| &level.stats)
    }

    pub fn initial_state(&self) -> Option<&InitialState> {
        self.level.as_ref().map(|level| &level.initial)
    }

    pub fn world(&self) -> Option<&TileWorld> {
        self.level.as_ref().map(|level| &level.world)
    }

    pub fn enemies(&self) -> &[Enemy] {
        self.level
            .as_ref()
            .map(|level| level.enemies.as_slice())
            .unwrap_or_default()
    }

    pub fn effects(&self) -> &[Effect] {
        self.level
            .as_ref()
            .map(|level| level.effects.as_slice())
            .unwrap_or_default()
    }

    pub fn camera(&self) -> Option<&Camera> {
        self.level.as_ref().map(|level| &level.camera)
    }

    /// One fixed tick: player, enemies, cross-entity checks (input enabled
    /// only), animation, camera, then the pause timer.
    pub fn tick(
        &mut self,
        input: PlayerInput,
        fixed_dt: Duration,
        diagnostics: &mut TickDiagnostics,
    ) {
        self.events.clear();
        match self.state {
            SessionState::Loading => {
                self.poll_loader();
                return;
            }
            SessionState::Paused => return,
            SessionState::Playing | SessionState::Pausing => {}
        }

        let input_enabled = self.input_enabled();
        let Some(level) = self.level.as_mut() else {
            return;
        };
        let tuning = &self.tuning;
        let effect_rate = tuning.session.effect_frames_per_tick;
        let input = if input_enabled {
            input
        } else {
            PlayerInput::default()
        };

        let report = level
            .player
            .update(input, &level.solids, fixed_dt, diagnostics);
        if let Some(at) = report.jumped_at {
            self.events.push(LevelEvent::Jumped { at });
            level.spawn_effect(EffectKind::JumpDust, at, effect_rate);
        }
        if let Some(at) = report.landed_at {
            self.events.push(LevelEvent::Landed { at });
            level.spawn_effect(EffectKind::LandDust, at, effect_rate);
        }

        for enemy in &mut level.enemies {
            enemy.update();
            diagnostics.enemies_updated += 1;
        }

        let mut reached = false;
        if input_enabled && !level.player.is_dead() {
            let events_before = self.events.len();
            check_spikes(
                &mut level.player,
                &level.world,
                &tuning.hazard,
                &mut self.events,
                diagnostics,
            );
            check_enemies(
                &mut level.player,
                &mut level.enemies,
                &tuning.enemy,
                &mut level.stats,
                &mut self.events,
                diagnostics,
            );
            check_pickups(
                &mut level.player,
                &mut level.world,
                &tuning.hazard,
                &mut level.stats,
                &mut self.events,
                diagnostics,
            );
            for event in &self.events[events_before..] {
                match *event {
                    LevelEvent::EnemyStomped { at } => {
                        debug!(level_id = self.level_id, x = at.x, y = at.y, "enemy_stomped");
                        level.spawn_effect(EffectKind::Explosion, at, effect_rate);
                    }
                    LevelEvent::Collected { pickup, at } => {
                        let kind = match pickup {
                            Pickup::GoldCoin | Pickup::SilverCoin => EffectKind::CoinPickup,
                            _ => EffectKind::SkullPickup,
                        };
                        level.spawn_effect(kind, at, effect_rate);
                    }
                    _ => {}
                }
            }

            if !level.player.is_dead() && reached_goal(&level.player, &level.goal.rect) {
                level.goal.start_flag_transition();
                self.events.push(LevelEvent::GoalReached);
                reached = true;
            }
            if check_fall_out(&mut level.player, &level.bounds, tuning.hazard.fall_death_margin) {
                self.events.push(LevelEvent::FellOut);
                self.events.push(LevelEvent::PlayerDied);
            }
        }
        let player_dead = level.player.is_dead();

        level.world.animate();
        level.goal.animate();
        level.effects.retain_mut(Effect::advance);
        level.camera.follow(&level.player.rect());

        if self.state == SessionState::Playing {
            if reached {
                self.completed = true;
                self.begin_pause("goal_reached");
            } else if player_dead {
                self.begin_pause("player_died");
            }
        } else if self.state == SessionState::Pausing {
            self.pause_elapsed += fixed_dt;
            if self.pause_elapsed >= self.tuning.session.pause_delay {
                self.finish();
            }
        }
    }

    /// Paints every slot of `DRAW_ORDER`, offset by the camera. Nothing is
    /// drawn while loading.
    pub fn render(&self, list: &mut DrawList, diagnostics: &mut TickDiagnostics) {
        let Some(level) = self.level.as_ref() else {
            return;
        };
        let before = list.len();
        list.set_clear_color(SKY_COLOR);
        list.set_camera_offset(level.camera.offset());

        for layer in DRAW_ORDER {
            match layer {
                DrawLayer::Tiles(partition) => {
                    for tile in level.world.tiles(partition) {
                        list.sprite(tile.rect, tile.sprite_frame(), fallback_color(partition));
                    }
                }
                DrawLayer::Enemies => {
                    for enemy in &level.enemies {
                        list.push(DrawCommand {
                            rect: enemy.rect(),
                            space: DrawSpace::World,
                            visual: DrawVisual::Sprite {
                                frame: SpriteFrame {
                                    key: ENEMY_SPRITE_KEY.to_string(),
                                    frame: enemy.frame(),
                                },
                                fallback: [0x9c, 0x27, 0x27, 0xff],
                            },
                            opacity: u8::MAX,
                            flip_x: enemy.direction() > 0.0,
                        });
                    }
                }
                DrawLayer::Goal => {
                    list.sprite(
                        level.goal.rect,
                        level.goal.sprite_frame(),
                        [0xe0, 0xe0, 0xe0, 0xff],
                    );
                }
                DrawLayer::Player => {
                    let player = &level.player;
                    list.push(DrawCommand {
                        rect: player.rect(),
                        space: DrawSpace::World,
                        visual: DrawVisual::Sprite {
                            frame: SpriteFrame {
                                key: player_sprite_key(player.state().name()),
                                frame: player.frame(),
                            },
                            fallback: [0x2a, 0x5d, 0xb0, 0xff],
                        },
                        opacity: player.opacity(),
                        flip_x: !player.facing_right(),
                    });
                }
                DrawLayer::Effects => {
                    for effect in &level.effects {
                        list.sprite(
                            effect.rect,
                            SpriteFrame {
                                key: effect.kind.sprite_key().to_string(),
                                frame: effect.animation.frame(),
                            },
                            [0xff, 0xff, 0xff, 0x80],
                        );
                    }
                }
            }
        }

        if list.outlines_enabled() {
            for solid in &level.solids {
                list.outline(*solid, [0x00, 0xff, 0x00, 0xff]);
            }
            for spike in level.world.tiles(Partition::Spikes) {
                list.outline(spike.collision_rect(), [0xff, 0x00, 0x00, 0xff]);
            }
            for constraint in level.world.tiles(Partition::EnemyConstraints) {
                list.outline(constraint.rect, [0xff, 0x00, 0xff, 0xff]);
            }
            for enemy in &level.enemies {
                list.outline(enemy.rect(), [0xff, 0x80, 0x00, 0xff]);
            }
            list.outline(level.player.rect(), [0x00, 0xff, 0xff, 0xff]);
            list.outline(level.camera.dead_zone(), [0xff, 0xff, 0x00, 0xff]);
        }

        diagnostics.draw_commands += (list.len() - before) as u32;
    }

    fn poll_loader(&mut self) {
        let Some(loader) = self.loader.as_mut() else {
            return;
        };
        let Some(result) = loader.poll() else {
            return;
        };
        self.loader = None;
        match result {
            Ok(assembled) => {
                let level =
                    ActiveLevel::new(assembled, &self.tuning, self.abilities, self.max_health);
                info!(
                    level_id = self.level_id,
                    tiles = level.world.total_tile_count(),
                    solids = level.solids.len(),
                    enemies = level.enemies.len(),
                    gold_coins = level.initial.gold_coins,
                    silver_coins = level.initial.silver_coins,
                    "level_loaded"
                );
                self.level = Some(level);
                self.state = SessionState::Playing;
            }
            Err(error) => {
                warn!(level_id = self.level_id, error = %error, "level_load_failed");
                self.load_error = Some(error);
            }
        }
    }

    fn begin_pause(&mut self, reason: &'static str) {
        info!(
            level_id = self.level_id,
            reason,
            pause_delay_ms = self.tuning.session.pause_delay.as_millis() as u64,
            "session_pausing"
        );
        self.state = SessionState::Pausing;
        self.pause_elapsed = Duration::ZERO;
    }

    fn finish(&mut self) {
        let Some(level) = self.level.as_ref() else {
            return;
        };
        let outcome = LevelOutcome {
            level_id: self.level_id,
            completed: self.completed,
            next_level: if self.completed {
                self.level_id + 1
            } else {
                self.level_id
            },
            stats: level.stats,
            initial: level.initial,
        };
        self.state = SessionState::Paused;
        self.outcome = Some(outcome);
        info!(
            level_id = self.level_id,
            completed = outcome.completed,
            next_level = outcome.next_level,
            enemies_killed = outcome.stats.enemies_killed,
            gold_coins = outcome.stats.gold_coins,
            silver_coins = outcome.stats.silver_coins,
            "session_paused"
        );
        if let Some(callback) = self.on_finished.as_mut() {
            callback(outcome);
        }
    }
}

fn fallback_color(partition: Partition) -> Rgba {
    match partition {
        Partition::Terrain => [0x6b, 0x4f, 0x2f, 0xff],
        Partition::BgTerrain => [0x8a, 0x70, 0x4f, 0xff],
        Partition::BgPalms | Partition::FgPalms => [0x3f, 0x7d, 0x3a, 0xff],
        Partition::Crates => [0x9b, 0x6a, 0x3c, 0xff],
        Partition::Grass => [0x5c, 0xa0, 0x48, 0xff],
        Partition::Coins => [0xf2, 0xc1, 0x2e, 0xff],
        Partition::Collectibles => [0xd9, 0x3b, 0x6c, 0xff],
        Partition::Spikes => [0xb0, 0xb0, 0xb8, 0xff],
        Partition::EnemyConstraints => [0x00, 0x00, 0x00, 0x00],
    }
}
