use std::rc::Rc;
use std::time::Duration;

use cove_engine::world::{
    LevelEvent, LevelLoader, LevelSession, MoveIntent, PlayerInput, Rect, SessionState,
};
use cove_engine::{
    DrawList, InputAction, InputSnapshot, Rgba, Scene, SceneCommand, SceneKey, TickDiagnostics,
    LOGICAL_HEIGHT, LOGICAL_WIDTH,
};
use tracing::{debug, info, warn};

use super::SharedState;

const HUD_MARGIN: f32 = 20.0;
const HEALTH_BAR_WIDTH: f32 = 192.0;
const HEALTH_BAR_HEIGHT: f32 = 14.0;
const COUNTER_PIP_SIZE: f32 = 10.0;
const COUNTER_PIP_GAP: f32 = 4.0;
const LOADING_BAR_WIDTH: f32 = 480.0;
const LOADING_BAR_HEIGHT: f32 = 18.0;

const LOADING_BACKGROUND: Rgba = [24, 20, 28, 255];
const BAR_TRACK: Rgba = [40, 36, 44, 255];
const LOADING_FILL: Rgba = [214, 168, 58, 255];
const LOAD_FAILED_FILL: Rgba = [170, 40, 40, 255];
const HEALTH_FILL: Rgba = [200, 52, 52, 255];
const GOLD_PIP: Rgba = [240, 196, 48, 255];
const SILVER_PIP: Rgba = [196, 200, 210, 255];
const ENEMY_PIP: Rgba = [120, 40, 40, 255];
const EMPTY_PIP: Rgba = [60, 56, 64, 180];

/// Adapts one `LevelSession` to the scene loop. Each hard reset builds a
/// fresh session for the level selected in the shared state.
pub(crate) struct LevelScene {
    state: SharedState,
    session: Option<LevelSession>,
    /// Shown in the title when the level could not even start loading.
    start_error: Option<String>,
}

impl LevelScene {
    pub(crate) fn new(state: SharedState) -> Self {
        Self {
            state,
            session: None,
            start_error: None,
        }
    }

    pub(super) fn session(&self) -> Option<&LevelSession> {
        self.session.as_ref()
    }

    fn start_session(&mut self) -> Result<LevelSession, String> {
        let (level_id, dir, tuning, abilities, max_health) = {
            let state = self.state.borrow();
            let Some(def) = state.current_level_def() else {
                return Err(format!("level {} is not in the catalog", state.current_level()));
            };
            (
                def.id,
                state.level_dir(def),
                state.defs().tuning(),
                state.progress().abilities,
                state.progress().max_health as f32,
            )
        };

        info!(level_id, dir = %dir.display(), "level_starting");
        let loader = LevelLoader::spawn(dir, level_id, tuning).map_err(|error| error.to_string())?;
        let mut session = LevelSession::new(level_id, loader, tuning, abilities, max_health);

        let state = Rc::clone(&self.state);
        session.set_on_finished(move |outcome| state.borrow_mut().record_outcome(&outcome));
        Ok(session)
    }
}

impl Scene for LevelScene {
    fn load(&mut self) {
        self.start_error = None;
        match self.start_session() {
            Ok(session) => self.session = Some(session),
            Err(error) => {
                warn!(error = %error, "level_start_failed");
                self.session = None;
                self.start_error = Some(error);
            }
        }
    }

    fn update(
        &mut self,
        fixed_dt: Duration,
        input: &InputSnapshot,
        diagnostics: &mut TickDiagnostics,
    ) -> SceneCommand {
        let Some(session) = self.session.as_mut() else {
            return back_to_overworld_on_request(input);
        };

        session.tick(player_input(input), fixed_dt, diagnostics);
        log_events(session.level_id(), session.events());

        match session.state() {
            SessionState::Loading if session.load_error().is_some() => {
                back_to_overworld_on_request(input)
            }
            SessionState::Paused => SceneCommand::HardResetTo(SceneKey::Overworld),
            _ => SceneCommand::None,
        }
    }

    fn render(&mut self, list: &mut DrawList, diagnostics: &mut TickDiagnostics) {
        let Some(session) = self.session.as_ref() else {
            list.set_clear_color(LOADING_BACKGROUND);
            draw_loading_bar(list, 1.0, true);
            return;
        };

        if session.state() == SessionState::Loading {
            let before = list.len();
            list.set_clear_color(LOADING_BACKGROUND);
            draw_loading_bar(list, session.load_fraction(), session.load_error().is_some());
            diagnostics.draw_commands += (list.len() - before) as u32;
            return;
        }

        session.render(list, diagnostics);
        let before = list.len();
        draw_hud(list, session);
        diagnostics.draw_commands += (list.len() - before) as u32;
    }

    fn unload(&mut self) {
        if let Some(session) = self.session.take() {
            debug!(
                level_id = session.level_id(),
                state = ?session.state(),
                "level_unloaded"
            );
        }
        self.start_error = None;
    }

    fn debug_title(&self) -> Option<String> {
        if let Some(error) = &self.start_error {
            return Some(format!("Skull Cove | {error} | Backspace to return"));
        }
        let session = self.session.as_ref()?;
        if let Some(error) = session.load_error() {
            return Some(format!(
                "Skull Cove | Level {} failed to load: {error} | Backspace to return",
                session.level_id()
            ));
        }
        let (stats, initial) = (session.stats()?, session.initial_state()?);
        Some(format!(
            "Skull Cove | Level {} | gold {}/{} | silver {}/{} | enemies {}/{} | skulls {}",
            session.level_id(),
            stats.gold_coins,
            initial.gold_coins,
            stats.silver_coins,
            initial.silver_coins,
            stats.enemies_killed,
            initial.enemies,
            stats.golden_skulls,
        ))
    }
}

/// Right wins when both directions are held.
pub(super) fn player_input(input: &InputSnapshot) -> PlayerInput {
    let movement = if input.is_down(InputAction::MoveRight) {
        MoveIntent::Right
    } else if input.is_down(InputAction::MoveLeft) {
        MoveIntent::Left
    } else {
        MoveIntent::None
    };
    PlayerInput {
        movement,
        jump_held: input.is_down(InputAction::Jump),
        jump_pressed: input.just_pressed(InputAction::Jump),
    }
}

fn back_to_overworld_on_request(input: &InputSnapshot) -> SceneCommand {
    if input.just_pressed(InputAction::Cancel) || input.just_pressed(InputAction::Confirm) {
        SceneCommand::HardResetTo(SceneKey::Overworld)
    } else {
        SceneCommand::None
    }
}

fn log_events(level_id: u32, events: &[LevelEvent]) {
    for event in events {
        match *event {
            LevelEvent::Jumped { at } => debug!(level_id, x = at.x, y = at.y, "player_jumped"),
            LevelEvent::Landed { at } => debug!(level_id, x = at.x, y = at.y, "player_landed"),
            LevelEvent::PlayerHit { health } => info!(level_id, health, "player_hit"),
            LevelEvent::PlayerDied => info!(level_id, "player_died"),
            LevelEvent::EnemyStomped { at } => debug!(level_id, x = at.x, y = at.y, "stomp_sfx"),
            LevelEvent::Collected { pickup, at } => {
                debug!(level_id, pickup = ?pickup, x = at.x, y = at.y, "pickup_collected")
            }
            LevelEvent::GoalReached => info!(level_id, "goal_reached"),
            LevelEvent::FellOut => info!(level_id, "player_fell_out"),
        }
    }
}

fn draw_loading_bar(list: &mut DrawList, fraction: f32, failed: bool) {
    let track = Rect::new(
        (LOGICAL_WIDTH as f32 - LOADING_BAR_WIDTH) * 0.5,
        (LOGICAL_HEIGHT as f32 - LOADING_BAR_HEIGHT) * 0.5,
        LOADING_BAR_WIDTH,
        LOADING_BAR_HEIGHT,
    );
    list.fill_screen(track, BAR_TRACK);
    let fill = Rect::new(
        track.x,
        track.y,
        track.width * fraction.clamp(0.0, 1.0),
        track.height,
    );
    list.fill_screen(fill, if failed { LOAD_FAILED_FILL } else { LOADING_FILL });
}

fn draw_hud(list: &mut DrawList, session: &LevelSession) {
    let Some(player) = session.player() else {
        return;
    };
    let track = Rect::new(HUD_MARGIN, HUD_MARGIN, HEALTH_BAR_WIDTH, HEALTH_BAR_HEIGHT);
    list.fill_screen(track, BAR_TRACK);
    let ratio = if player.max_health() > 0.0 {
        (player.health() / player.max_health()).clamp(0.0, 1.0)
    } else {
        0.0
    };
    list.fill_screen(
        Rect::new(track.x, track.y, track.width * ratio, track.height),
        HEALTH_FILL,
    );

    let (Some(stats), Some(initial)) = (session.stats(), session.initial_state()) else {
        return;
    };
    let rows = [
        (stats.gold_coins, initial.gold_coins, GOLD_PIP),
        (stats.silver_coins, initial.silver_coins, SILVER_PIP),
        (stats.enemies_killed, initial.enemies, ENEMY_PIP),
    ];
    let mut y = track.y + track.height + COUNTER_PIP_GAP * 2.0;
    for (collected, total, color) in rows {
        draw_counter_row(list, y, collected, total, color);
        y += COUNTER_PIP_SIZE + COUNTER_PIP_GAP;
    }
}

/// One pip per item; pips past the bar width are not drawn.
fn draw_counter_row(list: &mut DrawList, y: f32, collected: u32, total: u32, color: Rgba) {
    let per_row = ((HEALTH_BAR_WIDTH + COUNTER_PIP_GAP) / (COUNTER_PIP_SIZE + COUNTER_PIP_GAP))
        .floor() as u32;
    for index in 0..total.min(per_row) {
        let x = HUD_MARGIN + index as f32 * (COUNTER_PIP_SIZE + COUNTER_PIP_GAP);
        let pip = Rect::new(x, y, COUNTER_PIP_SIZE, COUNTER_PIP_SIZE);
        list.fill_screen(pip, if index < collected { color } else { EMPTY_PIP });
    }
}
