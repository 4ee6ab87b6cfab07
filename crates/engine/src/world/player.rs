use std::time::Duration;

use crate::app::TickDiagnostics;

use super::collision::{resolve_horizontal, resolve_vertical, VerticalContact, WallSide};
use super::geometry::{Rect, Vec2};
use super::progress::Abilities;
use super::tiles::LoopingAnimation;
use super::tuning::PlayerTuning;

const PLAYER_ANIMATION_FRAMES: u32 = 6;
const JUMP_DUST_OFFSET: f32 = 9.0;
const LAND_DUST_OFFSET: f32 = -18.0;
const INITIAL_JUMP_CHARGES: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Idle,
    Run,
    Jump,
    Fall,
    Land,
    DeadHit,
    DeadGround,
}

impl PlayerState {
    pub const fn name(self) -> &'static str {
        match self {
            PlayerState::Idle => "idle",
            PlayerState::Run => "run",
            PlayerState::Jump => "jump",
            PlayerState::Fall => "fall",
            PlayerState::Land => "land",
            PlayerState::DeadHit => "dead_hit",
            PlayerState::DeadGround => "dead_ground",
        }
    }

    pub const fn is_dead(self) -> bool {
        matches!(self, PlayerState::DeadHit | PlayerState::DeadGround)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MoveIntent {
    #[default]
    None,
    Left,
    Right,
}

/// Per-tick commands from the input layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerInput {
    pub movement: MoveIntent,
    pub jump_held: bool,
    pub jump_pressed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageOutcome {
    /// Invincible or already dead.
    Ignored,
    Hurt,
    Killed,
}

/// What happened to the player during one tick, for effects and events.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlayerTickReport {
    pub jumped_at: Option<Vec2>,
    pub landed_at: Option<Vec2>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct WallContact {
    side: WallSide,
    snap_x: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    rect: Rect,
    velocity: Vec2,
    state: PlayerState,
    state_elapsed: Duration,
    health: f32,
    max_health: f32,
    jumps_left: u8,
    touching_ground: bool,
    touching_ceiling: bool,
    wall: Option<WallContact>,
    can_move_left: bool,
    can_move_right: bool,
    facing_right: bool,
    invincible_elapsed: Option<Duration>,
    abilities: Abilities,
    tuning: PlayerTuning,
    animation: LoopingAnimation,
}

impl Player {
    pub fn new(spawn: Vec2, tuning: PlayerTuning, abilities: Abilities, max_health: f32) -> Self {
        Self {
            rect: Rect::new(spawn.x, spawn.y, tuning.width, tuning.height),
            velocity: Vec2::ZERO,
            state: PlayerState::Idle,
            state_elapsed: Duration::ZERO,
            health: max_health,
            max_health,
            jumps_left: INITIAL_JUMP_CHARGES,
            touching_ground: false,
            touching_ceiling: false,
            wall: None,
            can_move_left: true,
            can_move_right: true,
            facing_right: true,
            invincible_elapsed: None,
            abilities,
            tuning,
            animation: LoopingAnimation::new(
                PLAYER_ANIMATION_FRAMES,
                tuning.animation_frames_per_tick,
            ),
        }
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn health(&self) -> f32 {
        self.health
    }

    pub fn max_health(&self) -> f32 {
        self.max_health
    }

    pub fn jumps_left(&self) -> u8 {
        self.jumps_left
    }

    pub fn touching_ground(&self) -> bool {
        self.touching_ground
    }

    pub fn touching_ceiling(&self) -> bool {
        self.touching_ceiling
    }

    pub fn touching_left_wall(&self) -> bool {
        matches!(self.wall, Some(WallContact { side: WallSide::Left, .. }))
    }

    pub fn touching_right_wall(&self) -> bool {
        matches!(self.wall, Some(WallContact { side: WallSide::Right, .. }))
    }

    pub fn facing_right(&self) -> bool {
        self.facing_right
    }

    pub fn is_dead(&self) -> bool {
        self.state.is_dead()
    }

    pub fn is_invincible(&self) -> bool {
        self.invincible_elapsed.is_some()
    }

    pub fn frame(&self) -> u32 {
        self.animation.frame()
    }

    /// Draw alpha. Pulses while invincible, opaque otherwise.
    pub fn opacity(&self) -> u8 {
        match self.invincible_elapsed {
            Some(elapsed) => {
                let millis = elapsed.as_millis() as f32;
                ((1.0 + millis.sin()) * 256.0 / 2.0).clamp(0.0, 255.0) as u8
            }
            None => u8::MAX,
        }
    }

    /// One fixed tick: input, run, invincibility timer, horizontal pass,
    /// gravity, vertical pass, state, animation. Dead players only fall.
    pub fn update(
        &mut self,
        input: PlayerInput,
        solids: &[Rect],
        fixed_dt: Duration,
        diagnostics: &mut TickDiagnostics,
    ) -> PlayerTickReport {
        let mut report = PlayerTickReport::default();

        if self.is_dead() {
            self.velocity.x = 0.0;
        } else {
            self.apply_input(input, &mut report);
            self.run();
            self.tick_invincibility(fixed_dt);
            self.check_horizontal(solids, diagnostics);
        }

        self.apply_gravity();
        self.check_vertical(solids, diagnostics);

        if self.update_state(fixed_dt) {
            report.landed_at = Some(self.dust_anchor(LAND_DUST_OFFSET));
        }
        self.animation.advance();
        report
    }

    pub fn take_damage(&mut self, amount: f32) -> DamageOutcome {
        if self.is_dead() || self.is_invincible() {
            return DamageOutcome::Ignored;
        }
        self.health -= amount;
        self.invincible_elapsed = Some(Duration::ZERO);
        if self.health <= 0.0 {
            self.health = 0.0;
            self.die();
            return DamageOutcome::Killed;
        }
        DamageOutcome::Hurt
    }

    pub fn heal(&mut self, amount: f32) {
        if self.is_dead() {
            return;
        }
        self.health = (self.health + amount).min(self.max_health);
    }

    /// Forces the death sequence without damage, e.g. after falling out of
    /// the level.
    pub fn die(&mut self) {
        if self.is_dead() {
            return;
        }
        self.state = PlayerState::DeadHit;
        self.state_elapsed = Duration::ZERO;
        self.velocity.x = 0.0;
        self.wall = None;
    }

    /// Hazard knockback: reverse horizontal direction and pop upward.
    pub fn knock_back(&mut self, bounce: f32) {
        self.velocity.x = -self.velocity.x;
        self.velocity.y = bounce;
    }

    pub fn bounce(&mut self, velocity_y: f32) {
        self.velocity.y = velocity_y;
    }

    fn apply_input(&mut self, input: PlayerInput, report: &mut PlayerTickReport) {
        self.velocity.x = 0.0;
        match input.movement {
            MoveIntent::Right => {
                self.can_move_left = true;
                self.velocity.x = self.tuning.run_speed;
                self.facing_right = true;
            }
            MoveIntent::Left => {
                self.can_move_right = true;
                self.velocity.x = -self.tuning.run_speed;
                self.facing_right = false;
            }
            MoveIntent::None => {}
        }

        let wants_jump = if self.abilities.edge_triggered_jump {
            input.jump_pressed
        } else {
            input.jump_held
        };
        if wants_jump && self.try_jump() {
            report.jumped_at = Some(self.dust_anchor(JUMP_DUST_OFFSET));
        }
    }

    /// Jumping with no charge left, or while the first impulse is still too
    /// strong, is a silent no-op.
    fn try_jump(&mut self) -> bool {
        let grounded_or_allowed = self.touching_ground || self.abilities.jump_while_falling;
        let impulse_spent = self.jumps_left >= INITIAL_JUMP_CHARGES
            || self.velocity.y > self.tuning.jump_impulse + self.tuning.double_jump_slack;
        if self.jumps_left == 0 || !grounded_or_allowed || !impulse_spent {
            return false;
        }

        self.velocity.y = self.tuning.jump_impulse;
        self.rect.translate(0.0, self.velocity.y);
        self.jumps_left = if self.abilities.double_jump {
            self.jumps_left - 1
        } else {
            0
        };
        true
    }

    fn run(&mut self) {
        let speed = self.velocity.x;
        if (speed > 0.0 && self.can_move_right) || (speed < 0.0 && self.can_move_left) {
            self.rect.translate(speed, 0.0);
        }
    }

    fn tick_invincibility(&mut self, fixed_dt: Duration) {
        if let Some(elapsed) = self.invincible_elapsed {
            let elapsed = elapsed + fixed_dt;
            self.invincible_elapsed = (elapsed < self.tuning.invincibility).then_some(elapsed);
        }
    }

    fn check_horizontal(&mut self, solids: &[Rect], diagnostics: &mut TickDiagnostics) {
        let hit = resolve_horizontal(
            &mut self.rect,
            self.velocity.x,
            self.velocity.y,
            solids,
            diagnostics,
        );
        match hit {
            Some(hit) => {
                match hit.side {
                    WallSide::Right => self.can_move_right = false,
                    WallSide::Left => self.can_move_left = false,
                }
                self.wall = Some(WallContact {
                    side: hit.side,
                    snap_x: hit.snap_x,
                });
            }
            None => {
                self.can_move_left = true;
                self.can_move_right = true;
            }
        }

        // Flag survives small jitter around the snap point.
        if let Some(contact) = self.wall {
            let edge = match contact.side {
                WallSide::Left => self.rect.left(),
                WallSide::Right => self.rect.right(),
            };
            if (edge - contact.snap_x).abs() > self.tuning.wall_release_tolerance {
                self.wall = None;
            }
        }
    }

    fn apply_gravity(&mut self) {
        self.velocity.y += self.tuning.gravity;
        self.rect.translate(0.0, self.velocity.y);
    }

    fn check_vertical(&mut self, solids: &[Rect], diagnostics: &mut TickDiagnostics) {
        self.touching_ground = false;
        self.touching_ceiling = false;

        match resolve_vertical(&mut self.rect, self.velocity.y, solids, diagnostics) {
            Some(VerticalContact::Ground) => {
                self.touching_ground = true;
                self.jumps_left = INITIAL_JUMP_CHARGES;
                self.velocity.y = 0.0;
            }
            Some(VerticalContact::Ceiling) => {
                self.touching_ceiling = true;
                self.velocity.y = 0.0;
            }
            None => {}
        }
    }

    /// Returns true on the tick the player lands.
    fn update_state(&mut self, fixed_dt: Duration) -> bool {
        self.state_elapsed += fixed_dt;
        match self.state {
            PlayerState::DeadHit => {
                if self.state_elapsed >= self.tuning.dead_hit_duration {
                    self.enter(PlayerState::DeadGround);
                }
                false
            }
            PlayerState::DeadGround => false,
            PlayerState::Land if self.state_elapsed < self.tuning.land_duration => false,
            _ => {
                let next = self.next_state();
                if next != self.state {
                    self.enter(next);
                }
                next == PlayerState::Land
            }
        }
    }

    fn next_state(&self) -> PlayerState {
        let Vec2 { x, y } = self.velocity;
        if self.state == PlayerState::Fall && y == 0.0 {
            PlayerState::Land
        } else if x == 0.0 && y == 0.0 {
            PlayerState::Idle
        } else if y < 0.0 {
            PlayerState::Jump
        } else if y > 0.0 {
            PlayerState::Fall
        } else {
            PlayerState::Run
        }
    }

    fn enter(&mut self, state: PlayerState) {
        self.state = state;
        self.state_elapsed = Duration::ZERO;
        self.animation.restart();
    }

    fn dust_anchor(&self, offset_y: f32) -> Vec2 {
        let anchor = self.rect.midbottom();
        Vec2::new(anchor.x, anchor.y + offset_y)
    }

    #[cfg(test)]
    pub(crate) fn set_velocity(&mut self, velocity: Vec2) {
        self.velocity = velocity;
    }

    #[cfg(test)]
    pub(crate) fn set_rect(&mut self, rect: Rect) {
        self.rect = rect;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_nanos(16_666_667);

    fn player_at(x: f32, y: f32) -> Player {
        Player::new(
            Vec2::new(x, y),
            PlayerTuning::default(),
            Abilities::default(),
            100.0,
        )
    }

    fn floor() -> Rect {
        Rect::new(-640.0, 64.0, 1280.0, 64.0)
    }

    fn held(movement: MoveIntent) -> PlayerInput {
        PlayerInput {
            movement,
            ..PlayerInput::default()
        }
    }

    fn jump_held() -> PlayerInput {
        PlayerInput {
            jump_held: true,
            ..PlayerInput::default()
        }
    }

    #[test]
    fn running_into_wall_snaps_and_flags_contact() {
        let wall = Rect::new(50.0, 0.0, 64.0, 64.0);
        let mut player = player_at(0.0, 0.0);
        let mut diagnostics = TickDiagnostics::default();

        player.update(held(MoveIntent::Right), &[wall, floor()], TICK, &mut diagnostics);

        assert_eq!(player.rect().right(), 50.0);
        assert!(player.touching_right_wall());
        assert!(!player.touching_left_wall());
        assert!(player.touching_ground());
        assert_eq!(player.velocity().y, 0.0);
    }

    #[test]
    fn wall_flag_clears_once_past_tolerance() {
        let wall = Rect::new(50.0, 0.0, 64.0, 64.0);
        let solids = [wall, floor()];
        let mut player = player_at(0.0, 0.0);
        let mut diagnostics = TickDiagnostics::default();

        player.update(held(MoveIntent::Right), &solids, TICK, &mut diagnostics);
        assert!(player.touching_right_wall());

        // 6 units away is past the 5 unit band.
        player.update(held(MoveIntent::Left), &solids, TICK, &mut diagnostics);
        assert!(!player.touching_right_wall());
    }

    #[test]
    fn landing_restores_jump_charges() {
        let mut player = player_at(0.0, -40.0);
        let mut diagnostics = TickDiagnostics::default();

        for _ in 0..60 {
            player.update(PlayerInput::default(), &[floor()], TICK, &mut diagnostics);
            if player.touching_ground() {
                assert_eq!(player.jumps_left(), 2);
            }
        }
        assert!(player.touching_ground());
        assert_eq!(player.rect().bottom(), 64.0);
    }

    #[test]
    fn jump_applies_impulse_and_spends_charge() {
        let mut player = player_at(0.0, 0.0);
        let mut diagnostics = TickDiagnostics::default();
        player.update(PlayerInput::default(), &[floor()], TICK, &mut diagnostics);
        assert!(player.touching_ground());

        let report = player.update(jump_held(), &[floor()], TICK, &mut diagnostics);
        assert!(report.jumped_at.is_some());
        assert_eq!(player.jumps_left(), 1);
        assert_eq!(player.velocity().y, -22.0 + 1.2);
        assert_eq!(player.state(), PlayerState::Jump);
    }

    #[test]
    fn airborne_jump_is_ignored_without_falling_ability() {
        let mut player = player_at(0.0, -300.0);
        let mut diagnostics = TickDiagnostics::default();
        player.update(PlayerInput::default(), &[floor()], TICK, &mut diagnostics);

        let report = player.update(jump_held(), &[floor()], TICK, &mut diagnostics);
        assert!(report.jumped_at.is_none());
        assert_eq!(player.jumps_left(), 2);
    }

    #[test]
    fn double_jump_waits_for_first_impulse_to_weaken() {
        let mut player = Player::new(
            Vec2::new(0.0, -2000.0),
            PlayerTuning::default(),
            Abilities {
                jump_while_falling: true,
                ..Abilities::default()
            },
            100.0,
        );
        let mut diagnostics = TickDiagnostics::default();

        player.update(jump_held(), &[], TICK, &mut diagnostics);
        assert_eq!(player.jumps_left(), 1);
        for _ in 0..5 {
            player.update(jump_held(), &[], TICK, &mut diagnostics);
        }
        assert_eq!(player.jumps_left(), 1);
        for _ in 0..6 {
            player.update(jump_held(), &[], TICK, &mut diagnostics);
        }
        assert_eq!(player.jumps_left(), 0);
    }

    #[test]
    fn single_jump_without_double_jump_ability() {
        let mut player = Player::new(
            Vec2::new(0.0, 0.0),
            PlayerTuning::default(),
            Abilities {
                double_jump: false,
                ..Abilities::default()
            },
            100.0,
        );
        let mut diagnostics = TickDiagnostics::default();
        player.update(PlayerInput::default(), &[floor()], TICK, &mut diagnostics);
        player.update(jump_held(), &[floor()], TICK, &mut diagnostics);
        assert_eq!(player.jumps_left(), 0);
    }

    #[test]
    fn edge_triggered_jump_ignores_held_key() {
        let mut player = Player::new(
            Vec2::new(0.0, 0.0),
            PlayerTuning::default(),
            Abilities {
                edge_triggered_jump: true,
                ..Abilities::default()
            },
            100.0,
        );
        let mut diagnostics = TickDiagnostics::default();
        player.update(PlayerInput::default(), &[floor()], TICK, &mut diagnostics);

        let report = player.update(jump_held(), &[floor()], TICK, &mut diagnostics);
        assert!(report.jumped_at.is_none());

        let pressed = PlayerInput {
            jump_pressed: true,
            jump_held: true,
            ..PlayerInput::default()
        };
        let report = player.update(pressed, &[floor()], TICK, &mut diagnostics);
        assert!(report.jumped_at.is_some());
    }

    #[test]
    fn damage_applies_once_per_invincibility_window() {
        let mut player = player_at(0.0, 0.0);
        assert_eq!(player.take_damage(25.0), DamageOutcome::Hurt);
        assert_eq!(player.take_damage(25.0), DamageOutcome::Ignored);
        assert_eq!(player.take_damage(25.0), DamageOutcome::Ignored);
        assert_eq!(player.health(), 75.0);
        assert!(player.opacity() <= u8::MAX);
    }

    #[test]
    fn invincibility_expires_after_window() {
        let mut player = player_at(0.0, 0.0);
        let mut diagnostics = TickDiagnostics::default();
        player.take_damage(25.0);

        // 2000 ms at 60 tps is 120 ticks.
        for _ in 0..121 {
            player.update(PlayerInput::default(), &[floor()], TICK, &mut diagnostics);
        }
        assert!(!player.is_invincible());
        assert_eq!(player.opacity(), u8::MAX);
        assert_eq!(player.take_damage(25.0), DamageOutcome::Hurt);
        assert_eq!(player.health(), 50.0);
    }

    #[test]
    fn fatal_damage_enters_dead_states_and_keeps_falling() {
        let mut player = player_at(0.0, -200.0);
        let mut diagnostics = TickDiagnostics::default();
        player.set_velocity(Vec2::new(0.0, 0.0));

        assert_eq!(player.take_damage(150.0), DamageOutcome::Killed);
        assert_eq!(player.state(), PlayerState::DeadHit);
        assert_eq!(player.health(), 0.0);

        for _ in 0..60 {
            player.update(held(MoveIntent::Right), &[floor()], TICK, &mut diagnostics);
        }
        assert_eq!(player.state(), PlayerState::DeadGround);
        assert_eq!(player.rect().left(), 0.0);
        assert_eq!(player.rect().bottom(), 64.0);
        assert_eq!(player.take_damage(10.0), DamageOutcome::Ignored);
    }

    #[test]
    fn fall_then_land_then_idle() {
        let mut player = player_at(0.0, -100.0);
        let mut diagnostics = TickDiagnostics::default();

        player.update(PlayerInput::default(), &[floor()], TICK, &mut diagnostics);
        assert_eq!(player.state(), PlayerState::Fall);

        let mut landed = false;
        for _ in 0..30 {
            let report = player.update(PlayerInput::default(), &[floor()], TICK, &mut diagnostics);
            landed |= report.landed_at.is_some();
            if landed {
                break;
            }
        }
        assert!(landed);
        assert_eq!(player.state(), PlayerState::Land);

        for _ in 0..20 {
            player.update(PlayerInput::default(), &[floor()], TICK, &mut diagnostics);
        }
        assert_eq!(player.state(), PlayerState::Idle);
    }

    #[test]
    fn running_on_ground_is_run_state() {
        let mut player = player_at(0.0, 0.0);
        let mut diagnostics = TickDiagnostics::default();
        player.update(held(MoveIntent::Left), &[floor()], TICK, &mut diagnostics);
        player.update(held(MoveIntent::Left), &[floor()], TICK, &mut diagnostics);
        assert_eq!(player.state(), PlayerState::Run);
        assert!(!player.facing_right());
        assert_eq!(player.rect().left(), -12.0);
    }

    #[test]
    fn heal_is_capped_at_max_health() {
        let mut player = player_at(0.0, 0.0);
        player.take_damage(25.0);
        player.heal(40.0);
        assert_eq!(player.health(), 100.0);
    }

    #[test]
    fn knock_back_reverses_and_pops_up() {
        let mut player = player_at(0.0, 0.0);
        player.set_velocity(Vec2::new(6.0, 0.0));
        player.knock_back(-12.0);
        assert_eq!(player.velocity(), Vec2::new(-6.0, -12.0));
        player.set_rect(Rect::new(5.0, 5.0, 50.0, 64.0));
        assert_eq!(player.rect().left(), 5.0);
    }
}
