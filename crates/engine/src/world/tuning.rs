use std::time::Duration;

use super::geometry::TILE_SIZE;

/// Logical viewport in world units (21.3 x 11 tiles).
pub const VIEWPORT_WIDTH: f32 = 1366.0;
pub const VIEWPORT_HEIGHT: f32 = TILE_SIZE * 11.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerTuning {
    pub width: f32,
    pub height: f32,
    pub run_speed: f32,
    pub gravity: f32,
    /// Negative: y grows downward.
    pub jump_impulse: f32,
    /// A second jump is allowed once vertical velocity exceeds
    /// `jump_impulse + double_jump_slack`.
    pub double_jump_slack: f32,
    pub max_health: f32,
    pub invincibility: Duration,
    pub wall_release_tolerance: f32,
    pub dead_hit_duration: Duration,
    pub land_duration: Duration,
    pub animation_frames_per_tick: f32,
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self {
            width: 50.0,
            height: 64.0,
            run_speed: 6.0,
            gravity: 1.2,
            jump_impulse: -22.0,
            double_jump_slack: 10.0,
            max_health: 100.0,
            invincibility: Duration::from_millis(2000),
            wall_release_tolerance: 5.0,
            dead_hit_duration: Duration::from_millis(400),
            land_duration: Duration::from_millis(150),
            animation_frames_per_tick: 0.09,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnemyTuning {
    pub width: f32,
    pub height: f32,
    pub speed: f32,
    pub damage: f32,
    pub stomp_bounce: f32,
    pub animation_frames_per_tick: f32,
}

impl Default for EnemyTuning {
    fn default() -> Self {
        Self {
            width: 52.0,
            height: 40.0,
            speed: 2.0,
            damage: 25.0,
            stomp_bounce: -15.0,
            animation_frames_per_tick: 0.15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HazardTuning {
    pub spike_damage: f32,
    pub spike_bounce: f32,
    /// Spikes only hurt in the lower part of their cell.
    pub spike_inset_top: f32,
    pub bottle_heal: f32,
    pub fall_death_margin: f32,
}

impl Default for HazardTuning {
    fn default() -> Self {
        Self {
            spike_damage: 25.0,
            spike_bounce: -12.0,
            spike_inset_top: 32.0,
            bottle_heal: 25.0,
            fall_death_margin: 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraTuning {
    pub viewport_width: f32,
    pub viewport_height: f32,
    pub border_left: f32,
    pub border_right: f32,
    pub border_top: f32,
    pub border_bottom: f32,
}

impl Default for CameraTuning {
    fn default() -> Self {
        Self {
            viewport_width: VIEWPORT_WIDTH,
            viewport_height: VIEWPORT_HEIGHT,
            border_left: 400.0,
            border_right: 500.0,
            border_top: 150.0,
            border_bottom: 200.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionTuning {
    pub pause_delay: Duration,
    pub effect_frames_per_tick: f32,
}

impl Default for SessionTuning {
    fn default() -> Self {
        Self {
            pause_delay: Duration::from_millis(1500),
            effect_frames_per_tick: 0.2,
        }
    }
}

/// Every gameplay constant in one place. Defaults reproduce the shipped
/// game; `<TuningDef>` entries in the defs override individual fields.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GameTuning {
    pub player: PlayerTuning,
    pub enemy: EnemyTuning,
    pub hazard: HazardTuning,
    pub camera: CameraTuning,
    pub session: SessionTuning,
}
