use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::tuning::PlayerTuning;

pub const PROGRESS_VERSION: u32 = 1;
pub const DEFAULT_LEVEL_COUNT: u32 = 6;

const GOLD_WEIGHT: f64 = 3.0;
const ENEMY_WEIGHT: f64 = 2.0;
const SILVER_WEIGHT: f64 = 1.0;

/// Totals present in a level when it finished loading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InitialState {
    pub enemies: u32,
    pub gold_coins: u32,
    pub silver_coins: u32,
}

/// Counters for one attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LevelStats {
    pub enemies_killed: u32,
    pub gold_coins: u32,
    pub silver_coins: u32,
    pub golden_skulls: u32,
    pub red_diamonds: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelRecord {
    pub score: u32,
    pub current_score: u32,
    pub gold_coins: u32,
    pub silver_coins: u32,
    pub enemies_killed: u32,
    pub golden_skulls: u32,
    pub current_gold_coins: u32,
    pub current_silver_coins: u32,
    pub current_enemies_killed: u32,
    pub max_gold_coins: u32,
    pub max_silver_coins: u32,
    pub max_enemies: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Abilities {
    pub double_jump: bool,
    pub jump_while_falling: bool,
    /// When false, holding jump retries every tick until a charge applies.
    pub edge_triggered_jump: bool,
}

impl Default for Abilities {
    fn default() -> Self {
        Self {
            double_jump: true,
            jump_while_falling: false,
            edge_triggered_jump: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub music_volume: f32,
    pub vfx_volume: f32,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            music_volume: 0.4,
            vfx_volume: 0.4,
        }
    }
}

impl Preferences {
    pub fn clamped(self) -> Self {
        Self {
            music_volume: clamp_volume(self.music_volume),
            vfx_volume: clamp_volume(self.vfx_volume),
        }
    }
}

fn clamp_volume(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Persisted player record. Every stored field is listed here; adding one
/// means bumping `PROGRESS_VERSION` or giving it a serde default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerProgress {
    pub version: u32,
    pub max_level: u32,
    pub current_level: u32,
    pub max_health: u32,
    #[serde(default)]
    pub abilities: Abilities,
    pub preferences: Preferences,
    pub levels: BTreeMap<u32, LevelRecord>,
}

impl Default for PlayerProgress {
    fn default() -> Self {
        Self::with_level_count(DEFAULT_LEVEL_COUNT)
    }
}

impl PlayerProgress {
    pub fn with_level_count(level_count: u32) -> Self {
        Self {
            version: PROGRESS_VERSION,
            max_level: 1,
            current_level: 1,
            max_health: 100,
            abilities: Abilities::default(),
            preferences: Preferences::default(),
            levels: (1..=level_count.max(1))
                .map(|level| (level, LevelRecord::default()))
                .collect(),
        }
    }

    /// Record for a new game. The health cap starts at the tuned value; a
    /// loaded save keeps its own.
    pub fn new_game(level_count: u32, tuning: &PlayerTuning) -> Self {
        Self {
            max_health: tuning.max_health.round().max(1.0) as u32,
            ..Self::with_level_count(level_count)
        }
    }

    pub fn level_count(&self) -> u32 {
        self.levels.keys().next_back().copied().unwrap_or(0)
    }

    pub fn is_unlocked(&self, level: u32) -> bool {
        level >= 1 && level <= self.max_level
    }

    /// Raises the unlocked level; never lowers it and never passes the last
    /// level in the record.
    pub fn unlock_up_to(&mut self, level: u32) {
        let capped = level.min(self.level_count().max(1));
        if capped > self.max_level {
            self.max_level = capped;
        }
    }

    /// Folds one attempt into the record for `level`. Best counts only grow;
    /// `current_*` always mirror the attempt.
    pub fn update_level_data(&mut self, level: u32, stats: &LevelStats, initial: &InitialState) {
        let record = self.levels.entry(level).or_default();

        record.gold_coins = record.gold_coins.max(stats.gold_coins);
        record.silver_coins = record.silver_coins.max(stats.silver_coins);
        record.enemies_killed = record.enemies_killed.max(stats.enemies_killed);
        record.golden_skulls = record.golden_skulls.max(stats.golden_skulls);

        record.current_gold_coins = stats.gold_coins;
        record.current_silver_coins = stats.silver_coins;
        record.current_enemies_killed = stats.enemies_killed;

        record.max_gold_coins = initial.gold_coins;
        record.max_silver_coins = initial.silver_coins;
        record.max_enemies = initial.enemies;

        record.score = weighted_score(
            record.gold_coins,
            record.enemies_killed,
            record.silver_coins,
            initial,
        );
        record.current_score = weighted_score(
            record.current_gold_coins,
            record.current_enemies_killed,
            record.current_silver_coins,
            initial,
        );
    }

    pub fn total_score(&self) -> u32 {
        self.levels.values().map(|record| record.score).sum()
    }
}

/// Percentages of each category weighted gold x3, enemies x2, silver x1,
/// floored. A category with nothing to collect counts as complete.
pub fn weighted_score(gold: u32, enemies: u32, silver: u32, initial: &InitialState) -> u32 {
    let total = percent(gold, initial.gold_coins) * GOLD_WEIGHT
        + percent(enemies, initial.enemies) * ENEMY_WEIGHT
        + percent(silver, initial.silver_coins) * SILVER_WEIGHT;
    total.floor() as u32
}

fn percent(count: u32, total: u32) -> f64 {
    if total == 0 {
        return 100.0;
    }
    count as f64 * 100.0 / total as f64
}
