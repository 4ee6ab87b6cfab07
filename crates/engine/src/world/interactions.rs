//! Player versus everything else. These checks only run while the player is
//! alive and input is enabled; the session enforces that.

use crate::app::TickDiagnostics;

use super::enemy::Enemy;
use super::geometry::{Penetration, Rect, Vec2};
use super::player::{DamageOutcome, Player};
use super::progress::LevelStats;
use super::session::LevelEvent;
use super::tiles::{Partition, Pickup, TileRole, TileWorld};
use super::tuning::{EnemyTuning, HazardTuning};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnemyContact {
    Damage,
    Stomp,
}

/// Stomp or damage. The approach side picks which horizontal depth to use;
/// a contact that is shallower horizontally than vertically, or any contact
/// without a downward velocity, hurts the player.
pub fn classify_enemy_contact(
    player: &Rect,
    player_velocity: Vec2,
    enemy: &Rect,
    enemy_direction: f32,
) -> EnemyContact {
    let depth = Penetration::between(player, enemy);
    let horizontal = if player_velocity.x > 0.0 || enemy_direction < 0.0 {
        depth.from_left
    } else {
        depth.from_right
    };
    let vertical = depth.from_top;

    let side_contact = player_velocity.y == 0.0 || horizontal < vertical;
    if side_contact || player_velocity.y < 0.0 {
        EnemyContact::Damage
    } else {
        EnemyContact::Stomp
    }
}

fn push_damage(events: &mut Vec<LevelEvent>, player: &Player, outcome: DamageOutcome) {
    match outcome {
        DamageOutcome::Ignored => {}
        DamageOutcome::Hurt => events.push(LevelEvent::PlayerHit {
            health: player.health(),
        }),
        DamageOutcome::Killed => {
            events.push(LevelEvent::PlayerHit { health: 0.0 });
            events.push(LevelEvent::PlayerDied);
        }
    }
}

/// Spikes hurt through their narrowed collide rect and always knock the
/// player clear, even while invincible.
pub fn check_spikes(
    player: &mut Player,
    world: &TileWorld,
    hazard: &HazardTuning,
    events: &mut Vec<LevelEvent>,
    diagnostics: &mut TickDiagnostics,
) {
    let player_rect = player.rect();
    let hit = world
        .tiles(Partition::Spikes)
        .iter()
        .find(|spike| spike.collision_rect().overlaps(&player_rect));
    let Some(spike) = hit else {
        return;
    };

    diagnostics.contacts += 1;
    let damage = match spike.role {
        TileRole::Hazard { damage } => damage,
        _ => hazard.spike_damage,
    };
    let outcome = player.take_damage(damage);
    player.knock_back(hazard.spike_bounce);
    push_damage(events, player, outcome);
}

/// Resolves every overlapping enemy in order. A stomp removes the enemy
/// immediately and bounces the player, which turns later contacts in the
/// same tick into damage.
pub fn check_enemies(
    player: &mut Player,
    enemies: &mut Vec<Enemy>,
    tuning: &EnemyTuning,
    stats: &mut LevelStats,
    events: &mut Vec<LevelEvent>,
    diagnostics: &mut TickDiagnostics,
) {
    let mut index = 0;
    while index < enemies.len() {
        let enemy = &enemies[index];
        if !player.rect().overlaps(&enemy.rect()) {
            index += 1;
            continue;
        }
        diagnostics.contacts += 1;

        match classify_enemy_contact(
            &player.rect(),
            player.velocity(),
            &enemy.rect(),
            enemy.direction(),
        ) {
            EnemyContact::Damage => {
                let outcome = player.take_damage(enemy.damage());
                push_damage(events, player, outcome);
                index += 1;
            }
            EnemyContact::Stomp => {
                let enemy = enemies.remove(index);
                stats.enemies_killed += 1;
                player.bounce(tuning.stomp_bounce);
                events.push(LevelEvent::EnemyStomped {
                    at: enemy.rect().center(),
                });
            }
        }
    }
}

/// Coins and collectibles: counted, removed, and reported once.
pub fn check_pickups(
    player: &mut Player,
    world: &mut TileWorld,
    hazard: &HazardTuning,
    stats: &mut LevelStats,
    events: &mut Vec<LevelEvent>,
    diagnostics: &mut TickDiagnostics,
) {
    for partition in [Partition::Coins, Partition::Collectibles] {
        let player_rect = player.rect();
        let touched = world
            .tiles(partition)
            .iter()
            .enumerate()
            .filter(|(_, tile)| tile.collision_rect().overlaps(&player_rect))
            .map(|(index, _)| index)
            .collect::<Vec<_>>();

        for index in touched.into_iter().rev() {
            let Some(tile) = world.remove(partition, index) else {
                continue;
            };
            let TileRole::Pickup(pickup) = tile.role else {
                continue;
            };
            diagnostics.contacts += 1;
            match pickup {
                Pickup::GoldCoin => stats.gold_coins += 1,
                Pickup::SilverCoin => stats.silver_coins += 1,
                Pickup::GoldenSkull => stats.golden_skulls += 1,
                Pickup::RedDiamond => stats.red_diamonds += 1,
                Pickup::GreenBottle => player.heal(hazard.bottle_heal),
            }
            events.push(LevelEvent::Collected {
                pickup,
                at: tile.rect.center(),
            });
        }
    }
}

pub fn reached_goal(player: &Player, goal: &Rect) -> bool {
    player.rect().overlaps(goal)
}

/// Kills the player once its bottom edge passes below the level plus the
/// margin. Returns true on the tick that happens.
pub fn check_fall_out(player: &mut Player, bounds: &Rect, margin: f32) -> bool {
    if player.is_dead() || player.rect().bottom() <= bounds.bottom() + margin {
        return false;
    }
    player.die();
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::progress::Abilities;
    use crate::world::tiles::{StaticTile, VisualBehavior};
    use crate::world::tuning::PlayerTuning;

    fn player_at(x: f32, y: f32, velocity: Vec2) -> Player {
        let mut player = Player::new(
            Vec2::new(x, y),
            PlayerTuning::default(),
            Abilities::default(),
            100.0,
        );
        player.set_velocity(velocity);
        player
    }

    fn enemy_at(x: f32, y: f32) -> Enemy {
        Enemy::new(Rect::new(x, y, 52.0, 40.0), &EnemyTuning::default(), Vec::new())
    }

    fn pickup_tile(x: f32, pickup: Pickup) -> StaticTile {
        StaticTile {
            rect: Rect::new(x + 16.0, 16.0, 32.0, 32.0),
            collide_rect: None,
            role: TileRole::Pickup(pickup),
            variant: 0,
            sprite_key: "coins/gold".to_string(),
            behavior: VisualBehavior::Static,
        }
    }

    #[test]
    fn falling_onto_enemy_top_stomps() {
        // 4 units into the enemy's top.
        let mut player = player_at(10.0, 0.0, Vec2::new(0.0, 5.0));
        let mut enemies = vec![enemy_at(30.0, 60.0)];
        let mut stats = LevelStats::default();
        let mut events = Vec::new();
        let mut diagnostics = TickDiagnostics::default();

        check_enemies(
            &mut player,
            &mut enemies,
            &EnemyTuning::default(),
            &mut stats,
            &mut events,
            &mut diagnostics,
        );

        assert!(enemies.is_empty());
        assert_eq!(stats.enemies_killed, 1);
        assert_eq!(player.health(), 100.0);
        assert_eq!(player.velocity().y, -15.0);
        assert!(matches!(events[0], LevelEvent::EnemyStomped { .. }));
    }

    #[test]
    fn equal_depths_while_falling_stomp() {
        let player = Rect::new(0.0, 0.0, 50.0, 64.0);
        let enemy = Rect::new(40.0, 54.0, 52.0, 40.0);
        let contact = classify_enemy_contact(&player, Vec2::new(6.0, 3.0), &enemy, 1.0);
        assert_eq!(contact, EnemyContact::Stomp);
    }

    // Falling is not enough: a clip that is shallower from the side than
    // from the top is a side hit, so the player is hurt and the enemy lives.
    #[test]
    fn falling_side_clip_shallower_horizontally_damages() {
        let mut player = player_at(0.0, 0.0, Vec2::new(6.0, 3.0));
        let mut enemies = vec![enemy_at(45.0, 40.0)];
        let depth = Penetration::between(&player.rect(), &enemies[0].rect());
        assert!(depth.from_left < depth.from_top);

        let mut stats = LevelStats::default();
        let mut events = Vec::new();
        let mut diagnostics = TickDiagnostics::default();
        check_enemies(
            &mut player,
            &mut enemies,
            &EnemyTuning::default(),
            &mut stats,
            &mut events,
            &mut diagnostics,
        );

        assert_eq!(enemies.len(), 1);
        assert_eq!(stats.enemies_killed, 0);
        assert_eq!(player.health(), 75.0);
    }

    #[test]
    fn side_contact_without_vertical_motion_damages() {
        let mut player = player_at(0.0, 24.0, Vec2::new(6.0, 0.0));
        let mut enemies = vec![enemy_at(45.0, 48.0)];
        let mut stats = LevelStats::default();
        let mut events = Vec::new();
        let mut diagnostics = TickDiagnostics::default();

        check_enemies(
            &mut player,
            &mut enemies,
            &EnemyTuning::default(),
            &mut stats,
            &mut events,
            &mut diagnostics,
        );

        assert_eq!(enemies.len(), 1);
        assert_eq!(player.health(), 75.0);
        assert_eq!(stats.enemies_killed, 0);
        assert_eq!(events, vec![LevelEvent::PlayerHit { health: 75.0 }]);
    }

    #[test]
    fn rising_through_enemy_damages() {
        let player = Rect::new(10.0, 0.0, 50.0, 64.0);
        let enemy = Rect::new(30.0, 60.0, 52.0, 40.0);
        let contact = classify_enemy_contact(&player, Vec2::new(0.0, -4.0), &enemy, 1.0);
        assert_eq!(contact, EnemyContact::Damage);
    }

    #[test]
    fn enemy_walking_into_player_uses_left_depth() {
        // Enemy moves left into a standing player from the right.
        let player = Rect::new(0.0, 0.0, 50.0, 64.0);
        let enemy = Rect::new(46.0, 24.0, 52.0, 40.0);
        let contact = classify_enemy_contact(&player, Vec2::new(0.0, 2.0), &enemy, -1.0);
        assert_eq!(contact, EnemyContact::Damage);
    }

    #[test]
    fn coin_is_counted_once_and_removed() {
        let mut player = player_at(0.0, 0.0, Vec2::ZERO);
        let mut world = TileWorld::default();
        world.push(Partition::Coins, pickup_tile(0.0, Pickup::GoldCoin));
        world.push(Partition::Coins, pickup_tile(512.0, Pickup::SilverCoin));
        let mut stats = LevelStats::default();
        let mut events = Vec::new();
        let mut diagnostics = TickDiagnostics::default();

        for _ in 0..2 {
            check_pickups(
                &mut player,
                &mut world,
                &HazardTuning::default(),
                &mut stats,
                &mut events,
                &mut diagnostics,
            );
        }

        assert_eq!(stats.gold_coins, 1);
        assert_eq!(stats.silver_coins, 0);
        assert_eq!(world.tile_count(Partition::Coins), 1);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn green_bottle_heals() {
        let mut player = player_at(0.0, 0.0, Vec2::ZERO);
        player.take_damage(50.0);
        let mut world = TileWorld::default();
        world.push(Partition::Collectibles, pickup_tile(0.0, Pickup::GreenBottle));
        let mut stats = LevelStats::default();
        let mut events = Vec::new();
        let mut diagnostics = TickDiagnostics::default();

        check_pickups(
            &mut player,
            &mut world,
            &HazardTuning::default(),
            &mut stats,
            &mut events,
            &mut diagnostics,
        );
        assert_eq!(player.health(), 75.0);
        assert_eq!(stats, LevelStats::default());
    }

    #[test]
    fn spike_hurts_once_but_always_bounces() {
        let mut player = player_at(0.0, 0.0, Vec2::new(6.0, 3.0));
        let mut world = TileWorld::default();
        world.push(
            Partition::Spikes,
            StaticTile {
                rect: Rect::new(0.0, 32.0, 64.0, 64.0),
                collide_rect: Some(Rect::new(0.0, 64.0 - 4.0, 64.0, 32.0)),
                role: TileRole::Hazard { damage: 25.0 },
                variant: 0,
                sprite_key: "spikes".to_string(),
                behavior: VisualBehavior::Static,
            },
        );
        let hazard = HazardTuning::default();
        let mut events = Vec::new();
        let mut diagnostics = TickDiagnostics::default();

        check_spikes(&mut player, &world, &hazard, &mut events, &mut diagnostics);
        assert_eq!(player.health(), 75.0);
        assert_eq!(player.velocity(), Vec2::new(-6.0, -12.0));

        check_spikes(&mut player, &world, &hazard, &mut events, &mut diagnostics);
        assert_eq!(player.health(), 75.0);
        assert_eq!(player.velocity().y, -12.0);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn falling_below_bounds_kills_once() {
        let bounds = Rect::new(0.0, 0.0, 640.0, 640.0);
        // Bottom edge exactly on the margin line is still alive.
        let mut player = player_at(0.0, 740.0 - 64.0, Vec2::ZERO);
        assert!(!check_fall_out(&mut player, &bounds, 100.0));

        let mut player = player_at(0.0, 740.0 - 63.0, Vec2::ZERO);
        assert!(check_fall_out(&mut player, &bounds, 100.0));
        assert!(player.is_dead());
        assert!(!check_fall_out(&mut player, &bounds, 100.0));
    }

    #[test]
    fn goal_needs_overlap() {
        let player = player_at(0.0, 0.0, Vec2::ZERO);
        assert!(reached_goal(&player, &Rect::new(40.0, 0.0, 64.0, 64.0)));
        assert!(!reached_goal(&player, &Rect::new(50.0, 0.0, 64.0, 64.0)));
    }
}
