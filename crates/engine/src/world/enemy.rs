use super::collision::{resolve_patrol, PatrolContact};
use super::geometry::Rect;
use super::tiles::LoopingAnimation;
use super::tuning::EnemyTuning;

const ENEMY_RUN_FRAMES: u32 = 6;

/// Ground patroller. Moves horizontally at a constant speed and turns around
/// on the constraint zones it was spawned with. No gravity.
#[derive(Debug, Clone, PartialEq)]
pub struct Enemy {
    rect: Rect,
    /// +1 right, -1 left.
    direction: f32,
    speed: f32,
    damage: f32,
    constraints: Vec<Rect>,
    animation: LoopingAnimation,
}

impl Enemy {
    pub fn new(rect: Rect, tuning: &EnemyTuning, constraints: Vec<Rect>) -> Self {
        Self {
            rect,
            direction: 1.0,
            speed: tuning.speed,
            damage: tuning.damage,
            constraints,
            animation: LoopingAnimation::new(ENEMY_RUN_FRAMES, tuning.animation_frames_per_tick),
        }
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn direction(&self) -> f32 {
        self.direction
    }

    pub fn damage(&self) -> f32 {
        self.damage
    }

    pub fn constraints(&self) -> &[Rect] {
        &self.constraints
    }

    pub fn frame(&self) -> u32 {
        self.animation.frame()
    }

    /// Turns around on the first overlapping constraint; returns whether one
    /// was hit.
    pub fn resolve_constraints(&mut self) -> bool {
        match resolve_patrol(&mut self.rect, self.direction, &self.constraints) {
            PatrolContact::Reversed => {
                self.direction = -self.direction;
                true
            }
            PatrolContact::None => false,
        }
    }

    /// One tick: constraint check, then move.
    pub fn update(&mut self) -> bool {
        let reversed = self.resolve_constraints();
        self.rect.translate(self.direction * self.speed, 0.0);
        self.animation.advance();
        reversed
    }

    #[cfg(test)]
    pub(crate) fn set_direction(&mut self, direction: f32) {
        self.direction = direction;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enemy_at(x: f32, constraints: Vec<Rect>) -> Enemy {
        Enemy::new(
            Rect::new(x, 24.0, 52.0, 40.0),
            &EnemyTuning::default(),
            constraints,
        )
    }

    #[test]
    fn moving_right_into_constraint_reverses_and_snaps() {
        let constraint = Rect::new(128.0, 0.0, 64.0, 64.0);
        let mut enemy = enemy_at(80.0, vec![constraint]);
        assert_eq!(enemy.direction(), 1.0);

        assert!(enemy.resolve_constraints());
        assert_eq!(enemy.direction(), -1.0);
        assert_eq!(enemy.rect().right(), constraint.left());
    }

    #[test]
    fn moving_left_into_constraint_snaps_left_edge() {
        let constraint = Rect::new(0.0, 0.0, 64.0, 64.0);
        let mut enemy = enemy_at(60.0, vec![constraint]);
        enemy.set_direction(-1.0);

        assert!(enemy.resolve_constraints());
        assert_eq!(enemy.direction(), 1.0);
        assert_eq!(enemy.rect().left(), constraint.right());
    }

    #[test]
    fn patrols_between_two_constraints() {
        let left = Rect::new(0.0, 0.0, 64.0, 64.0);
        let right = Rect::new(256.0, 0.0, 64.0, 64.0);
        let mut enemy = enemy_at(100.0, vec![left, right]);

        let mut reversals = 0;
        for _ in 0..400 {
            if enemy.update() {
                reversals += 1;
            }
            assert!(enemy.rect().left() >= left.right() - 2.0);
            assert!(enemy.rect().right() <= right.left() + 2.0);
        }
        assert!(reversals >= 2);
    }

    #[test]
    fn ignores_constraints_it_was_not_given() {
        let mut enemy = enemy_at(0.0, Vec::new());
        for _ in 0..10 {
            assert!(!enemy.update());
        }
        assert_eq!(enemy.rect().left(), 20.0);
    }
}
