use super::geometry::{Rect, Vec2};
use super::tuning::CameraTuning;

/// Soft-follow camera. The target moves freely inside the dead zone; leaving
/// it drags the zone along, and the resulting view is clamped to the level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    dead_zone: Rect,
    bounds: Rect,
    tuning: CameraTuning,
}

impl Camera {
    pub fn new(bounds: Rect, tuning: CameraTuning) -> Self {
        let dead_zone = Rect::new(
            bounds.left() + tuning.border_left,
            bounds.top() + tuning.border_top,
            (tuning.viewport_width - (tuning.border_left + tuning.border_right)).max(1.0),
            (tuning.viewport_height - (tuning.border_top + tuning.border_bottom)).max(1.0),
        );
        Self {
            dead_zone,
            bounds,
            tuning,
        }
    }

    pub fn dead_zone(&self) -> Rect {
        self.dead_zone
    }

    pub fn view(&self) -> Rect {
        Rect::new(
            self.dead_zone.left() - self.tuning.border_left,
            self.dead_zone.top() - self.tuning.border_top,
            self.tuning.viewport_width,
            self.tuning.viewport_height,
        )
    }

    /// Subtracted from world positions to get screen positions.
    pub fn offset(&self) -> Vec2 {
        let view = self.view();
        Vec2::new(view.left(), view.top())
    }

    pub fn follow(&mut self, target: &Rect) {
        if target.left() < self.dead_zone.left() {
            self.dead_zone.set_left(target.left());
        } else if target.right() > self.dead_zone.right() {
            self.dead_zone.set_right(target.right());
        }

        if target.top() < self.dead_zone.top() {
            self.dead_zone.set_top(target.top());
        } else if target.bottom() > self.dead_zone.bottom() {
            self.dead_zone.set_bottom(target.bottom());
        }

        self.clamp_to_bounds();
    }

    fn clamp_to_bounds(&mut self) {
        let view = self.view();
        let left = clamp_axis(
            view.left(),
            self.bounds.left(),
            self.bounds.right(),
            self.tuning.viewport_width,
        );
        let top = clamp_axis(
            view.top(),
            self.bounds.top(),
            self.bounds.bottom(),
            self.tuning.viewport_height,
        );
        self.dead_zone.set_left(left + self.tuning.border_left);
        self.dead_zone.set_top(top + self.tuning.border_top);
    }
}

/// A level shorter than the viewport on this axis pins the view to its start.
fn clamp_axis(start: f32, min: f32, max: f32, extent: f32) -> f32 {
    let last = max - extent;
    if last <= min {
        return min;
    }
    start.clamp(min, last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::tuning::{VIEWPORT_HEIGHT, VIEWPORT_WIDTH};

    fn level(width_tiles: f32, height_tiles: f32) -> Rect {
        Rect::new(0.0, 0.0, width_tiles * 64.0, height_tiles * 64.0)
    }

    fn target_at(x: f32, y: f32) -> Rect {
        Rect::new(x, y, 50.0, 64.0)
    }

    #[test]
    fn target_inside_dead_zone_does_not_move_view() {
        let mut camera = Camera::new(level(60.0, 20.0), CameraTuning::default());
        camera.follow(&target_at(450.0, 200.0));
        assert_eq!(camera.offset(), Vec2::ZERO);
    }

    #[test]
    fn crossing_right_border_drags_view() {
        let mut camera = Camera::new(level(60.0, 20.0), CameraTuning::default());
        let zone_right = camera.dead_zone().right();
        camera.follow(&target_at(zone_right - 50.0 + 10.0, 200.0));
        assert_eq!(camera.offset().x, 10.0);
        assert_eq!(camera.dead_zone().right(), zone_right + 10.0);
    }

    #[test]
    fn view_never_leaves_level_bounds() {
        let bounds = level(60.0, 20.0);
        let mut camera = Camera::new(bounds, CameraTuning::default());
        let mut x = 0.0;
        while x <= bounds.right() - 50.0 {
            let mut y = 0.0;
            while y <= bounds.bottom() - 64.0 {
                camera.follow(&target_at(x, y));
                let view = camera.view();
                assert!(bounds.contains_rect(&view), "x={x} y={y} view={view:?}");
                y += 97.0;
            }
            x += 113.0;
        }
    }

    #[test]
    fn small_level_pins_view_to_origin() {
        let bounds = level(10.0, 5.0);
        let mut camera = Camera::new(bounds, CameraTuning::default());
        camera.follow(&target_at(600.0, 250.0));
        assert_eq!(camera.offset(), Vec2::ZERO);
        assert_eq!(camera.view().width, VIEWPORT_WIDTH);
        assert_eq!(camera.view().height, VIEWPORT_HEIGHT);
    }

    #[test]
    fn jumping_to_far_edge_clamps_immediately() {
        let bounds = level(60.0, 20.0);
        let mut camera = Camera::new(bounds, CameraTuning::default());
        camera.follow(&target_at(bounds.right() - 50.0, bounds.bottom() - 64.0));
        let view = camera.view();
        assert_eq!(view.right(), bounds.right());
        assert_eq!(view.bottom(), bounds.bottom());
    }
}
