//! Axis-separated rectangle resolution. Every function resolves at most one
//! contact per call: the first qualifying rectangle in iteration order wins.

use crate::app::TickDiagnostics;

use super::geometry::{Penetration, Rect};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WallSide {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HorizontalHit {
    pub side: WallSide,
    /// Edge coordinate the mover was snapped to.
    pub snap_x: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerticalContact {
    Ground,
    Ceiling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatrolContact {
    None,
    Reversed,
}

/// Horizontal pass, run on the pre-gravity position. A moving-right mover
/// snaps its right edge to the solid's left edge when it is not moving
/// vertically, or when the horizontal depth is smaller than both vertical
/// depths; corner clips that are mostly vertical are left to the vertical
/// pass. Mirrored for moving left.
pub fn resolve_horizontal<'a>(
    mover: &mut Rect,
    velocity_x: f32,
    velocity_y: f32,
    solids: impl IntoIterator<Item = &'a Rect>,
    diagnostics: &mut TickDiagnostics,
) -> Option<HorizontalHit> {
    if velocity_x == 0.0 {
        return None;
    }

    for solid in solids {
        diagnostics.solids_tested += 1;
        if !solid.overlaps(mover) {
            continue;
        }
        let depth = Penetration::between(mover, solid);
        if velocity_x > 0.0 {
            if velocity_y == 0.0 || depth.from_left < depth.vertical_min() {
                mover.set_right(solid.left());
                diagnostics.collision_responses += 1;
                return Some(HorizontalHit {
                    side: WallSide::Right,
                    snap_x: mover.right(),
                });
            }
        } else if velocity_y == 0.0 || depth.from_right < depth.vertical_min() {
            mover.set_left(solid.right());
            diagnostics.collision_responses += 1;
            return Some(HorizontalHit {
                side: WallSide::Left,
                snap_x: mover.left(),
            });
        }
    }
    None
}

/// Vertical pass, run after gravity moved the mover. The caller zeroes the
/// vertical velocity when a contact is returned.
pub fn resolve_vertical<'a>(
    mover: &mut Rect,
    velocity_y: f32,
    solids: impl IntoIterator<Item = &'a Rect>,
    diagnostics: &mut TickDiagnostics,
) -> Option<VerticalContact> {
    if velocity_y == 0.0 {
        return None;
    }

    for solid in solids {
        diagnostics.solids_tested += 1;
        if !solid.overlaps(mover) {
            continue;
        }
        diagnostics.collision_responses += 1;
        if velocity_y > 0.0 {
            mover.set_bottom(solid.top());
            return Some(VerticalContact::Ground);
        }
        mover.set_top(solid.bottom());
        return Some(VerticalContact::Ceiling);
    }
    None
}

/// Patrol pass for enemies: on overlap, snap to the constraint edge on the
/// side of travel. There is no vertical component.
pub fn resolve_patrol(mover: &mut Rect, direction: f32, constraints: &[Rect]) -> PatrolContact {
    for constraint in constraints {
        if !constraint.overlaps(mover) {
            continue;
        }
        if direction > 0.0 {
            mover.set_right(constraint.left());
        } else {
            mover.set_left(constraint.right());
        }
        return PatrolContact::Reversed;
    }
    PatrolContact::None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player_at(x: f32, y: f32) -> Rect {
        Rect::new(x, y, 50.0, 64.0)
    }

    #[test]
    fn flat_run_into_wall_snaps_right_edge() {
        let wall = Rect::new(50.0, 0.0, 64.0, 64.0);
        let mut mover = player_at(6.0, 0.0);
        let mut diagnostics = TickDiagnostics::default();

        let hit = resolve_horizontal(&mut mover, 6.0, 0.0, [&wall], &mut diagnostics)
            .expect("hit");
        assert_eq!(hit.side, WallSide::Right);
        assert_eq!(mover.right(), 50.0);
        assert_eq!(hit.snap_x, 50.0);
        assert_eq!(mover.top(), 0.0);
        assert_eq!(diagnostics.collision_responses, 1);
    }

    #[test]
    fn shallow_vertical_corner_clip_is_left_to_vertical_pass() {
        // Falling onto the corner of a tile: 4 units into its top, 20 into its side.
        let tile = Rect::new(100.0, 100.0, 64.0, 64.0);
        let mut mover = Rect::new(70.0, 40.0, 50.0, 64.0);
        let mut diagnostics = TickDiagnostics::default();

        let hit = resolve_horizontal(&mut mover, 6.0, 3.0, [&tile], &mut diagnostics);
        assert!(hit.is_none());
        assert_eq!(mover.left(), 70.0);

        let contact = resolve_vertical(&mut mover, 3.0, [&tile], &mut diagnostics);
        assert_eq!(contact, Some(VerticalContact::Ground));
        assert_eq!(mover.bottom(), 100.0);
        assert_eq!(mover.left(), 70.0);
    }

    #[test]
    fn deep_side_contact_while_airborne_still_snaps() {
        let wall = Rect::new(100.0, 0.0, 64.0, 256.0);
        let mut mover = Rect::new(54.0, 80.0, 50.0, 64.0);
        let mut diagnostics = TickDiagnostics::default();

        let hit = resolve_horizontal(&mut mover, 6.0, 5.0, [&wall], &mut diagnostics)
            .expect("hit");
        assert_eq!(hit.side, WallSide::Right);
        assert_eq!(mover.right(), 100.0);
    }

    #[test]
    fn moving_left_snaps_left_edge() {
        let wall = Rect::new(0.0, 0.0, 64.0, 64.0);
        let mut mover = player_at(60.0, 0.0);
        let mut diagnostics = TickDiagnostics::default();

        let hit = resolve_horizontal(&mut mover, -6.0, 0.0, [&wall], &mut diagnostics)
            .expect("hit");
        assert_eq!(hit.side, WallSide::Left);
        assert_eq!(mover.left(), 64.0);
    }

    #[test]
    fn only_first_qualifying_solid_responds() {
        let first = Rect::new(40.0, 0.0, 64.0, 64.0);
        let second = Rect::new(45.0, 0.0, 64.0, 64.0);
        let mut mover = player_at(0.0, 0.0);
        let mut diagnostics = TickDiagnostics::default();

        resolve_horizontal(&mut mover, 6.0, 0.0, [&first, &second], &mut diagnostics)
            .expect("hit");
        assert_eq!(mover.right(), 40.0);
        assert_eq!(diagnostics.collision_responses, 1);
        assert_eq!(diagnostics.solids_tested, 1);
    }

    #[test]
    fn rising_into_ceiling_snaps_top() {
        let ceiling = Rect::new(0.0, 0.0, 64.0, 64.0);
        let mut mover = player_at(0.0, 50.0);
        let mut diagnostics = TickDiagnostics::default();

        let contact = resolve_vertical(&mut mover, -10.0, [&ceiling], &mut diagnostics);
        assert_eq!(contact, Some(VerticalContact::Ceiling));
        assert_eq!(mover.top(), 64.0);
    }

    #[test]
    fn stationary_mover_is_untouched() {
        let solid = Rect::new(0.0, 0.0, 64.0, 64.0);
        let mut mover = player_at(10.0, 10.0);
        let mut diagnostics = TickDiagnostics::default();

        assert!(resolve_horizontal(&mut mover, 0.0, 0.0, [&solid], &mut diagnostics).is_none());
        assert!(resolve_vertical(&mut mover, 0.0, [&solid], &mut diagnostics).is_none());
        assert_eq!(mover, player_at(10.0, 10.0));
    }

    #[test]
    fn patrol_snaps_on_travel_side() {
        let constraint = Rect::new(100.0, 0.0, 64.0, 64.0);
        let mut mover = Rect::new(60.0, 24.0, 52.0, 40.0);
        assert_eq!(
            resolve_patrol(&mut mover, 1.0, &[constraint]),
            PatrolContact::Reversed
        );
        assert_eq!(mover.right(), 100.0);
        assert_eq!(resolve_patrol(&mut mover, -1.0, &[constraint]), PatrolContact::None);
    }
}
