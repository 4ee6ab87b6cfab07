use std::time::Duration;

use cove_engine::world::{Rect, SpriteFrame, Vec2};
use cove_engine::{
    DrawCommand, DrawList, DrawSpace, DrawVisual, InputAction, InputSnapshot, Rgba, Scene,
    SceneCommand, SceneKey, TickDiagnostics,
};
use tracing::info;

use super::SharedState;

pub(super) const INPUT_GRACE: Duration = Duration::from_millis(500);
/// Marker travel per tick; it snaps once closer than this.
const MARKER_SPEED: f32 = 5.0;
const NODE_SIZE: f32 = 96.0;
const MARKER_SIZE: f32 = 40.0;
const PATH_DOT_SIZE: f32 = 6.0;
const PATH_DOT_SPACING: f32 = 14.0;

const SKY_COLOR: Rgba = [92, 148, 196, 255];
const PATH_COLOR: Rgba = [236, 226, 200, 255];
const LOCKED_COLOR: Rgba = [70, 70, 84, 255];
const AVAILABLE_COLOR: Rgba = [214, 168, 58, 255];
const COMPLETED_COLOR: Rgba = [96, 170, 92, 255];
const MARKER_COLOR: Rgba = [170, 40, 40, 255];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum NodeStatus {
    Locked,
    Available,
    Completed,
}

impl NodeStatus {
    fn color(self) -> Rgba {
        match self {
            NodeStatus::Locked => LOCKED_COLOR,
            NodeStatus::Available => AVAILABLE_COLOR,
            NodeStatus::Completed => COMPLETED_COLOR,
        }
    }
}

/// Level select. Walks a marker between unlocked nodes; Confirm starts the
/// level under the marker once it has stopped.
pub(crate) struct OverworldScene {
    state: SharedState,
    grace_left: Duration,
    marker: Vec2,
    destination: Vec2,
}

impl OverworldScene {
    pub(crate) fn new(state: SharedState) -> Self {
        Self {
            state,
            grace_left: INPUT_GRACE,
            marker: Vec2::ZERO,
            destination: Vec2::ZERO,
        }
    }

    pub(super) fn marker(&self) -> Vec2 {
        self.marker
    }

    pub(super) fn marker_moving(&self) -> bool {
        self.marker != self.destination
    }

    pub(super) fn node_status(&self, level: u32) -> NodeStatus {
        let state = self.state.borrow();
        if !state.progress().is_unlocked(level) {
            NodeStatus::Locked
        } else if level < state.current_level() {
            NodeStatus::Completed
        } else {
            NodeStatus::Available
        }
    }

    fn node_pos(&self, level: u32) -> Option<Vec2> {
        self.state.borrow().defs().level(level).map(|def| def.node)
    }

    fn step_marker(&mut self) {
        let dx = self.destination.x - self.marker.x;
        let dy = self.destination.y - self.marker.y;
        let distance = (dx * dx + dy * dy).sqrt();
        if distance <= MARKER_SPEED {
            self.marker = self.destination;
            return;
        }
        let scale = MARKER_SPEED / distance;
        self.marker = Vec2::new(self.marker.x + dx * scale, self.marker.y + dy * scale);
    }

    fn try_move(&mut self, level: u32) {
        if !self.state.borrow_mut().select_level(level) {
            return;
        }
        if let Some(destination) = self.node_pos(level) {
            self.destination = destination;
            info!(level_id = level, "overworld_marker_moved");
        }
    }

    fn sprite_command(rect: Rect, key: &str, frame: u32, fallback: Rgba) -> DrawCommand {
        DrawCommand {
            rect,
            space: DrawSpace::Screen,
            visual: DrawVisual::Sprite {
                frame: SpriteFrame {
                    key: key.to_string(),
                    frame,
                },
                fallback,
            },
            opacity: u8::MAX,
            flip_x: false,
        }
    }
}

impl Scene for OverworldScene {
    fn load(&mut self) {
        self.grace_left = INPUT_GRACE;
        let (marker_level, current_level, max_level) = {
            let state = self.state.borrow();
            (
                state.marker_level(),
                state.current_level(),
                state.progress().max_level,
            )
        };
        let destination = self.node_pos(current_level).unwrap_or(Vec2::ZERO);
        self.marker = self.node_pos(marker_level).unwrap_or(destination);
        self.destination = destination;
        info!(current_level, max_level, "overworld_ready");
    }

    fn update(
        &mut self,
        fixed_dt: Duration,
        input: &InputSnapshot,
        _diagnostics: &mut TickDiagnostics,
    ) -> SceneCommand {
        self.step_marker();

        if !self.grace_left.is_zero() {
            self.grace_left = self.grace_left.saturating_sub(fixed_dt);
            return SceneCommand::None;
        }
        if input.just_pressed(InputAction::Cancel) {
            return SceneCommand::Quit;
        }
        if self.marker_moving() {
            return SceneCommand::None;
        }

        let current_level = self.state.borrow().current_level();
        if input.is_down(InputAction::MoveRight) {
            self.try_move(current_level + 1);
        } else if input.is_down(InputAction::MoveLeft) {
            if let Some(previous) = current_level.checked_sub(1) {
                self.try_move(previous);
            }
        } else if input.just_pressed(InputAction::Confirm) {
            self.state.borrow_mut().mark_departure();
            info!(level_id = current_level, "level_selected");
            return SceneCommand::HardResetTo(SceneKey::Level);
        }
        SceneCommand::None
    }

    fn render(&mut self, list: &mut DrawList, diagnostics: &mut TickDiagnostics) {
        let before = list.len();
        list.set_clear_color(SKY_COLOR);
        list.set_camera_offset(Vec2::ZERO);

        let nodes = {
            let state = self.state.borrow();
            state
                .defs()
                .levels()
                .iter()
                .map(|def| (def.id, def.node))
                .collect::<Vec<_>>()
        };

        let open_points = nodes
            .iter()
            .filter(|(level, _)| self.node_status(*level) != NodeStatus::Locked)
            .map(|(_, pos)| *pos)
            .collect::<Vec<_>>();
        for pair in open_points.windows(2) {
            draw_path_dots(list, pair[0], pair[1]);
        }

        for (level, pos) in &nodes {
            let status = self.node_status(*level);
            let rect = Rect::from_center(*pos, NODE_SIZE, NODE_SIZE);
            let mut command = Self::sprite_command(
                rect,
                "overworld/node",
                level.saturating_sub(1),
                status.color(),
            );
            if status == NodeStatus::Locked {
                command.opacity = 110;
            }
            list.push(command);
        }

        let marker_rect = Rect::from_center(self.marker, MARKER_SIZE, MARKER_SIZE);
        list.push(Self::sprite_command(
            marker_rect,
            "overworld/hat",
            0,
            MARKER_COLOR,
        ));

        diagnostics.draw_commands += (list.len() - before) as u32;
    }

    fn unload(&mut self) {
        self.grace_left = INPUT_GRACE;
    }

    fn debug_title(&self) -> Option<String> {
        let state = self.state.borrow();
        let level = state.current_level();
        let best = state
            .progress()
            .levels
            .get(&level)
            .map_or(0, |record| record.score);
        Some(format!(
            "Skull Cove | Level {level} | best {best} | total {}",
            state.progress().total_score()
        ))
    }
}

fn draw_path_dots(list: &mut DrawList, from: Vec2, to: Vec2) {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let length = (dx * dx + dy * dy).sqrt();
    let steps = (length / PATH_DOT_SPACING).floor() as u32;
    for step in 0..=steps {
        let t = if steps == 0 {
            0.0
        } else {
            step as f32 / steps as f32
        };
        let center = Vec2::new(from.x + dx * t, from.y + dy * t);
        list.fill_screen(
            Rect::from_center(center, PATH_DOT_SIZE, PATH_DOT_SIZE),
            PATH_COLOR,
        );
    }
}
