use std::time::Duration;

use super::diagnostics::TickDiagnostics;
use super::input::{ActionStates, InputAction};
use super::rendering::DrawList;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SceneKey {
    Overworld,
    Level,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneCommand {
    None,
    SwitchTo(SceneKey),
    /// Unloads and reloads the target even if it is already loaded.
    HardResetTo(SceneKey),
    Quit,
}

/// Input for exactly one simulation tick. `pressed` holds edges that were
/// seen since the previous tick; `down` holds the current key state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputSnapshot {
    quit_requested: bool,
    down: ActionStates,
    pressed: ActionStates,
    window_width: u32,
    window_height: u32,
}

impl InputSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn new(
        quit_requested: bool,
        down: ActionStates,
        pressed: ActionStates,
        window_width: u32,
        window_height: u32,
    ) -> Self {
        Self {
            quit_requested,
            down,
            pressed,
            window_width,
            window_height,
        }
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.down.is_down(action)
    }

    pub fn just_pressed(&self, action: InputAction) -> bool {
        self.pressed.is_down(action)
    }

    pub fn with_action_down(mut self, action: InputAction, is_down: bool) -> Self {
        self.down.set(action, is_down);
        self
    }

    /// Marks a press edge; also marks the action as held.
    pub fn with_action_pressed(mut self, action: InputAction, pressed: bool) -> Self {
        self.pressed.set(action, pressed);
        if pressed {
            self.down.set(action, true);
        }
        self
    }

    pub fn with_window_size(mut self, window_size: (u32, u32)) -> Self {
        self.window_width = window_size.0;
        self.window_height = window_size.1;
        self
    }

    pub fn window_size(&self) -> (u32, u32) {
        (self.window_width, self.window_height)
    }
}

/// A screen of the game. Scenes own their state; the loop only hands them
/// input, a diagnostics context, and a draw list.
pub trait Scene {
    fn load(&mut self);
    fn update(
        &mut self,
        fixed_dt: Duration,
        input: &InputSnapshot,
        diagnostics: &mut TickDiagnostics,
    ) -> SceneCommand;
    fn render(&mut self, list: &mut DrawList, diagnostics: &mut TickDiagnostics);
    fn unload(&mut self);
    fn debug_title(&self) -> Option<String> {
        None
    }
}

struct SceneRuntime {
    scene: Box<dyn Scene>,
    is_loaded: bool,
}

impl SceneRuntime {
    fn new(scene: Box<dyn Scene>) -> Self {
        Self {
            scene,
            is_loaded: false,
        }
    }
}

pub(crate) struct SceneMachine {
    overworld: SceneRuntime,
    level: SceneRuntime,
    active_scene: SceneKey,
}

impl SceneMachine {
    pub(crate) fn new(
        overworld: Box<dyn Scene>,
        level: Box<dyn Scene>,
        active_scene: SceneKey,
    ) -> Self {
        Self {
            overworld: SceneRuntime::new(overworld),
            level: SceneRuntime::new(level),
            active_scene,
        }
    }

    pub(crate) fn active_scene(&self) -> SceneKey {
        self.active_scene
    }

    pub(crate) fn load_active(&mut self) {
        self.load_scene_if_needed(self.active_scene);
    }

    pub(crate) fn update_active(
        &mut self,
        fixed_dt: Duration,
        input: &InputSnapshot,
        diagnostics: &mut TickDiagnostics,
    ) -> SceneCommand {
        self.active_runtime_mut()
            .scene
            .update(fixed_dt, input, diagnostics)
    }

    pub(crate) fn render_active(&mut self, list: &mut DrawList, diagnostics: &mut TickDiagnostics) {
        self.active_runtime_mut().scene.render(list, diagnostics);
    }

    pub(crate) fn debug_title_active(&self) -> Option<String> {
        self.active_runtime_ref().scene.debug_title()
    }

    /// Applies a command returned by `update_active`. Returns true when the
    /// active scene changed or was reloaded.
    pub(crate) fn apply(&mut self, command: SceneCommand) -> bool {
        match command {
            SceneCommand::None | SceneCommand::Quit => false,
            SceneCommand::SwitchTo(key) => self.switch_to(key),
            SceneCommand::HardResetTo(key) => {
                self.hard_reset_to(key);
                true
            }
        }
    }

    pub(crate) fn switch_to(&mut self, next_scene: SceneKey) -> bool {
        if self.active_scene == next_scene {
            return false;
        }

        self.load_scene_if_needed(next_scene);
        self.active_scene = next_scene;
        true
    }

    pub(crate) fn hard_reset_to(&mut self, next_scene: SceneKey) -> bool {
        let runtime = self.runtime_mut(next_scene);
        if runtime.is_loaded {
            runtime.scene.unload();
        }
        runtime.scene.load();
        runtime.is_loaded = true;
        let changed = self.active_scene != next_scene;
        self.active_scene = next_scene;
        changed
    }

    pub(crate) fn shutdown_all(&mut self) {
        for runtime in [&mut self.overworld, &mut self.level] {
            if runtime.is_loaded {
                runtime.scene.unload();
                runtime.is_loaded = false;
            }
        }
    }

    fn load_scene_if_needed(&mut self, key: SceneKey) {
        let runtime = self.runtime_mut(key);
        if runtime.is_loaded {
            return;
        }
        runtime.scene.load();
        runtime.is_loaded = true;
    }

    fn active_runtime_mut(&mut self) -> &mut SceneRuntime {
        self.runtime_mut(self.active_scene)
    }

    fn active_runtime_ref(&self) -> &SceneRuntime {
        self.runtime_ref(self.active_scene)
    }

    fn runtime_mut(&mut self, key: SceneKey) -> &mut SceneRuntime {
        match key {
            SceneKey::Overworld => &mut self.overworld,
            SceneKey::Level => &mut self.level,
        }
    }

    fn runtime_ref(&self, key: SceneKey) -> &SceneRuntime {
        match key {
            SceneKey::Overworld => &self.overworld,
            SceneKey::Level => &self.level,
        }
    }
}
