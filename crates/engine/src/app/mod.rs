mod diagnostics;
mod input;
mod loop_runner;
mod rendering;
mod scene;

pub use diagnostics::{LoopMetricsSnapshot, TickDiagnostics};
pub use input::InputAction;
pub use loop_runner::{run_app, AppError, LoopConfig, DEBUG_OUTLINES_ENV_VAR};
pub use rendering::{
    DrawCommand, DrawList, DrawSpace, DrawVisual, Outline, Renderer, Rgba, LOGICAL_HEIGHT,
    LOGICAL_WIDTH,
};
pub use scene::{InputSnapshot, Scene, SceneCommand, SceneKey};
