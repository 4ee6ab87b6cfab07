use std::env;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pixels::Error as PixelsError;
use thiserror::Error;
use tracing::{info, warn};
use winit::dpi::LogicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowBuilder;

use crate::world::{VIEWPORT_HEIGHT, VIEWPORT_WIDTH};
use crate::{resolve_app_paths, StartupError};

use super::diagnostics::{MetricsAccumulator, TickDiagnostics};
use super::input::ActionStates;
use super::scene::SceneMachine;
use super::{DrawList, InputAction, InputSnapshot, Renderer, Scene, SceneCommand, SceneKey};

pub const DEBUG_OUTLINES_ENV_VAR: &str = "SKULL_COVE_DEBUG_OUTLINES";

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub window_title: String,
    pub window_width: u32,
    pub window_height: u32,
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    pub max_render_fps: Option<u32>,
    pub debug_outlines: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            window_title: "Skull Cove".to_string(),
            window_width: VIEWPORT_WIDTH as u32,
            window_height: VIEWPORT_HEIGHT as u32,
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            max_render_fps: None,
            debug_outlines: false,
        }
    }
}

impl LoopConfig {
    /// Applies `SKULL_COVE_DEBUG_OUTLINES`. Any value other than `0`, `false`
    /// or empty turns outlines on.
    pub fn with_env_overrides(mut self) -> Self {
        match env::var(DEBUG_OUTLINES_ENV_VAR) {
            Ok(value) => self.debug_outlines = parse_flag(&value),
            Err(env::VarError::NotPresent) => {}
            Err(err) => warn!(
                env_var = DEBUG_OUTLINES_ENV_VAR,
                error = %err,
                "unable to read debug outline env var; keeping config"
            ),
        }
        self
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("failed to create event loop: {0}")]
    CreateEventLoop(#[source] EventLoopError),
    #[error("failed to create application window: {0}")]
    CreateWindow(#[source] OsError),
    #[error("failed to initialize renderer: {0}")]
    CreateRenderer(#[source] PixelsError),
    #[error("event loop failed: {0}")]
    EventLoopRun(#[source] EventLoopError),
}

/// Runs the fixed-tick loop until the window closes or a scene asks to quit.
/// The overworld scene is active first.
pub fn run_app(
    config: LoopConfig,
    overworld: Box<dyn Scene>,
    level: Box<dyn Scene>,
) -> Result<(), AppError> {
    let mut scenes = SceneMachine::new(overworld, level, SceneKey::Overworld);
    let app_paths = resolve_app_paths()?;
    info!(
        root = %app_paths.root.display(),
        levels_dir = %app_paths.levels_dir.display(),
        saves_dir = %app_paths.saves_dir.display(),
        "startup"
    );

    let event_loop = EventLoop::new().map_err(AppError::CreateEventLoop)?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.window_title.clone())
            .with_inner_size(LogicalSize::new(
                config.window_width as f64,
                config.window_height as f64,
            ))
            .build(&event_loop)
            .map_err(AppError::CreateWindow)?,
    );
    let mut renderer = Renderer::new(Arc::clone(&window), app_paths.root.join("assets"))
        .map_err(AppError::CreateRenderer)?;

    event_loop.set_control_flow(ControlFlow::Poll);

    let mut step = FixedStep::new(&config);
    let mut pacer = RenderPacer::new(config.max_render_fps);
    let mut input_collector = InputCollector::new(config.window_width, config.window_height);
    let mut metrics = MetricsAccumulator::new(normalize_non_zero_duration(
        config.metrics_log_interval,
        Duration::from_secs(1),
    ));
    let mut diagnostics = TickDiagnostics::default();
    let mut draw_list = DrawList::new(config.debug_outlines);
    let mut title = WindowTitle::new(config.window_title.clone());

    scenes.load_active();
    info!(scene = ?scenes.active_scene(), "scene_loaded");
    info!(
        tick_ms = step.fixed_dt.as_secs_f64() * 1000.0,
        max_frame_delta_ms = step.max_frame_delta.as_millis() as u64,
        max_ticks_per_frame = step.max_ticks_per_frame,
        render_fps_cap = %pacer.describe(),
        debug_outlines = config.debug_outlines,
        "loop_config"
    );

    event_loop
        .run(move |event, window_target| match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => {
                    input_collector.mark_quit_requested();
                    info!(reason = "window_close", "shutdown_requested");
                    window_target.exit();
                }
                WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                    let size = window.inner_size();
                    input_collector.set_window_size(size.width, size.height);
                    if let Err(error) = renderer.resize(size.width, size.height) {
                        warn!(error = %error, "renderer_resize_failed");
                        window_target.exit();
                    }
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    input_collector.handle_keyboard_input(&event);
                    if input_collector.quit_requested {
                        info!(reason = "escape_key", "shutdown_requested");
                        window_target.exit();
                    }
                }
                WindowEvent::RedrawRequested => {
                    let now = Instant::now();
                    let (frame_dt, plan) = step.advance(now);

                    for _ in 0..plan.ticks_to_run {
                        let input = input_collector.snapshot_for_tick();
                        diagnostics.reset();
                        let command = scenes.update_active(step.fixed_dt, &input, &mut diagnostics);
                        metrics.record_tick(&diagnostics);

                        if command == SceneCommand::Quit {
                            info!(reason = "scene_quit", "shutdown_requested");
                            window_target.exit();
                            return;
                        }
                        if scenes.apply(command) {
                            info!(scene = ?scenes.active_scene(), "scene_switched");
                        }
                    }
                    if !plan.dropped_backlog.is_zero() {
                        warn!(
                            dropped_backlog_ms = plan.dropped_backlog.as_millis() as u64,
                            ticks_run = plan.ticks_to_run,
                            "sim_clamp_triggered"
                        );
                    }

                    pacer.wait();
                    draw_list.clear();
                    scenes.render_active(&mut draw_list, &mut diagnostics);
                    if let Err(error) = renderer.render_list(&draw_list) {
                        warn!(error = %error, "renderer_draw_failed");
                        window_target.exit();
                    }
                    pacer.presented();

                    if let Some(next) = title.changed(scenes.debug_title_active()) {
                        window.set_title(next);
                    }
                    metrics.record_frame(frame_dt, &diagnostics);
                    if let Some(snapshot) = metrics.maybe_snapshot(now) {
                        info!(
                            fps = snapshot.fps,
                            tps = snapshot.tps,
                            frame_time_ms = snapshot.frame_time_ms,
                            peak_collision_responses = snapshot.peak_collision_responses,
                            draw_commands = snapshot.draw_commands,
                            scene = ?scenes.active_scene(),
                            "loop_metrics"
                        );
                    }
                }
                _ => {}
            },
            Event::AboutToWait => window.request_redraw(),
            Event::LoopExiting => {
                scenes.shutdown_all();
                info!("shutdown");
            }
            _ => {}
        })
        .map_err(AppError::EventLoopRun)
}

/// Collects key state between ticks. Held state mirrors the keyboard; press
/// edges survive until the next snapshot so short taps between ticks are
/// never lost.
#[derive(Debug, Default)]
struct InputCollector {
    quit_requested: bool,
    down: ActionStates,
    pressed: ActionStates,
    window_width: u32,
    window_height: u32,
}

impl InputCollector {
    fn new(window_width: u32, window_height: u32) -> Self {
        Self {
            window_width,
            window_height,
            ..Self::default()
        }
    }

    fn mark_quit_requested(&mut self) {
        self.quit_requested = true;
    }

    fn handle_keyboard_input(&mut self, key_event: &KeyEvent) {
        let is_pressed = key_event.state == ElementState::Pressed;
        self.update_action_state_from_physical_key(key_event.physical_key, is_pressed);
    }

    fn update_action_state_from_physical_key(&mut self, key: PhysicalKey, is_pressed: bool) {
        let Some(action) = action_for_key(key) else {
            return;
        };
        if is_pressed && !self.down.is_down(action) {
            self.pressed.set(action, true);
        }
        self.down.set(action, is_pressed);
        if action == InputAction::Quit && is_pressed {
            self.mark_quit_requested();
        }
    }

    fn snapshot_for_tick(&mut self) -> InputSnapshot {
        let snapshot = InputSnapshot::new(
            self.quit_requested,
            self.down,
            self.pressed,
            self.window_width,
            self.window_height,
        );
        self.pressed.clear();
        snapshot
    }

    fn set_window_size(&mut self, width: u32, height: u32) {
        self.window_width = width;
        self.window_height = height;
    }
}

fn action_for_key(key: PhysicalKey) -> Option<InputAction> {
    let PhysicalKey::Code(code) = key else {
        return None;
    };
    match code {
        KeyCode::KeyA | KeyCode::ArrowLeft => Some(InputAction::MoveLeft),
        KeyCode::KeyD | KeyCode::ArrowRight => Some(InputAction::MoveRight),
        KeyCode::Space | KeyCode::KeyW | KeyCode::ArrowUp => Some(InputAction::Jump),
        KeyCode::Enter | KeyCode::NumpadEnter => Some(InputAction::Confirm),
        KeyCode::Backspace => Some(InputAction::Cancel),
        KeyCode::Escape => Some(InputAction::Quit),
        _ => None,
    }
}

/// Fixed-timestep accumulator. Frame time is clamped before it is banked
/// and backlog beyond the per-frame tick cap is dropped.
#[derive(Debug)]
struct FixedStep {
    fixed_dt: Duration,
    max_frame_delta: Duration,
    max_ticks_per_frame: u32,
    accumulator: Duration,
    last_frame: Option<Instant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StepPlan {
    ticks_to_run: u32,
    dropped_backlog: Duration,
}

impl FixedStep {
    fn new(config: &LoopConfig) -> Self {
        Self {
            fixed_dt: Duration::from_secs_f64(1.0 / config.target_tps.max(1) as f64),
            max_frame_delta: normalize_non_zero_duration(
                config.max_frame_delta,
                Duration::from_millis(250),
            ),
            max_ticks_per_frame: config.max_ticks_per_frame.max(1),
            accumulator: Duration::ZERO,
            last_frame: None,
        }
    }

    /// Returns the raw frame time and the ticks to run for it. The first
    /// frame banks nothing.
    fn advance(&mut self, now: Instant) -> (Duration, StepPlan) {
        let frame_dt = self
            .last_frame
            .map_or(Duration::ZERO, |last| now.saturating_duration_since(last));
        self.last_frame = Some(now);
        (frame_dt, self.bank(frame_dt))
    }

    fn bank(&mut self, frame_dt: Duration) -> StepPlan {
        self.accumulator = self
            .accumulator
            .saturating_add(frame_dt.min(self.max_frame_delta));

        let mut ticks_to_run = 0u32;
        while self.accumulator >= self.fixed_dt && ticks_to_run < self.max_ticks_per_frame {
            self.accumulator -= self.fixed_dt;
            ticks_to_run += 1;
        }
        let dropped_backlog = if self.accumulator >= self.fixed_dt {
            std::mem::take(&mut self.accumulator)
        } else {
            Duration::ZERO
        };
        StepPlan {
            ticks_to_run,
            dropped_backlog,
        }
    }
}

/// Optional render cap. Sleeping here is the only pacing in the loop.
#[derive(Debug)]
struct RenderPacer {
    frame_target: Option<Duration>,
    last_present: Instant,
}

impl RenderPacer {
    fn new(max_render_fps: Option<u32>) -> Self {
        Self {
            frame_target: max_render_fps
                .filter(|fps| *fps > 0)
                .map(|fps| Duration::from_secs_f64(1.0 / fps as f64)),
            last_present: Instant::now(),
        }
    }

    fn sleep_needed(&self, now: Instant) -> Duration {
        let elapsed = now.saturating_duration_since(self.last_present);
        self.frame_target
            .map_or(Duration::ZERO, |target| target.saturating_sub(elapsed))
    }

    fn wait(&self) {
        let sleep = self.sleep_needed(Instant::now());
        if !sleep.is_zero() {
            thread::sleep(sleep);
        }
    }

    fn presented(&mut self) {
        self.last_present = Instant::now();
    }

    fn describe(&self) -> String {
        match self.frame_target {
            Some(target) => format!("{:.0}", 1.0 / target.as_secs_f64()),
            None => "off".to_string(),
        }
    }
}

/// Falls back to the configured title when the active scene has none.
#[derive(Debug)]
struct WindowTitle {
    fallback: String,
    applied: Option<String>,
}

impl WindowTitle {
    fn new(fallback: String) -> Self {
        Self {
            fallback,
            applied: None,
        }
    }

    fn changed(&mut self, next: Option<String>) -> Option<&str> {
        if next == self.applied {
            return None;
        }
        self.applied = next;
        Some(self.applied.as_deref().unwrap_or(&self.fallback))
    }
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn parse_flag(value: &str) -> bool {
    !matches!(value.trim().to_ascii_lowercase().as_str(), "" | "0" | "false" | "off")
}
