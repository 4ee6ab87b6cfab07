use crate::world::{Rect, SpriteFrame, Vec2};

pub type Rgba = [u8; 4];

/// Whether a command is positioned in level coordinates (shifted by the
/// camera) or directly in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawSpace {
    World,
    Screen,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawVisual {
    /// Resolved by the renderer; `fallback` is filled when the image is
    /// missing.
    Sprite { frame: SpriteFrame, fallback: Rgba },
    Fill(Rgba),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawCommand {
    pub rect: Rect,
    pub space: DrawSpace,
    pub visual: DrawVisual,
    pub opacity: u8,
    pub flip_x: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Outline {
    pub rect: Rect,
    pub color: Rgba,
}

/// One frame of drawing, built by the active scene and consumed by the
/// renderer. Commands are painted in push order.
#[derive(Debug, Clone, Default)]
pub struct DrawList {
    clear_color: Rgba,
    camera_offset: Vec2,
    outlines_enabled: bool,
    commands: Vec<DrawCommand>,
    outlines: Vec<Outline>,
}

impl DrawList {
    pub fn new(outlines_enabled: bool) -> Self {
        Self {
            clear_color: [0, 0, 0, 0xff],
            outlines_enabled,
            ..Self::default()
        }
    }

    /// Drops last frame's commands; the outline flag survives.
    pub fn clear(&mut self) {
        self.clear_color = [0, 0, 0, 0xff];
        self.camera_offset = Vec2::ZERO;
        self.commands.clear();
        self.outlines.clear();
    }

    pub fn set_clear_color(&mut self, color: Rgba) {
        self.clear_color = color;
    }

    pub fn clear_color(&self) -> Rgba {
        self.clear_color
    }

    pub fn set_camera_offset(&mut self, offset: Vec2) {
        self.camera_offset = offset;
    }

    pub fn camera_offset(&self) -> Vec2 {
        self.camera_offset
    }

    pub fn outlines_enabled(&self) -> bool {
        self.outlines_enabled
    }

    pub fn push(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }

    pub fn sprite(&mut self, rect: Rect, frame: SpriteFrame, fallback: Rgba) {
        self.push(DrawCommand {
            rect,
            space: DrawSpace::World,
            visual: DrawVisual::Sprite { frame, fallback },
            opacity: u8::MAX,
            flip_x: false,
        });
    }

    pub fn fill_screen(&mut self, rect: Rect, color: Rgba) {
        self.push(DrawCommand {
            rect,
            space: DrawSpace::Screen,
            visual: DrawVisual::Fill(color),
            opacity: u8::MAX,
            flip_x: false,
        });
    }

    /// Ignored unless outlines were enabled for this list.
    pub fn outline(&mut self, rect: Rect, color: Rgba) {
        if self.outlines_enabled {
            self.outlines.push(Outline { rect, color });
        }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn outlines(&self) -> &[Outline] {
        &self.outlines
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
