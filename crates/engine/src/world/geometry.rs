/// World space is y-down with one unit per source pixel; a tile spans
/// `TILE_SIZE` units on both axes.
pub const TILE_SIZE: f32 = 64.0;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned box. Edge setters move the box without resizing it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_midbottom(midbottom: Vec2, width: f32, height: f32) -> Self {
        Self::new(
            midbottom.x - width * 0.5,
            midbottom.y - height,
            width,
            height,
        )
    }

    pub fn from_center(center: Vec2, width: f32, height: f32) -> Self {
        Self::new(
            center.x - width * 0.5,
            center.y - height * 0.5,
            width,
            height,
        )
    }

    pub fn left(&self) -> f32 {
        self.x
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn top(&self) -> f32 {
        self.y
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    pub fn midbottom(&self) -> Vec2 {
        Vec2::new(self.x + self.width * 0.5, self.bottom())
    }

    pub fn set_left(&mut self, left: f32) {
        self.x = left;
    }

    pub fn set_right(&mut self, right: f32) {
        self.x = right - self.width;
    }

    pub fn set_top(&mut self, top: f32) {
        self.y = top;
    }

    pub fn set_bottom(&mut self, bottom: f32) {
        self.y = bottom - self.height;
    }

    pub fn translate(&mut self, dx: f32, dy: f32) {
        self.x += dx;
        self.y += dy;
    }

    /// Strict overlap: rectangles that only share an edge do not overlap.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.left() < other.right()
            && other.left() < self.right()
            && self.top() < other.bottom()
            && other.top() < self.bottom()
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.left() >= self.left()
            && other.right() <= self.right()
            && other.top() >= self.top()
            && other.bottom() <= self.bottom()
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0.0
            && self.height > 0.0
            && self.x.is_finite()
            && self.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
    }
}

/// Overlap depths used by the contact tie-breaks. Each value is the distance
/// one edge would have to travel to separate the boxes along that side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Penetration {
    /// `mover.right - other.left`
    pub from_left: f32,
    /// `other.right - mover.left`
    pub from_right: f32,
    /// `mover.bottom - other.top`
    pub from_top: f32,
    /// `other.bottom - mover.top`
    pub from_bottom: f32,
}

impl Penetration {
    pub fn between(mover: &Rect, other: &Rect) -> Self {
        Self {
            from_left: (mover.right() - other.left()).abs(),
            from_right: (other.right() - mover.left()).abs(),
            from_top: (mover.bottom() - other.top()).abs(),
            from_bottom: (other.bottom() - mover.top()).abs(),
        }
    }

    pub fn vertical_min(&self) -> f32 {
        self.from_top.min(self.from_bottom)
    }
}
