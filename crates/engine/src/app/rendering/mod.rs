mod draw_list;
mod renderer;

pub use draw_list::{DrawCommand, DrawList, DrawSpace, DrawVisual, Outline, Rgba};
pub use renderer::{Renderer, LOGICAL_HEIGHT, LOGICAL_WIDTH};
