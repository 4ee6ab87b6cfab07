use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::ImageReader;
use pixels::{Error, Pixels, SurfaceTexture};
use tracing::warn;
use winit::window::Window;

use crate::sprite_keys::validate_sprite_key;
use crate::world::{Rect, SpriteFrame, Vec2, VIEWPORT_HEIGHT, VIEWPORT_WIDTH};

use super::draw_list::{DrawCommand, DrawList, DrawSpace, DrawVisual, Rgba};

/// Size of the pixel buffer; `pixels` scales it to the window surface.
pub const LOGICAL_WIDTH: u32 = VIEWPORT_WIDTH as u32;
pub const LOGICAL_HEIGHT: u32 = VIEWPORT_HEIGHT as u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScreenRectPx {
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
}

impl ScreenRectPx {
    fn is_visible(&self, width: u32, height: u32) -> bool {
        self.right > 0 && self.bottom > 0 && self.left < width as i32 && self.top < height as i32
    }
}

struct LoadedSprite {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

pub struct Renderer {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    window_size: (u32, u32),
    asset_root: PathBuf,
    sprite_cache: HashMap<String, Option<LoadedSprite>>,
    warned_missing_sprite_keys: HashSet<String>,
}

impl Renderer {
    pub fn new(window: Arc<Window>, asset_root: PathBuf) -> Result<Self, Error> {
        let size = window.inner_size();
        let pixels = Self::build_pixels(Arc::clone(&window), size.width, size.height)?;
        Ok(Self {
            window,
            pixels,
            window_size: (size.width, size.height),
            asset_root,
            sprite_cache: HashMap::new(),
            warned_missing_sprite_keys: HashSet::new(),
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels = Self::build_pixels(Arc::clone(&self.window), width, height)?;
        self.window_size = (width, height);
        Ok(())
    }

    fn build_pixels(
        window: Arc<Window>,
        width: u32,
        height: u32,
    ) -> Result<Pixels<'static>, Error> {
        let surface = SurfaceTexture::new(width.max(1), height.max(1), window);
        Pixels::new(LOGICAL_WIDTH, LOGICAL_HEIGHT, surface)
    }

    pub(crate) fn render_list(&mut self, list: &DrawList) -> Result<(), Error> {
        if self.window_size.0 == 0 || self.window_size.1 == 0 {
            return Ok(());
        }

        let asset_root = self.asset_root.as_path();
        let sprite_cache = &mut self.sprite_cache;
        let warned = &mut self.warned_missing_sprite_keys;
        let frame = self.pixels.frame_mut();

        let clear_color = list.clear_color();
        for chunk in frame.chunks_exact_mut(4) {
            chunk.copy_from_slice(&clear_color);
        }

        for command in list.commands() {
            let rect = screen_rect_for(command, list.camera_offset());
            if !rect.is_visible(LOGICAL_WIDTH, LOGICAL_HEIGHT) {
                continue;
            }
            match &command.visual {
                DrawVisual::Sprite { frame: sprite_frame, fallback } => {
                    let sprite =
                        resolve_frame_sprite(sprite_cache, warned, asset_root, sprite_frame);
                    match sprite {
                        Some(sprite) => draw_sprite_anchored(
                            frame,
                            LOGICAL_WIDTH,
                            LOGICAL_HEIGHT,
                            rect,
                            sprite,
                            command.opacity,
                            command.flip_x,
                        ),
                        None => fill_rect_blended(
                            frame,
                            LOGICAL_WIDTH,
                            LOGICAL_HEIGHT,
                            rect,
                            *fallback,
                            command.opacity,
                        ),
                    }
                }
                DrawVisual::Fill(color) => fill_rect_blended(
                    frame,
                    LOGICAL_WIDTH,
                    LOGICAL_HEIGHT,
                    rect,
                    *color,
                    command.opacity,
                ),
            }
        }

        for outline in list.outlines() {
            let rect = world_rect_to_screen(outline.rect, list.camera_offset());
            draw_rect_outline(frame, LOGICAL_WIDTH, rect, outline.color);
        }

        self.pixels.render()
    }
}

fn screen_rect_for(command: &DrawCommand, camera_offset: Vec2) -> ScreenRectPx {
    match command.space {
        DrawSpace::World => world_rect_to_screen(command.rect, camera_offset),
        DrawSpace::Screen => world_rect_to_screen(command.rect, Vec2::ZERO),
    }
}

fn world_rect_to_screen(rect: Rect, camera_offset: Vec2) -> ScreenRectPx {
    let left = (rect.left() - camera_offset.x).round() as i32;
    let top = (rect.top() - camera_offset.y).round() as i32;
    ScreenRectPx {
        left,
        top,
        right: left + rect.width.round() as i32,
        bottom: top + rect.height.round() as i32,
    }
}

/// Animated sprites live at `<key>/<frame>.png`; single images at `<key>.png`.
fn sprite_candidate_keys(frame: &SpriteFrame) -> [String; 2] {
    [format!("{}/{}", frame.key, frame.frame), frame.key.clone()]
}

fn resolve_frame_sprite<'a>(
    cache: &'a mut HashMap<String, Option<LoadedSprite>>,
    warned_missing_sprite_keys: &mut HashSet<String>,
    asset_root: &Path,
    frame: &SpriteFrame,
) -> Option<&'a LoadedSprite> {
    let [animated, single] = sprite_candidate_keys(frame);
    load_into_cache(cache, warned_missing_sprite_keys, asset_root, &animated, false);
    if cache.get(&animated).is_some_and(Option::is_some) {
        return cache.get(&animated).and_then(Option::as_ref);
    }
    load_into_cache(cache, warned_missing_sprite_keys, asset_root, &single, true);
    cache.get(&single).and_then(Option::as_ref)
}

fn load_into_cache(
    cache: &mut HashMap<String, Option<LoadedSprite>>,
    warned_missing_sprite_keys: &mut HashSet<String>,
    asset_root: &Path,
    key: &str,
    warn_on_missing: bool,
) {
    if cache.contains_key(key) {
        return;
    }
    let sprite = match resolve_sprite_image_path(asset_root, key) {
        Ok(path) => match load_sprite_rgba(&path) {
            Ok(sprite) => Some(sprite),
            Err(reason) => {
                if warn_on_missing {
                    warn_sprite_load_once(
                        warned_missing_sprite_keys,
                        key,
                        Some(path.as_path()),
                        reason.as_str(),
                    );
                }
                None
            }
        },
        Err(reason) => {
            if warn_on_missing {
                warn_sprite_load_once(warned_missing_sprite_keys, key, None, reason.as_str());
            }
            None
        }
    };
    cache.insert(key.to_string(), sprite);
}

fn resolve_sprite_image_path(asset_root: &Path, key: &str) -> Result<PathBuf, String> {
    validate_sprite_key(key).map_err(|error| format!("invalid_key:{error}"))?;
    Ok(asset_root
        .join("base")
        .join("sprites")
        .join(format!("{key}.png")))
}

fn load_sprite_rgba(path: &Path) -> Result<LoadedSprite, String> {
    let reader = ImageReader::open(path).map_err(|error| format!("file_open_failed:{error}"))?;
    let decoded = reader
        .decode()
        .map_err(|error| format!("decode_failed:{error}"))?;
    let image = decoded.to_rgba8();
    Ok(LoadedSprite {
        width: image.width(),
        height: image.height(),
        rgba: image.into_raw(),
    })
}

fn warn_sprite_load_once(
    warned_keys: &mut HashSet<String>,
    key: &str,
    resolved_path: Option<&Path>,
    reason: &str,
) {
    if !warned_keys.insert(key.to_string()) {
        return;
    }
    let path_display = resolved_path
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<unresolved>".to_string());
    warn!(
        sprite_key = key,
        path = %path_display,
        reason = reason,
        "renderer_sprite_load_failed_using_placeholder"
    );
}

fn blend_channel(src: u8, dst: u8, alpha: u32) -> u8 {
    ((src as u32 * alpha + dst as u32 * (255 - alpha)) / 255) as u8
}

fn blend_pixel_clipped(frame: &mut [u8], width: usize, x: i32, y: i32, color: Rgba, opacity: u8) {
    if x < 0 || y < 0 || x as usize >= width {
        return;
    }
    let Some(pixel_offset) = (y as usize)
        .checked_mul(width)
        .and_then(|row| row.checked_add(x as usize))
    else {
        return;
    };
    let Some(byte_offset) = pixel_offset.checked_mul(4) else {
        return;
    };
    let Some(end) = byte_offset.checked_add(4) else {
        return;
    };
    if end > frame.len() {
        return;
    }
    let alpha = color[3] as u32 * opacity as u32 / 255;
    if alpha == 0 {
        return;
    }
    let dst = &mut frame[byte_offset..end];
    if alpha == 255 {
        dst.copy_from_slice(&color);
        return;
    }
    for channel in 0..3 {
        dst[channel] = blend_channel(color[channel], dst[channel], alpha);
    }
    dst[3] = 255;
}

fn fill_rect_blended(
    frame: &mut [u8],
    width: u32,
    height: u32,
    rect: ScreenRectPx,
    color: Rgba,
    opacity: u8,
) {
    for y in rect.top.max(0)..rect.bottom.min(height as i32) {
        for x in rect.left.max(0)..rect.right.min(width as i32) {
            blend_pixel_clipped(frame, width as usize, x, y, color, opacity);
        }
    }
}

fn draw_rect_outline(frame: &mut [u8], width: u32, rect: ScreenRectPx, color: Rgba) {
    let right = rect.right - 1;
    let bottom = rect.bottom - 1;
    for x in rect.left..=right {
        blend_pixel_clipped(frame, width as usize, x, rect.top, color, u8::MAX);
        blend_pixel_clipped(frame, width as usize, x, bottom, color, u8::MAX);
    }
    for y in rect.top..=bottom {
        blend_pixel_clipped(frame, width as usize, rect.left, y, color, u8::MAX);
        blend_pixel_clipped(frame, width as usize, right, y, color, u8::MAX);
    }
}

/// Native-size blit, centred horizontally on the rect and resting on its
/// bottom edge, so sprites larger than their hitbox overhang upward.
fn draw_sprite_anchored(
    frame: &mut [u8],
    width: u32,
    height: u32,
    rect: ScreenRectPx,
    sprite: &LoadedSprite,
    opacity: u8,
    flip_x: bool,
) {
    if sprite.width == 0 || sprite.height == 0 || width == 0 || height == 0 {
        return;
    }
    let expected_rgba_len = sprite.width as usize * sprite.height as usize * 4;
    if sprite.rgba.len() < expected_rgba_len {
        return;
    }

    let center_x = (rect.left + rect.right) / 2;
    let left = center_x - sprite.width as i32 / 2;
    let top = rect.bottom - sprite.height as i32;
    let sprite_width = sprite.width as usize;

    for dy in 0..sprite.height as i32 {
        let out_y = top + dy;
        if out_y < 0 || out_y >= height as i32 {
            continue;
        }
        let src_row_offset = dy as usize * sprite_width * 4;
        for dx in 0..sprite.width as i32 {
            let out_x = left + dx;
            if out_x < 0 || out_x >= width as i32 {
                continue;
            }
            let src_x = if flip_x {
                sprite_width - 1 - dx as usize
            } else {
                dx as usize
            };
            let src_offset = src_row_offset + src_x * 4;
            let color = [
                sprite.rgba[src_offset],
                sprite.rgba[src_offset + 1],
                sprite.rgba[src_offset + 2],
                sprite.rgba[src_offset + 3],
            ];
            blend_pixel_clipped(frame, width as usize, out_x, out_y, color, opacity);
        }
    }
}
