use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use glam::{Vec2, Vec4};

use crate::assets::{FontHandle, TextureHandle};
use crate::config::WindowConfig;

pub const WHITE: Vec4 = Vec4::new(1.0, 1.0, 1.0, 1.0);
pub const BLACK: Vec4 = Vec4::new(0.0, 0.0, 0.0, 1.0);

/// One recorded draw. The embedding application drains the frame's commands
/// after `render` and replays them against its actual backend.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear { color: Vec4 },
    Text { font: FontHandle, text: String, position: Vec2, color: Vec4 },
    Sprite { texture: TextureHandle, position: Vec2, scale: f32, rotation: f32, tint: Vec4 },
}

#[derive(Debug)]
struct SurfaceState {
    width: u32,
    height: u32,
    frame: Vec<DrawCommand>,
}

/// Recording render target shared between the host, the sprite batch, and
/// the script namespace. Clones are handles onto one surface.
#[derive(Debug, Clone)]
pub struct SurfaceHandle {
    state: Arc<Mutex<SurfaceState>>,
}

impl SurfaceHandle {
    pub fn new(width: u32, height: u32) -> Self {
        Self { state: Arc::new(Mutex::new(SurfaceState { width, height, frame: Vec::new() })) }
    }

    pub fn size(&self) -> (u32, u32) {
        let state = self.lock();
        (state.width, state.height)
    }

    pub fn clear(&self, color: Vec4) {
        self.lock().frame.push(DrawCommand::Clear { color });
    }

    pub(crate) fn push(&self, command: DrawCommand) {
        self.lock().frame.push(command);
    }

    /// Drains and returns everything drawn since the last call.
    pub fn take_frame(&self) -> Vec<DrawCommand> {
        mem::take(&mut self.lock().frame)
    }

    pub fn frame_len(&self) -> usize {
        self.lock().frame.len()
    }

    fn lock(&self) -> MutexGuard<'_, SurfaceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug)]
struct GraphicsState {
    title: String,
    width: u32,
    height: u32,
    vsync: bool,
}

/// Window/presentation knobs. Values are recorded, not applied; window
/// management belongs to the embedding application.
#[derive(Debug, Clone)]
pub struct GraphicsHandle {
    state: Arc<Mutex<GraphicsState>>,
}

impl GraphicsHandle {
    pub fn new(config: &WindowConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(GraphicsState {
                title: config.title.clone(),
                width: config.width,
                height: config.height,
                vsync: config.vsync,
            })),
        }
    }

    pub fn title(&self) -> String {
        self.lock().title.clone()
    }

    pub fn set_title(&self, title: &str) {
        self.lock().title = title.to_string();
    }

    pub fn size(&self) -> (u32, u32) {
        let state = self.lock();
        (state.width, state.height)
    }

    pub fn resize(&self, width: u32, height: u32) {
        let mut state = self.lock();
        state.width = width;
        state.height = height;
    }

    pub fn vsync(&self) -> bool {
        self.lock().vsync
    }

    pub fn set_vsync(&self, on: bool) {
        self.lock().vsync = on;
    }

    fn lock(&self) -> MutexGuard<'_, GraphicsState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Sprite/text drawing context over a surface.
#[derive(Debug, Clone)]
pub struct SpriteBatch {
    surface: SurfaceHandle,
}

impl SpriteBatch {
    pub fn new(surface: SurfaceHandle) -> Self {
        Self { surface }
    }

    pub fn draw_text(&self, font: FontHandle, text: &str, position: Vec2, color: Vec4) {
        self.surface.push(DrawCommand::Text { font, text: text.to_string(), position, color });
    }

    pub fn draw_sprite(
        &self,
        texture: TextureHandle,
        position: Vec2,
        scale: f32,
        rotation: f32,
        tint: Vec4,
    ) {
        self.surface.push(DrawCommand::Sprite { texture, position, scale, rotation, tint });
    }
}
