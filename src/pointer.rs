// fluid_cursor - GPU Fluid Cursor Effect
// Copyright (c) 2025 Filipe da Veiga Ventura Alves
// Licensed under MIT License

//! Per-contact interaction state. The tracker records motion; splatting is
//! left to the frame loop.

use crate::color::Rgb;

/// Contact id used for the mouse.
pub const MOUSE_ID: i64 = -1;

#[derive(Debug, Clone, PartialEq)]
pub struct Pointer {
    pub id: i64,
    /// Normalised position, origin bottom-left.
    pub texcoord_x: f32,
    pub texcoord_y: f32,
    pub prev_texcoord_x: f32,
    pub prev_texcoord_y: f32,
    /// Aspect-corrected motion since the previous event.
    pub delta_x: f32,
    pub delta_y: f32,
    pub down: bool,
    /// Set by a move with nonzero delta, cleared when the motion is consumed.
    pub moved: bool,
    pub color: Rgb,
}

impl Pointer {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            texcoord_x: 0.0,
            texcoord_y: 0.0,
            prev_texcoord_x: 0.0,
            prev_texcoord_y: 0.0,
            delta_x: 0.0,
            delta_y: 0.0,
            down: false,
            moved: false,
            color: Rgb::BLACK,
        }
    }

    /// Contact start at pixel `(x, y)` on a `width` x `height` surface.
    pub fn on_down(&mut self, x: f32, y: f32, width: u32, height: u32, color: Rgb) {
        let (tx, ty) = normalize(x, y, width, height);
        self.down = true;
        self.moved = false;
        self.texcoord_x = tx;
        self.texcoord_y = ty;
        self.prev_texcoord_x = tx;
        self.prev_texcoord_y = ty;
        self.delta_x = 0.0;
        self.delta_y = 0.0;
        self.color = color;
    }

    pub fn on_move(&mut self, x: f32, y: f32, width: u32, height: u32, color: Rgb) {
        let (tx, ty) = normalize(x, y, width, height);
        let aspect = aspect_ratio(width, height);
        self.prev_texcoord_x = self.texcoord_x;
        self.prev_texcoord_y = self.texcoord_y;
        self.texcoord_x = tx;
        self.texcoord_y = ty;
        self.delta_x = correct_delta_x(tx - self.prev_texcoord_x, aspect);
        self.delta_y = correct_delta_y(ty - self.prev_texcoord_y, aspect);
        self.moved = self.delta_x.abs() > 0.0 || self.delta_y.abs() > 0.0;
        self.color = color;
    }

    pub fn on_up(&mut self) {
        self.down = false;
    }
}

pub fn aspect_ratio(width: u32, height: u32) -> f32 {
    width.max(1) as f32 / height.max(1) as f32
}

fn normalize(x: f32, y: f32, width: u32, height: u32) -> (f32, f32) {
    (x / width.max(1) as f32, 1.0 - y / height.max(1) as f32)
}

fn correct_delta_x(delta: f32, aspect: f32) -> f32 {
    if aspect < 1.0 {
        delta * aspect
    } else {
        delta
    }
}

fn correct_delta_y(delta: f32, aspect: f32) -> f32 {
    if aspect > 1.0 {
        delta / aspect
    } else {
        delta
    }
}

/// All contacts seen this session, created on first use.
#[derive(Debug)]
pub struct PointerTracker {
    pointers: Vec<Pointer>,
}

impl Default for PointerTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PointerTracker {
    pub fn new() -> Self {
        Self {
            pointers: vec![Pointer::new(MOUSE_ID)],
        }
    }

    pub fn get(&self, id: i64) -> Option<&Pointer> {
        self.pointers.iter().find(|p| p.id == id)
    }

    pub fn get_or_create(&mut self, id: i64) -> &mut Pointer {
        let index = match self.pointers.iter().position(|p| p.id == id) {
            Some(index) => index,
            None => {
                self.pointers.push(Pointer::new(id));
                self.pointers.len() - 1
            }
        };
        &mut self.pointers[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pointer> {
        self.pointers.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Pointer> {
        self.pointers.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.pointers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pointers.is_empty()
    }
}
