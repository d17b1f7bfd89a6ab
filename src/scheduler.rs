// fluid_cursor - GPU Fluid Cursor Effect
// Copyright (c) 2025 Filipe da Veiga Ventura Alves
// Licensed under MIT License

use std::time::Instant;

/// Upper bound on a single step, roughly one frame at 60 Hz.
pub const MAX_DELTA_TIME: f32 = 0.016666;

/// Frame timing and the color-cycle timer.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last_update: Instant,
    color_timer: f32,
}

impl FrameClock {
    pub fn new(now: Instant) -> Self {
        Self {
            last_update: now,
            color_timer: 0.0,
        }
    }

    /// Seconds since the previous call, clamped to [`MAX_DELTA_TIME`].
    pub fn delta_time(&mut self, now: Instant) -> f32 {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f32();
        self.last_update = now;
        elapsed.min(MAX_DELTA_TIME)
    }

    /// Advances the color timer. Returns true when it wrapped, meaning every
    /// pointer should receive a fresh color.
    pub fn advance_color_timer(&mut self, dt: f32, speed: f32) -> bool {
        self.color_timer += dt * speed;
        if self.color_timer >= 1.0 {
            self.color_timer = wrap(self.color_timer, 0.0, 1.0);
            true
        } else {
            false
        }
    }

    pub fn color_timer(&self) -> f32 {
        self.color_timer
    }
}

/// Wraps `value` into `[min, max)`.
pub fn wrap(value: f32, min: f32, max: f32) -> f32 {
    let range = max - min;
    if range == 0.0 {
        return min;
    }
    (value - min).rem_euclid(range) + min
}
