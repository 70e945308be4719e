use minifb::{Key, Scale, Window, WindowOptions};

use crate::display::{FrameBuffer, HEIGHT, WIDTH};

const FG_COLOR: u32 = 0x1976D2;
const BG_COLOR: u32 = 0x212121;

/// The host window: shows framebuffer snapshots and reports held keys.
pub struct Screen {
    pixel_buffer: Vec<u32>,
    window: Window,
}

impl Screen {
    pub fn new(scale: Scale) -> Result<Self, minifb::Error> {
        let mut window = Window::new(
            "chip8vm - ESC to exit",
            WIDTH,
            HEIGHT,
            WindowOptions {
                scale,
                ..WindowOptions::default()
            },
        )?;
        // pacing is done by the run loop
        window.limit_update_rate(None);
        Ok(Self {
            pixel_buffer: vec![BG_COLOR; WIDTH * HEIGHT],
            window,
        })
    }

    pub fn is_open(&self) -> bool {
        self.window.is_open() && !self.window.is_key_down(Key::Escape)
    }

    pub fn held_keys(&self) -> Vec<Key> {
        self.window.get_keys()
    }

    pub fn present(&mut self, fb: &FrameBuffer) -> Result<(), minifb::Error> {
        to_pixels(fb, &mut self.pixel_buffer);
        self.window
            .update_with_buffer(&self.pixel_buffer, WIDTH, HEIGHT)
    }

    pub fn refresh(&mut self) {
        self.window.update();
    }
}

fn to_pixels(fb: &FrameBuffer, pixels: &mut [u32]) {
    for (pixel, &on) in pixels.iter_mut().zip(fb.cells()) {
        *pixel = if on { FG_COLOR } else { BG_COLOR };
    }
}

pub fn scale_from_factor(factor: u8) -> Option<Scale> {
    match factor {
        1 => Some(Scale::X1),
        2 => Some(Scale::X2),
        4 => Some(Scale::X4),
        8 => Some(Scale::X8),
        16 => Some(Scale::X16),
        32 => Some(Scale::X32),
        _ => None,
    }
}
