//! Theme colours and the procedurally drawn tray icon.

#[cfg(any(target_os = "windows", target_os = "macos"))]
use anyhow::{Result, anyhow};
#[cfg(any(target_os = "windows", target_os = "macos"))]
use tray_icon::Icon;

pub const ICON_SIZE: i32 = 22;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn from_dark(dark: bool) -> Self {
        if dark { Theme::Dark } else { Theme::Light }
    }

    pub fn is_dark(self) -> bool {
        self == Theme::Dark
    }

    pub fn toggled(self) -> Self {
        Theme::from_dark(!self.is_dark())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Palette {
    /// Glyph colour while the helper is alive.
    pub live: (u8, u8, u8),
    /// Glyph colour while it is not.
    pub idle: (u8, u8, u8),
    pub backdrop: (u8, u8, u8),
}

pub fn palette(theme: Theme) -> Palette {
    match theme {
        Theme::Light => Palette {
            live: (20, 150, 70),
            idle: (90, 90, 90),
            backdrop: (240, 240, 240),
        },
        Theme::Dark => Palette {
            live: (60, 210, 120),
            idle: (170, 170, 170),
            backdrop: (40, 40, 44),
        },
    }
}

/// RGBA pixels of a power glyph: a ring open at the top with a bar through it.
/// A live helper also gets a filled backdrop disc.
pub fn icon_pixels(theme: Theme, live: bool) -> Vec<u8> {
    let size = ICON_SIZE;
    let mut pixels = vec![0u8; (size * size * 4) as usize];
    let colors = palette(theme);
    let glyph = if live { colors.live } else { colors.idle };

    let mut draw_pixel = |x: i32, y: i32, (r, g, b): (u8, u8, u8), alpha: u8| {
        if x >= 0 && x < size && y >= 0 && y < size {
            let idx = ((y * size + x) * 4) as usize;
            pixels[idx] = r;
            pixels[idx + 1] = g;
            pixels[idx + 2] = b;
            pixels[idx + 3] = alpha;
        }
    };

    let center = size / 2;

    if live {
        for dy in -9..=9 {
            for dx in -9..=9 {
                if dx * dx + dy * dy <= 81 {
                    draw_pixel(center + dx, center + dy, colors.backdrop, 200);
                }
            }
        }
    }

    // Ring, leaving a gap around 12 o'clock for the bar
    for angle in 0..360 {
        if (240..=300).contains(&angle) {
            continue;
        }
        let rad = (angle as f32).to_radians();
        for radius in [6.5f32, 7.0] {
            let x = center + (radius * rad.cos()).round() as i32;
            let y = center + (radius * rad.sin()).round() as i32;
            draw_pixel(x, y, glyph, 255);
        }
    }

    for y in 3..=center {
        draw_pixel(center, y, glyph, 255);
        draw_pixel(center - 1, y, glyph, 255);
    }

    pixels
}

#[cfg(any(target_os = "windows", target_os = "macos"))]
pub fn create_icon(theme: Theme, live: bool) -> Result<Icon> {
    Icon::from_rgba(
        icon_pixels(theme, live),
        ICON_SIZE as u32,
        ICON_SIZE as u32,
    )
    .map_err(|err| anyhow!("failed to build icon: {err}"))
}
