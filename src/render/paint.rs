//! Software painter producing RGBA frames

use super::layout::{LayoutTree, Rect};
use crate::style::Color;

/// A rendered frame
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Frame {
    /// Create a new, fully transparent frame
    ///
    /// `None` when the pixel buffer size does not fit in `usize`.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        let size = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(4)?;
        Some(Self {
            width,
            height,
            pixels: vec![0; size],
        })
    }

    /// Get pixel at (x, y); `None` outside the frame
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        Some([
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
            self.pixels[idx + 3],
        ])
    }

    /// Set pixel at (x, y); ignored outside the frame
    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        self.pixels[idx..idx + 4].copy_from_slice(&rgba);
    }

    /// Fill a rectangle, clipped to the frame
    pub fn fill_rect(&mut self, rect: Rect, color: Color) {
        let x_start = rect.x.max(0.0) as u32;
        let y_start = rect.y.max(0.0) as u32;
        let x_end = ((rect.x + rect.width).max(0.0) as u32).min(self.width);
        let y_end = ((rect.y + rect.height).max(0.0) as u32).min(self.height);
        let rgba = color.to_array();

        for y in y_start..y_end {
            for x in x_start..x_end {
                self.set_pixel(x, y, rgba);
            }
        }
    }
}

/// Painter for rendering layout boxes
pub struct Painter {
    viewport_width: u32,
    viewport_height: u32,
}

impl Painter {
    pub fn new(viewport_width: u32, viewport_height: u32) -> Self {
        Self {
            viewport_width,
            viewport_height,
        }
    }

    /// Set viewport size
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport_width = width;
        self.viewport_height = height;
    }

    /// Paint the layout tree to a frame, parents before children
    pub fn paint(&self, tree: &LayoutTree) -> Option<Frame> {
        let mut frame = Frame::new(self.viewport_width, self.viewport_height)?;
        for layout_box in tree.iter() {
            if let Some(color) = layout_box.background {
                if color.a > 0 {
                    frame.fill_rect(layout_box.dimensions.border_box(), color);
                }
            }
        }
        Some(frame)
    }
}
