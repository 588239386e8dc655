//! Folder montages for group targets.
//!
//! Member thumbnails are laid out on a grid over a folder backdrop:
//!
//! ```text
//!  left_margin
//!  |<->|
//!  +----------------------------------+  -
//!  | tab |                            |  | top_margin
//!  |     +------+   +------+          |  -
//!  |     | tile |<->| tile |          |
//!  |     +------+ m +------+          |
//!  |        ^ margin                  |
//!  |     +------+   +------+          |
//!  |     | tile |   | tile |          |
//!  +----------------------------------+
//! ```
//!
//! Each tile is centred horizontally and bottom-aligned in its slot. A
//! member that cannot be read or decoded leaves its slot empty.

use bytes::Bytes;
use image::{imageops, DynamicImage};
use tracing::{debug, warn};

use super::pipeline::RenderPipeline;
use super::placeholder::folder_backdrop;
use crate::error::RenderError;
use crate::target::{PictureRef, Size};

/// Geometry of a group montage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MontageLayout {
    /// Size of the folder backdrop
    pub canvas: Size,

    /// Bounding box of one member thumbnail
    pub tile: Size,

    /// Gap between tiles
    pub margin: u32,

    /// Space left of the first column
    pub left_margin: u32,

    /// Space above the first row (the folder tab)
    pub top_margin: u32,
}

impl Default for MontageLayout {
    fn default() -> Self {
        Self {
            canvas: Size::new(350, 300),
            tile: Size::new(100, 75),
            margin: 10,
            left_margin: 15,
            top_margin: 65,
        }
    }
}

impl MontageLayout {
    /// Layout with the default tile geometry on a `canvas`-sized backdrop.
    pub fn with_canvas(canvas: Size) -> Self {
        Self {
            canvas,
            ..Self::default()
        }
    }

    pub fn columns(&self) -> u32 {
        self.canvas.width.saturating_sub(self.left_margin) / (self.tile.width + self.margin).max(1)
    }

    pub fn rows(&self) -> u32 {
        self.canvas.height.saturating_sub(self.top_margin) / (self.tile.height + self.margin).max(1)
    }

    /// Maximum number of member thumbnails a montage embeds.
    pub fn capacity(&self) -> usize {
        (self.columns() * self.rows()) as usize
    }

    /// Top-left corner of slot `index`.
    pub fn slot_origin(&self, index: usize) -> (u32, u32) {
        let columns = self.columns().max(1) as usize;
        let column = (index % columns) as u32;
        let row = (index / columns) as u32;
        (
            self.left_margin + column * (self.tile.width + self.margin),
            self.top_margin + row * (self.tile.height + self.margin),
        )
    }
}

/// One member of a montage with its source bytes, if they could be read.
#[derive(Debug, Clone)]
pub struct MontageMember {
    pub picture: PictureRef,
    pub source: Option<Bytes>,
}

/// An encoded montage.
#[derive(Debug, Clone)]
pub struct Montage {
    pub bytes: Bytes,

    /// Number of member thumbnails actually drawn
    pub embedded: usize,
}

/// Render the montage of `members` (at most `layout.capacity()` of them).
pub fn compose_montage(
    pipeline: &dyn RenderPipeline,
    layout: &MontageLayout,
    members: &[MontageMember],
) -> Result<Montage, RenderError> {
    let mut canvas = folder_backdrop(layout.canvas);
    let mut embedded = 0;

    for (index, member) in members.iter().take(layout.capacity()).enumerate() {
        let path = member.picture.path();
        let Some(source) = member.source.as_ref() else {
            debug!("Skipping unreadable montage member {}", path.display());
            continue;
        };
        if !pipeline.can_decode(path) {
            debug!("Skipping montage member without decoder {}", path.display());
            continue;
        }

        let tile = match pipeline.render_image(source, path, member.picture.rotation, layout.tile) {
            Ok(tile) => tile,
            Err(e) => {
                warn!("Skipping montage member: {}", e);
                continue;
            }
        };

        let (x, y) = tile_position(layout, index, &tile);
        imageops::overlay(&mut canvas, &tile.to_rgb8(), x, y);
        embedded += 1;
    }

    let bytes = pipeline.encode(&DynamicImage::ImageRgb8(canvas))?;
    Ok(Montage { bytes, embedded })
}

fn tile_position(layout: &MontageLayout, index: usize, tile: &DynamicImage) -> (i64, i64) {
    let (slot_x, slot_y) = layout.slot_origin(index);
    let x = slot_x as i64 + (layout.tile.width as i64 - tile.width() as i64) / 2;
    let y = slot_y as i64 + (layout.tile.height as i64 - tile.height() as i64);
    (x, y)
}
