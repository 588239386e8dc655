//! Placeholder icons and the folder backdrop.
//!
//! Icons are drawn once, encoded as PNG and shared. Their timestamp is the
//! Unix epoch, so a placeholder never looks fresher than a real source.

use std::io::Cursor;
use std::sync::OnceLock;
use std::time::UNIX_EPOCH;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use tracing::error;

use crate::cache::Artifact;
use crate::target::Size;

/// Edge of the placeholder icons in pixels.
const ICON_SIZE: Size = Size::new(120, 90);

const BROKEN_BACKGROUND: Rgb<u8> = Rgb([230, 230, 230]);
const BROKEN_MARK: Rgb<u8> = Rgb([200, 30, 30]);
const MOVIE_BACKGROUND: Rgb<u8> = Rgb([40, 40, 48]);
const MOVIE_MARK: Rgb<u8> = Rgb([245, 245, 245]);
const DOCUMENT_BACKGROUND: Rgb<u8> = Rgb([250, 250, 250]);
const DOCUMENT_MARK: Rgb<u8> = Rgb([150, 150, 160]);

/// Body colour of the folder backdrop.
pub const FOLDER_BODY: Rgb<u8> = Rgb([222, 184, 110]);

/// Tab colour of the folder backdrop.
pub const FOLDER_TAB: Rgb<u8> = Rgb([196, 152, 72]);

static BROKEN: OnceLock<Artifact> = OnceLock::new();
static MOVIE: OnceLock<Artifact> = OnceLock::new();
static DOCUMENT: OnceLock<Artifact> = OnceLock::new();

/// Shown when a picture cannot be read, decoded or rendered.
pub fn broken_icon() -> Artifact {
    BROKEN.get_or_init(|| encode_icon(draw_broken())).clone()
}

/// Shown for movie files.
pub fn movie_icon() -> Artifact {
    MOVIE.get_or_init(|| encode_icon(draw_movie())).clone()
}

/// Shown for document files.
pub fn document_icon() -> Artifact {
    DOCUMENT.get_or_init(|| encode_icon(draw_document())).clone()
}

/// A folder shape filling `canvas`; montage tiles are drawn on top of it.
pub fn folder_backdrop(canvas: Size) -> RgbImage {
    let tab_height = (canvas.height / 8).max(1);
    let tab_width = canvas.width * 2 / 5;
    RgbImage::from_fn(canvas.width, canvas.height, |x, y| {
        if y < tab_height {
            if x < tab_width {
                FOLDER_TAB
            } else {
                Rgb([255, 255, 255])
            }
        } else {
            FOLDER_BODY
        }
    })
}

fn encode_icon(image: RgbImage) -> Artifact {
    let mut output = Vec::new();
    if let Err(e) = DynamicImage::ImageRgb8(image).write_to(&mut Cursor::new(&mut output), ImageFormat::Png) {
        error!("Failed to encode placeholder icon: {}", e);
        output.clear();
    }
    Artifact::new(output, UNIX_EPOCH)
}

fn draw_broken() -> RgbImage {
    let (w, h) = (ICON_SIZE.width as i64, ICON_SIZE.height as i64);
    RgbImage::from_fn(ICON_SIZE.width, ICON_SIZE.height, |x, y| {
        let (x, y) = (x as i64, y as i64);
        // Two diagonals, three pixels thick
        let on_down = (x * h - y * w).abs() <= 2 * w;
        let on_up = (x * h - (h - 1 - y) * w).abs() <= 2 * w;
        if on_down || on_up {
            BROKEN_MARK
        } else {
            BROKEN_BACKGROUND
        }
    })
}

fn draw_movie() -> RgbImage {
    let (w, h) = (ICON_SIZE.width as i64, ICON_SIZE.height as i64);
    RgbImage::from_fn(ICON_SIZE.width, ICON_SIZE.height, |x, y| {
        let (x, y) = (x as i64, y as i64);
        // Play triangle pointing right, centred
        let left = w / 3;
        let half = h / 4;
        let dx = x - left;
        let dy = (y - h / 2).abs();
        let in_triangle = dx >= 0 && dx <= 2 * half && dy * 2 <= 2 * half - dx;
        // Film perforations along the top and bottom edges
        let perforation = (y < 8 || y >= h - 8) && (x % 12) < 6;
        if in_triangle || perforation {
            MOVIE_MARK
        } else {
            MOVIE_BACKGROUND
        }
    })
}

fn draw_document() -> RgbImage {
    RgbImage::from_fn(ICON_SIZE.width, ICON_SIZE.height, |x, y| {
        let in_margin = x < 20 || x >= ICON_SIZE.width - 20;
        let text_line = y >= 15 && y < ICON_SIZE.height - 10 && (y - 15) % 10 < 3;
        if !in_margin && text_line {
            DOCUMENT_MARK
        } else {
            DOCUMENT_BACKGROUND
        }
    })
}
