//! Rendering layer.
//!
//! Everything that touches pixels lives here; the rest of the crate only
//! moves encoded bytes around.
//!
//! # Components
//!
//! - [`RenderPipeline`]: decode, rotate, scale and encode one picture
//! - [`ImagePipeline`]: the default pipeline on the `image` crate
//! - [`compose_montage`]: lays member thumbnails over a folder backdrop
//! - [`placeholder`]: broken / movie / document icons

mod montage;
mod pipeline;
pub mod placeholder;

pub use montage::{compose_montage, Montage, MontageLayout, MontageMember};
pub use pipeline::{
    clamp_quality, fit_within, quarter_turns, rotate, ImagePipeline, RenderPipeline, ScaleQuality,
    DEFAULT_JPEG_QUALITY, MAX_JPEG_QUALITY, MIN_JPEG_QUALITY,
};
