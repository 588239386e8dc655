//! Render targets.
//!
//! Collaborators describe what should be rendered with a closed set of
//! variants, resolved once when the request is built.

use std::fmt;
use std::path::{Path, PathBuf};

/// A width/height box in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Square box of `edge` pixels.
    pub const fn square(edge: u32) -> Self {
        Self::new(edge, edge)
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A single picture: source file plus the rotation to apply, in degrees.
///
/// Equality compares rotations by value after folding `-0.0` into `0.0` and
/// every NaN into one, so equal pictures are always equal to themselves.
#[derive(Debug, Clone)]
pub struct PictureRef {
    pub path: PathBuf,
    pub rotation: f64,
}

impl PictureRef {
    pub fn new(path: impl Into<PathBuf>, rotation: f64) -> Self {
        Self {
            path: path.into(),
            rotation,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PartialEq for PictureRef {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
            && normalized_rotation(self.rotation).to_bits()
                == normalized_rotation(other.rotation).to_bits()
    }
}

impl Eq for PictureRef {}

/// `rotation` with `-0.0` folded into `0.0` and NaN made canonical.
pub(crate) fn normalized_rotation(rotation: f64) -> f64 {
    if rotation.is_nan() {
        f64::NAN
    } else if rotation == 0.0 {
        0.0
    } else {
        rotation
    }
}

/// What a render request produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderTarget {
    /// A thumbnail of one picture
    Picture(PictureRef),

    /// A folder montage built from the member pictures, in order
    Group(Vec<PictureRef>),

    /// Anything the renderer cannot handle; always resolves to the broken icon
    Unsupported,
}

impl RenderTarget {
    pub fn picture(path: impl Into<PathBuf>, rotation: f64) -> Self {
        RenderTarget::Picture(PictureRef::new(path, rotation))
    }

    pub fn group(members: impl IntoIterator<Item = PictureRef>) -> Self {
        RenderTarget::Group(members.into_iter().collect())
    }

    /// Short label for log lines.
    pub fn describe(&self) -> String {
        match self {
            RenderTarget::Picture(picture) => picture.path.display().to_string(),
            RenderTarget::Group(members) => format!("group of {} picture(s)", members.len()),
            RenderTarget::Unsupported => "unsupported target".to_string(),
        }
    }
}
