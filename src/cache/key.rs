//! Cache keys for both regions.
//!
//! Key strings are persisted by the disk layer, so their format is part of
//! the on-disk contract:
//!
//! - thumbnail: `{path}-{rotation:.6}deg-w:{width}px-h:{height}px`
//! - highres: `{path}`
//! - group: `Group-` followed by `{path}-{rotation:.6}deg-` per member
//!
//! `{path}` is the raw path with backslashes doubled and any byte that is
//! not valid UTF-8 written as `\xNN`, so distinct paths never share a key.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::target::{normalized_rotation, PictureRef, Size};

/// Prefix of composite (group montage) keys.
pub const GROUP_KEY_PREFIX: &str = "Group-";

/// Identifies a renderable target within a cache region.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(Arc<str>);

impl CacheKey {
    /// Key of a rendered thumbnail.
    pub fn thumbnail(path: &Path, rotation: f64, size: Size) -> Self {
        Self::from(format!(
            "{}-{}deg-w:{}px-h:{}px",
            encode_path(path),
            format_rotation(rotation),
            size.width,
            size.height
        ))
    }

    /// Key of a raw source file in the highres region.
    pub fn highres(path: &Path) -> Self {
        Self::from(encode_path(path))
    }

    /// Key of a group montage built from `members`, in iteration order.
    pub fn group<'a, I>(members: I) -> Self
    where
        I: IntoIterator<Item = &'a PictureRef>,
    {
        let mut key = String::from(GROUP_KEY_PREFIX);
        for member in members {
            key.push_str(&format!(
                "{}-{}deg-",
                encode_path(&member.path),
                format_rotation(member.rotation)
            ));
        }
        Self::from(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for composite group keys.
    pub fn is_group(&self) -> bool {
        self.0.starts_with(GROUP_KEY_PREFIX)
    }
}

impl From<String> for CacheKey {
    fn from(value: String) -> Self {
        Self(value.into())
    }
}

impl From<&str> for CacheKey {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rotation with six decimals; negative zero is folded into zero.
fn format_rotation(rotation: f64) -> String {
    format!("{:.6}", normalized_rotation(rotation))
}

/// Lossless text form of `path`.
fn encode_path(path: &Path) -> String {
    let mut bytes = path.as_os_str().as_encoded_bytes();
    let mut out = String::with_capacity(bytes.len());

    loop {
        match std::str::from_utf8(bytes) {
            Ok(text) => {
                push_escaped(&mut out, text);
                return out;
            }
            Err(e) => {
                let (valid, rest) = bytes.split_at(e.valid_up_to());
                push_escaped(&mut out, &String::from_utf8_lossy(valid));
                let Some((&invalid, tail)) = rest.split_first() else {
                    return out;
                };
                out.push_str(&format!("\\x{:02x}", invalid));
                bytes = tail;
            }
        }
    }
}

fn push_escaped(out: &mut String, text: &str) {
    for c in text.chars() {
        if c == '\\' {
            out.push_str("\\\\");
        } else {
            out.push(c);
        }
    }
}
