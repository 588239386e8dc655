//! Encoded image bytes with the source timestamp they were produced from.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::{BufMut, Bytes, BytesMut};

/// Magic prefix of a persisted artifact.
const DISK_MAGIC: &[u8; 4] = b"TNA1";

/// Header size: magic + u64 seconds + u32 nanoseconds.
const DISK_HEADER_LEN: usize = 4 + 8 + 4;

/// Immutable bundle of encoded image bytes.
///
/// An artifact records the modification time of the source it was rendered
/// from. It is never patched: when the source changes a new artifact replaces
/// it wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    bytes: Bytes,
    last_modified: SystemTime,
    cache_hit: bool,
}

impl Artifact {
    /// Create a freshly produced (not cached) artifact.
    pub fn new(bytes: impl Into<Bytes>, last_modified: SystemTime) -> Self {
        Self {
            bytes: bytes.into(),
            last_modified,
            cache_hit: false,
        }
    }

    /// The encoded image bytes.
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Modification time of the source when this artifact was produced.
    pub fn last_modified(&self) -> SystemTime {
        self.last_modified
    }

    /// Whether this artifact was served from a cache region.
    pub fn cache_hit(&self) -> bool {
        self.cache_hit
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Copy of this artifact with the cache-hit flag set to `hit`.
    ///
    /// Cloning only bumps the reference count of the payload.
    pub fn with_cache_hit(&self, hit: bool) -> Self {
        Self {
            bytes: self.bytes.clone(),
            last_modified: self.last_modified,
            cache_hit: hit,
        }
    }

    /// Returns `true` if a source modified at `source_mtime` is newer than
    /// the source this artifact was rendered from.
    pub fn is_stale(&self, source_mtime: SystemTime) -> bool {
        source_mtime > self.last_modified
    }

    /// Serialize for the disk layer.
    pub fn to_disk_bytes(&self) -> Bytes {
        let since_epoch = self
            .last_modified
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);

        let mut buf = BytesMut::with_capacity(DISK_HEADER_LEN + self.bytes.len());
        buf.put_slice(DISK_MAGIC);
        buf.put_u64_le(since_epoch.as_secs());
        buf.put_u32_le(since_epoch.subsec_nanos());
        buf.put_slice(&self.bytes);
        buf.freeze()
    }

    /// Decode an artifact previously written by [`Artifact::to_disk_bytes`].
    pub fn from_disk_bytes(data: Bytes) -> Result<Self, String> {
        if data.len() < DISK_HEADER_LEN {
            return Err(format!(
                "entry too short: {} bytes, header needs {}",
                data.len(),
                DISK_HEADER_LEN
            ));
        }
        if &data[..4] != DISK_MAGIC {
            return Err("bad magic".to_string());
        }

        let mut secs = [0u8; 8];
        secs.copy_from_slice(&data[4..12]);
        let mut nanos = [0u8; 4];
        nanos.copy_from_slice(&data[12..16]);

        let nanos = u32::from_le_bytes(nanos);
        if nanos >= 1_000_000_000 {
            return Err(format!("invalid nanoseconds field: {}", nanos));
        }

        let last_modified = UNIX_EPOCH + Duration::new(u64::from_le_bytes(secs), nanos);
        Ok(Self::new(data.slice(DISK_HEADER_LEN..), last_modified))
    }
}
