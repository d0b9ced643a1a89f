//! Shared data structures exchanged between the adapters, the transports, and the host layer.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::time::SystemTime;

/// Whether a remote entry is a plain file or a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    File,
    Folder,
}

/// One remote filesystem entry produced by a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub path: String,
    pub name: String,
    pub kind: ItemKind,
    pub mime_type: String,
    pub size: u64,
    pub mtime: Option<SystemTime>,
    pub icon: String,
    pub selectable: bool,
}

/// Server-supplied description of a remote entry. An empty `href` marks the end of a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyRecord {
    pub href: String,
    pub name: String,
    pub resource_type: String,
    pub content_type: String,
    pub content_length: u64,
    pub last_modified: Option<SystemTime>,
}

impl PropertyRecord {
    /// The record that terminates a listing stream.
    pub fn end_of_listing() -> Self {
        Self::default()
    }

    pub fn is_end_of_listing(&self) -> bool {
        self.href.is_empty()
    }

    pub fn is_collection(&self) -> bool {
        self.resource_type == "collection"
    }
}

/// HTTP-style status delivered by the DAV transport when an operation completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(pub u16);

impl StatusCode {
    pub const CREATED: StatusCode = StatusCode(201);
    pub const NO_CONTENT: StatusCode = StatusCode(204);
    pub const FORBIDDEN: StatusCode = StatusCode(403);
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    pub const METHOD_NOT_ALLOWED: StatusCode = StatusCode(405);
    pub const CONFLICT: StatusCode = StatusCode(409);

    pub fn is_server_error(self) -> bool {
        (500..600).contains(&self.0)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Access mode requested when opening a remote file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
    ReadWrite,
}

impl OpenMode {
    pub fn can_read(self) -> bool {
        matches!(self, OpenMode::Read | OpenMode::ReadWrite)
    }

    pub fn can_write(self) -> bool {
        matches!(self, OpenMode::Write | OpenMode::ReadWrite)
    }
}

/// Bitmask of actions the host may offer for the current selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Capabilities(u32);

impl Capabilities {
    pub const ACCEPT_COPY: Capabilities = Capabilities(1 << 0);
    pub const CAN_COPY: Capabilities = Capabilities(1 << 1);
    pub const CAN_DELETE: Capabilities = Capabilities(1 << 2);
    pub const CAN_BOOKMARK: Capabilities = Capabilities(1 << 3);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: Capabilities) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Capabilities {
    type Output = Capabilities;

    fn bitor(self, rhs: Self) -> Self::Output {
        Capabilities(self.0 | rhs.0)
    }
}

impl BitOrAssign for Capabilities {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Unix-style permission bits reported for listed entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Permissions(u32);

impl Permissions {
    pub const READ_OWNER: Permissions = Permissions(0o400);
    pub const WRITE_OWNER: Permissions = Permissions(0o200);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: Permissions) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Permissions {
    type Output = Permissions;

    fn bitor(self, rhs: Self) -> Self::Output {
        Permissions(self.0 | rhs.0)
    }
}

/// Pixel size a thumbnail was requested at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestedSize {
    pub width: u32,
    pub height: u32,
}

impl RequestedSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Identity of a cached thumbnail: the same path fetched with another token or size is a
/// different entry.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ThumbnailKey {
    pub access_token: String,
    pub path: String,
    pub size: RequestedSize,
}

impl ThumbnailKey {
    pub fn new(access_token: impl Into<String>, path: impl Into<String>, size: RequestedSize) -> Self {
        Self { access_token: access_token.into(), path: path.into(), size }
    }
}

// Tokens end up in log lines through `{:?}`, so keep them out of the debug output.
impl fmt::Debug for ThumbnailKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThumbnailKey")
            .field("path", &self.path)
            .field("size", &format_args!("{}x{}", self.size.width, self.size.height))
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheBudget {
    pub bytes_max: usize,
}

impl CacheBudget {
    pub fn unbounded() -> Self {
        Self { bytes_max: usize::MAX }
    }
}

impl Default for CacheBudget {
    fn default() -> Self {
        Self::unbounded()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

/// Token identifying an in-flight asynchronous request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    pub(crate) fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_masks_combine() {
        let caps = Capabilities::ACCEPT_COPY | Capabilities::CAN_DELETE;
        assert!(caps.contains(Capabilities::ACCEPT_COPY));
        assert!(caps.contains(Capabilities::CAN_DELETE));
        assert!(!caps.contains(Capabilities::CAN_BOOKMARK));
        assert_eq!(caps.bits(), 0b101);
    }

    #[test]
    fn thumbnail_key_debug_hides_token() {
        let key = ThumbnailKey::new("secret-token", "/photos/a.jpg", RequestedSize::new(64, 64));
        let rendered = format!("{key:?}");
        assert!(rendered.contains("/photos/a.jpg"));
        assert!(rendered.contains("64x64"));
        assert!(!rendered.contains("secret-token"));
    }

    #[test]
    fn thumbnail_keys_differ_by_size() {
        let small = ThumbnailKey::new("t", "/a.png", RequestedSize::new(32, 32));
        let large = ThumbnailKey::new("t", "/a.png", RequestedSize::new(128, 128));
        assert_ne!(small, large);
    }

    #[test]
    fn end_of_listing_is_empty_href() {
        assert!(PropertyRecord::end_of_listing().is_end_of_listing());
        let record = PropertyRecord { href: "/a".into(), ..Default::default() };
        assert!(!record.is_end_of_listing());
    }
}
