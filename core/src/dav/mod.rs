//! DAV folder adapter: transport interface, blocking request plumbing, and the folder model.

pub mod file;
pub mod folder;
mod pending;
pub mod transport;
mod util;

pub use file::DavFile;
pub use folder::{FolderEvent, RemoteFolder};
pub use transport::{Completer, Completion, DavTransport, ListingEvent, ListingSink, RemoteStream};
pub use util::{basename, mime_type_icon, normalize_path};

/// Shared result type for DAV operations.
pub type Result<T> = std::result::Result<T, crate::error::DavError>;
