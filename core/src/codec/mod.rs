//! Image decoding primitives and helpers.

pub mod image;

pub use self::image::{DecodedImage, decode_thumbnail};

pub type Result<T> = crate::Result<T>;
