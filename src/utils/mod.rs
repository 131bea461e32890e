//! Shared utility functions.
//!
//! - `mime`: media kind classification from URL extensions
//! - `text`: whitespace normalisation and bounded truncation

mod mime;
mod text;

pub use mime::{
    has_media_extension, media_kind_for_url, mime_for_url, url_extension, MediaKind,
    MEDIA_EXTENSIONS,
};
pub use text::{file_name_from_url, normalize_whitespace, truncate_chars};
