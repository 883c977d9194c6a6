//! Remote file-system browser: path normalization, browser-style
//! back/forward history, listing state, and file operations delegated to
//! the privilege backend.

pub mod bookmarks;
pub mod navigator;
pub mod path;

pub use bookmarks::{Bookmark, DEFAULT_BOOKMARKS};
pub use navigator::{Listing, Navigator, LOAD_FAILED_MESSAGE, NOT_A_DIRECTORY_MESSAGE};
