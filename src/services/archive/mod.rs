//! Pack decoding: raw zip bytes in, ordered `(path, payload)` entries out.

mod decode;
mod types;

// Re-export public API
pub use decode::{decode_archive, decode_archive_async};
pub use types::RawEntry;

#[cfg(test)]
#[path = "tests/decode_tests.rs"]
mod tests;
