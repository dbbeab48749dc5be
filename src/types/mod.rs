pub mod errors;

pub use errors::{AssetError, AssetResult};
