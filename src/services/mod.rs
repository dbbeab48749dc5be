pub mod archive;
pub mod assets;
pub mod config;
pub mod mime;
pub mod operation_lock;
pub mod store;
