mod cache;
mod source;
mod watcher;

pub use cache::CodeCache;
pub use source::{FileSource, RemoteSource};
pub use watcher::ConfigFileWatcher;
