pub mod adapter;
pub mod entry;
pub mod notification;

// Re-export main types
pub use adapter::*;
pub use entry::*;
pub use notification::*;
