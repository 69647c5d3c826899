//! Profile lookup for default display names and avatars.

mod directory;

pub use directory::InMemoryProfileDirectory;
