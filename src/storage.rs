mod filesystem;
mod state;
mod traits;

pub use filesystem::FilesystemStore;
pub use state::RevisionEntries;
pub use traits::RevisionStore;
