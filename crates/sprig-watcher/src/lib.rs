//! Sprig Watcher — file state machine, workspace orchestration and file watching

pub mod error;
pub mod io;
pub mod state;
pub mod watcher;
pub mod workspace;

#[cfg(test)]
pub mod test_utils;


pub use error::{EditError, SessionError};
pub use io::{FileIo, FsFileIo, MemoryFileIo, is_source_file, relative_path};
pub use state::{FileEvent, FileRecord, FileState, Outcome, PendingEdit, SourceFile, Transition, reduce};
pub use watcher::{FileWatcher, WatchEvent, WatcherService, diff_message};
pub use workspace::{Annotation, Workspace};
