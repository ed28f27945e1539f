use std::path::PathBuf;

mod cache;
mod model;
mod workspace;

pub use cache::{CachedProjectInfo, ProjectCache};
pub use model::{
    AspectRatio, GenerationResult, GenerationStatus, Project, ResultSource, SaveState, Selection,
    SelectionRatio, MAX_RESULTS, MIN_SELECTION_SIZE,
};
pub use workspace::{ProjectError, Workspace};

pub fn app_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| std::env::temp_dir());
    base.join("odin_workspace")
}
