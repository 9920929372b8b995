pub mod editor;
pub mod store;

pub use editor::{DraftEditor, EditorState, FieldUpdate, LoadSource};
pub use store::{DraftKey, DraftStore, MemoryDraftStore, SqliteDraftStore};
