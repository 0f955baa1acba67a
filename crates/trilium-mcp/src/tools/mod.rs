//! Tool implementations behind the MCP surface.
//!
//! Each module pairs a parameter struct (serde + schemars, camelCase wire
//! names) with an async handler that validates, orchestrates the core
//! pieces, and returns a typed output. The server layer only marshals these
//! in and out of the protocol envelope.

pub mod create;
pub mod delete;
pub mod get;
pub mod resolve;
pub mod search;
pub mod update;

pub use create::{handle_create, CreateNoteOutput, CreateNoteParams};
pub use delete::{handle_delete, DeleteNoteParams};
pub use get::{handle_get, GetNoteOutput, GetNoteParams};
pub use resolve::{handle_resolve, ResolveNoteIdOutput, ResolveNoteIdParams};
pub use search::{handle_search, SearchNotesParams};
pub use update::{handle_append, handle_update, AppendNoteParams, UpdateNoteParams, WriteNoteOutput};
