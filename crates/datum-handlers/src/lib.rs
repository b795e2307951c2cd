//! Built-in source handlers for datum
//!
//! | tag | fingerprint | fetch |
//! |---|---|---|
//! | `http` | `etag:<ETag>`, `lm:<Last-Modified>\|len:<Content-Length>`, or `sha256:` of the body | streamed GET |
//! | `file` | `sha256:` of the file | atomic copy |
//! | `command` | trimmed stdout of `fingerprint_cmd` | runs `fetch_cmd` with `DEST` set |
//! | `git` | `gitblob:<blob id>` at `ref`:`path` | writes the blob |
//!
//! Handlers are plain values; nothing registers itself. Install them into a
//! [`HandlerRegistry`] with [`register_builtins`] or build one with
//! [`builtin_registry`].

pub mod command;
pub mod file;
pub mod git;
pub mod http;
mod shell;

use std::sync::Arc;

use datum_core::HandlerRegistry;

pub use command::CommandHandler;
pub use file::FileHandler;
pub use git::GitHandler;
pub use http::HttpHandler;

/// Install the four built-in handlers under their standard tags.
pub fn register_builtins(registry: &mut HandlerRegistry) {
    registry.register(http::TAG, Arc::new(HttpHandler::new()));
    registry.register(file::TAG, Arc::new(FileHandler::new()));
    registry.register(command::TAG, Arc::new(CommandHandler::new()));
    registry.register(git::TAG, Arc::new(GitHandler::new()));
}

/// A registry holding only the built-in handlers.
pub fn builtin_registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    register_builtins(&mut registry);
    registry
}
