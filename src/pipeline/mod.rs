//! Pipeline stages for document parsing and information extraction.
//!
//! Each submodule implements exactly one step so it can be tested on its
//! own; [`crate::extract`] sequences them.
//!
//! ## Data Flow
//!
//! ```text
//! validate ──▶ encode ──▶ schema ──▶ invoke ──▶ persist
//! (checks)    (base64)   (file or    (remote    (JSON
//!                         generate)   extract)   artifacts)
//! ```
//!
//! 1. [`validate`] — existence, extension and size checks; no bytes read
//! 2. [`encode`]   — read the file, base64 it, infer the MIME type
//! 3. [`schema`]   — load the caller's schema or generate one remotely
//! 4. [`invoke`]   — the chat-style remote calls and envelope decoding
//! 5. [`persist`]  — artifact layout and atomic JSON writes

pub mod encode;
pub mod invoke;
pub mod persist;
pub mod schema;
pub mod validate;
