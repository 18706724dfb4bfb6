//! Pipeline stages for financial document analysis.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and the two external dependencies (pdfium, the LLM) stay behind
//! narrow seams.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ llm ──▶ shape
//! (bytes)   (pdfium)    (LLM)   (sections)
//! ```
//!
//! 1. [`input`]   validate the upload and stage it under the data directory
//! 2. [`extract`] read the text layer; runs in `spawn_blocking` because
//!    pdfium is blocking FFI
//! 3. [`llm`]     drive the model call with timeout and retry/backoff; the
//!    only stage with network I/O
//! 4. [`shape`]   turn the reply into four clean plain-text sections

pub mod extract;
pub mod input;
pub mod llm;
pub mod shape;
