//! Pipeline stages for answering one chemistry request.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested without a network or a pdfium library.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ document | image ──▶ (prompts) ──▶ encode ──▶ generate
//! (path/URL)  (pdfium)  (decode)    (assemble)   (base64)   (one backend call)
//! ```
//!
//! 1. [`input`]    — read an attachment from a local path or URL
//! 2. [`document`] — extract PDF text; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 3. [`image`]    — decode a PNG/JPEG upload
//! 4. [`encode`]   — PNG-encode and base64-wrap an image for the request body
//! 5. [`generate`] — build the call shape and issue exactly one backend call;
//!    the only stage with network I/O besides URL downloads

pub mod document;
pub mod encode;
pub mod generate;
pub mod image;
pub mod input;
