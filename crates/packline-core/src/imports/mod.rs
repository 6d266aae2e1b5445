//! Import discovery for JavaScript/TypeScript files.
//!
//! Provides a lightweight scanner that finds import, re-export, dynamic
//! import and require specifiers without parsing.

mod scan;

pub use scan::{scan_imports, ImportKind, ImportSpecCore};
