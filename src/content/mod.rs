// src/content/mod.rs
pub mod cmap;
pub mod interpreter;
pub mod prescan;

// Re-export key interpretation types for convenience
pub use cmap::{CharMap, EncodingMap, FontLookup, IdentityFonts, IdentityMap, ToUnicodeMap};
pub use interpreter::{interpret, Interpreter};
