//! Errors shown to users, pointing at the source that caused them when known.
pub use code_frame::*;
pub use diagnostic::*;
pub use diagnostics::*;

mod code_frame;
mod diagnostic;
mod diagnostics;
