pub use self::build_mode::*;
pub use self::build_target::*;
pub use self::loader::*;
pub use self::location::*;

mod build_mode;
mod build_target;
mod loader;
mod location;
