pub use css_modules_plugin::*;
pub use scoped_style_transform::*;

mod css_modules_plugin;
pub mod naming;
mod scoped_style_transform;

pub const PLUGIN_NAME: &str = "css-modules";
