//! Compiles a route based application into hashed browser assets and a manifest.
//!
//! [`compiler::BrowserCompiler`] drives two incremental builds through an
//! [`routepack_core::engine::Engine`]: the application bundle with one entry per route, and a
//! single stylesheet bundle collecting every scoped stylesheet.
pub mod channel;
pub mod compiler;
pub mod config;
pub mod dependencies;
pub mod externals;
pub mod loaders;
pub mod manifest;
pub mod plugins;
