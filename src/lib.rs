//! Assetpipe - build a stylesheet bundle and a WASM application into one directory
//!
//! This library provides functionality to:
//! - Declare style and application pipelines from `assetpipe.toml`
//! - Compile SCSS, prefix it for target browsers and emit a standalone CSS file
//! - Copy static files, compile a Rust crate to WebAssembly and bundle the JS entry
//! - Run the pipelines together while guaranteeing they never overwrite each other

pub mod build;
pub mod cli;
pub mod config;
pub mod tools;
pub mod watch;
