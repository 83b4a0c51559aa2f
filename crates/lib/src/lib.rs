//! kiln-lib: the orchestration core of kiln
//!
//! This crate turns a set of JSON configuration documents into buildable
//! units:
//! - `config`: decoding documents into a typed [`config::Config`]
//! - `eval`: evaluating locals and datasources in dependency order
//! - `plugins`: resolving plugin requirements and finding installed binaries
//! - `select`: choosing builds with `only`/`except` patterns
//! - `handler`: the lifecycle tying everything together

pub mod config;
pub mod console;
pub mod consts;
pub mod datasource;
pub mod diagnostics;
pub mod eval;
pub mod expr;
pub mod fix;
pub mod handler;
pub mod inspect;
pub mod platform;
pub mod plugins;
pub mod select;
pub mod util;
pub mod value;

pub use handler::{Handler, HandlerState, InitializeOptions, InspectConfigOptions};
