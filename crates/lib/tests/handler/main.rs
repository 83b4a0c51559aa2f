//! Integration tests driving the library through [`kiln_lib::Handler`].

mod common;
mod console_tests;
mod evaluation_tests;
mod fix_inspect_tests;
mod lifecycle_tests;
mod plugins_tests;
mod selection_tests;
