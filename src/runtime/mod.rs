// src/runtime/mod.rs

//! Python version handling and interpreter discovery.

pub mod locator;
pub mod version;

pub use locator::{Interpreter, InterpreterLocator, PathLocator, Resolution};
pub use version::{PythonVersion, VersionSpec};
