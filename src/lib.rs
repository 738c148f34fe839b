//! Chat-driven virtual gamepads.
//!
//! Text commands such as `_a500ms b+right .` are preparsed, matched against a
//! console's input grammar and executed on tracked virtual controllers whose
//! committed state feeds a device backend.

pub mod config;
pub mod console;
pub mod controller;
pub mod parsing;
pub mod validation;
