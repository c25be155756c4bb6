//! Command-line front end
//!
//! - `play`: interactive headless session over a story package
//! - `check`: authoring lint for a story package

pub mod check;
pub mod play;
pub mod terminal;
