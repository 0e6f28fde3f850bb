//! Cut-sheet optimizer for rod and bar stock.
//!
//! Demand (material, diameter, length, quantity per section) is grouped,
//! packed onto fixed-length stock sticks with first-fit-descending and
//! written out as a cut sheet with the drop left on every stick.

pub mod config;
pub mod error;
pub mod format;
pub mod loader;
pub mod logging;
pub mod optimizer;
pub mod packer;
pub mod render;
pub mod stock;
pub mod types;
pub mod writer;
