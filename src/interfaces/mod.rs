//! Edges of the crate: CSV basket input and the rendering boundary for
//! checkout snapshots.

pub mod csv;
pub mod render;
