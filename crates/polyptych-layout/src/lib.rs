//! Physical panel layout reconstruction.
//!
//! Takes the markers decoded from one photograph of the assembled panel wall
//! and produces a [`Layout`]: per panel, a physical position in millimeters,
//! a rotation, and a detected footprint size. The pipeline runs in four
//! stages:
//!
//! 1. estimate each panel's screen rectangle in photograph space from its
//!    marker's measured scale,
//! 2. score how rectangular each estimate is,
//! 3. when two or more panels are visible, fit a corrective homography from
//!    observed corners to ideal rectangles (falling back to identity when no
//!    stable consensus exists),
//! 4. assemble corrected rectangles into a shared millimeter frame anchored
//!    at a fixed margin.

mod layout;
mod reconstruct;
mod registry;

pub use layout::{read_layout, write_layout, Layout, LayoutFileError, PanelPlacement};
pub use reconstruct::{rectangularity_score, reconstruct_layout, ReconstructParams};
pub use registry::{RegistryError, ScreenRegistry, ScreenSpec};
