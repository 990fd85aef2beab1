//! Image tiling and concurrent panel dispatch.
//!
//! Given a source image and a reconstructed [`Layout`], this crate scales
//! the image to cover the layout's bounding box, cuts one tile per panel,
//! and delivers the tiles over a pluggable [`Transport`], one thread per
//! panel. A single unreachable panel never stops its siblings; callers get
//! a per-panel [`DispatchReport`] instead of a single boolean.
//!
//! [`Layout`]: polyptych_layout::Layout

mod dispatch;
mod pack;
mod plan;
mod transport;

pub use dispatch::{clear_panels, send_layout_image, DispatchReport};
pub use pack::pack_4bit;
pub use plan::{panel_tile, scale_to_layout, ScaledSource, TileError};
pub use transport::{DeviceInfo, HttpTransport, PushOptions, Transport, TransportError};
