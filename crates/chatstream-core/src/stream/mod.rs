//! Response stream decoding
//!
//! Turns an incrementally delivered response body into data frame payloads.

mod decoder;
mod frames;

pub use decoder::{FrameDecoder, DATA_MARKER};
pub use frames::frames;
