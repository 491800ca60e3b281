//! # fp-frame
//!
//! Frame geometry and raw frame-stream assembly.
//!
//! - [`fit`] computes the aspect-preserving output size for a source inside
//!   a bounding box.
//! - [`FrameAssembler`] turns an arbitrarily chunked byte stream of raw
//!   pixels into fixed-size [`Frame`]s, in arrival order.
//!
//! ```
//! use fp_frame::{fit, FrameAssembler};
//! use fp_core::PixelFormat;
//!
//! let target = fit(1920, 1080, 800, 600);
//! assert_eq!((target.width, target.height), (800, 450));
//!
//! let mut assembler = FrameAssembler::for_target(target, PixelFormat::Rgba).unwrap();
//! let frames: Vec<_> = assembler.push(&vec![0u8; 800 * 450 * 4 + 10]).collect();
//! assert_eq!(frames.len(), 1);
//! assert_eq!(assembler.buffered_len(), 10);
//! ```

pub mod assembler;
pub mod frame;
pub mod scale;

pub use assembler::{Drain, FrameAssembler};
pub use frame::Frame;
pub use scale::{fit, fit_within};
