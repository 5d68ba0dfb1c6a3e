//! # dither-engine
//!
//! A palette-constrained image dithering engine: closest-palette lookup in
//! a perceptually weighted linear-RGB color space, driven either by
//! sequential error diffusion (Floyd-Steinberg, Atkinson, Jarvis, ...) or by
//! an embarrassingly parallel per-pixel map (ordered/Bayer dithering, or any
//! caller-supplied pixel function).
//!
//! Palette selection (choosing *which* colors to quantize to) is out of
//! scope. Callers supply the palette; this crate only distributes
//! quantization error so the result approximates the source under that
//! palette.
//!
//! ## Example
//!
//! ```no_run
//! use dither_engine::color::Color16;
//! use dither_engine::ditherer::Ditherer;
//! use dither_engine::matrices;
//!
//! let palette = vec![Color16::opaque(0, 0, 0), Color16::opaque(65535, 65535, 65535)];
//! let ditherer = Ditherer::new(palette).unwrap().with_matrix(matrices::floyd_steinberg()).with_serpentine(true);
//!
//! let img = image::open("input.png").unwrap();
//! let out = ditherer.dither_copy(&img).unwrap();
//! out.save("output.png").unwrap();
//! ```

pub mod alpha;
pub mod bayer;
pub mod color;
pub mod diffuse;
pub mod ditherer;
pub mod error;
pub mod map_driver;
pub mod matrices;
pub mod palette;

pub use color::Color16;
pub use ditherer::{Ditherer, PalettedImage, Rect};
pub use error::DitherError;
pub use palette::Palette;
