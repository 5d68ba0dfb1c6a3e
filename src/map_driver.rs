//! The per-pixel map driver: an embarrassingly parallel dithering variant in
//! which a caller-supplied `(x, y, r, g, b) -> (r, g, b)` function produces a
//! candidate linear-RGB color subsequently quantized to the palette.

use rayon::prelude::*;

use crate::alpha::{self, AlphaConvention};
use crate::bayer::OrderedMatrix;
use crate::color::{self, Color16};
use crate::error::DitherError;
use crate::palette::Palette;

/// A pixel-map function, invoked without synchronization across worker
/// threads. Implementations must depend only on `(x, y, r, g, b)` to get
/// deterministic output; a function that draws from a shared sequential
/// source (e.g. a process-wide RNG) needs `single_threaded = true`.
pub trait Mapper: Send + Sync {
  fn apply(&self, x: u32, y: u32, r: u16, g: u16, b: u16) -> (u16, u16, u16);
}

impl<F> Mapper for F
where
  F: Fn(u32, u32, u16, u16, u16) -> (u16, u16, u16) + Send + Sync,
{
  fn apply(&self, x: u32, y: u32, r: u16, g: u16, b: u16) -> (u16, u16, u16) {
    self(x, y, r, g, b)
  }
}

/// The built-in ordered-dither mapper: adds a precomputed per-cell offset
/// (tiled by `[y % height][x % width]`) to each linear channel, then
/// round-clamps.
pub struct OrderedDither {
  offsets: Vec<Vec<f64>>,
}

impl OrderedDither {
  /// Builds a mapper from an already-synthesized Bayer matrix (see
  /// [`crate::bayer::bayer_matrix`]).
  pub fn from_bayer(matrix: &[Vec<u32>], strength: f64) -> Self {
    OrderedDither { offsets: crate::bayer::to_offsets(matrix, strength) }
  }

  /// Builds a mapper from a caller-supplied wire-format ordered matrix,
  /// validating its `max` divisor.
  pub fn from_matrix(matrix: &OrderedMatrix, strength: f64) -> Result<Self, DitherError> {
    Ok(OrderedDither { offsets: matrix.to_offsets(strength)? })
  }
}

impl Mapper for OrderedDither {
  fn apply(&self, x: u32, y: u32, r: u16, g: u16, b: u16) -> (u16, u16, u16) {
    let h = self.offsets.len();
    let w = self.offsets[0].len();
    let offset = self.offsets[y as usize % h][x as usize % w];
    let shift = |v: u16| color::round_even_u16(f64::from(v) + offset);
    (shift(r), shift(g), shift(b))
  }
}

/// Runs the pixel-map driver over a row-major `width * height` buffer of
/// source colors, returning a row-major buffer of premultiplied output
/// colors of the same shape.
///
/// `x_offset`/`y_offset` shift the coordinates passed to `mapper`, used by
/// [`crate::ditherer::Ditherer::draw`] so a tiled mapper (e.g. ordered
/// dither) stays aligned to the destination image rather than restarting at
/// the sub-region's own origin.
pub fn map_pixels(
  width: u32,
  height: u32,
  src: &[Color16],
  palette: &Palette,
  mapper: &dyn Mapper,
  convention: AlphaConvention,
  single_threaded: bool,
  x_offset: u32,
  y_offset: u32,
) -> Vec<Color16> {
  let width_usize = width as usize;
  let total_rows = height as usize;
  let mut dst = vec![Color16::transparent(); src.len()];

  if total_rows == 0 || width_usize == 0 {
    return dst;
  }

  let workers = if single_threaded { 1 } else { rayon::current_num_threads().max(1) };
  let workers = workers.min(total_rows);
  let band_rows = total_rows.div_ceil(workers);
  let chunk_size = band_rows * width_usize;

  tracing::trace!(workers, band_rows, total_rows, "pixel-map driver band partition");

  dst.par_chunks_mut(chunk_size).zip(src.par_chunks(chunk_size)).enumerate().for_each(
    |(band_idx, (dst_band, src_band))| {
      let row0 = band_idx * band_rows;
      for (local_row, (dst_row, src_row)) in
        dst_band.chunks_mut(width_usize).zip(src_band.chunks(width_usize)).enumerate()
      {
        let y = (row0 + local_row) as u32 + y_offset;
        for (x_local, (dpx, &spx)) in dst_row.iter_mut().zip(src_row.iter()).enumerate() {
          let x = x_local as u32 + x_offset;
          *dpx = map_one_pixel(x, y, spx, palette, mapper, convention);
        }
      }
    },
  );

  dst
}

fn map_one_pixel(
  x: u32,
  y: u32,
  src: Color16,
  palette: &Palette,
  mapper: &dyn Mapper,
  convention: AlphaConvention,
) -> Color16 {
  let (r, g, b, a) = alpha::unpremult_and_linearize(src, convention);
  if a == 0 {
    return src;
  }
  let (r, g, b) = mapper.apply(x, y, r, g, b);
  let idx = palette.closest(r, g, b);
  alpha::premult(palette.srgb_at(idx), a)
}
