//! The error-diffusion driver: a sequential two-dimensional scan, optional
//! serpentine traversal, linear-space error accumulation, and per-matrix
//! weight distribution.
//!
//! Entirely sequential and deterministic. `single_threaded` has no effect
//! here.

use crate::alpha::{self, AlphaConvention};
use crate::color::{self, Color16};
use crate::matrices::DiffusionMatrix;
use crate::palette::Palette;

/// Runs error diffusion over a row-major `width * height` buffer of source
/// colors, returning a row-major buffer of premultiplied output colors of
/// the same shape.
///
/// Panics if `matrix`'s top row has no zero at its declared current-pixel
/// column. That indicates a malformed matrix, not a runtime fault.
pub fn diffuse(
  width: u32,
  height: u32,
  src: &[Color16],
  palette: &Palette,
  matrix: &DiffusionMatrix,
  serpentine: bool,
  convention: AlphaConvention,
) -> Vec<Color16> {
  assert_eq!(
    matrix.rows[0][matrix.cur_col],
    0.0,
    "malformed error-diffusion matrix: top row has no zero at the current-pixel column"
  );

  let w = width as usize;
  let h = height as usize;

  // Linearize every source pixel once into a flat H*W working buffer.
  let mut working: Vec<(u16, u16, u16)> = Vec::with_capacity(w * h);
  let mut src_alpha: Vec<u16> = Vec::with_capacity(w * h);
  for &c in src {
    let (r, g, b, a) = alpha::unpremult_and_linearize(c, convention);
    working.push((r, g, b));
    src_alpha.push(a);
  }

  let mut out = vec![Color16::transparent(); w * h];
  let cur_col = matrix.cur_col;

  for y in 0..h {
    let right_to_left = serpentine && (y % 2 == 0);
    for i in 0..w {
      let x = if right_to_left { w - 1 - i } else { i };
      let idx = y * w + x;
      let (old_r, old_g, old_b) = working[idx];

      let pidx = palette.closest(old_r, old_g, old_b);
      out[idx] = alpha::premult(palette.srgb_at(pidx), src_alpha[idx]);

      let (pr, pg, pb) = palette.linear_at(pidx);
      let er = i32::from(old_r) - i32::from(pr);
      let eg = i32::from(old_g) - i32::from(pg);
      let eb = i32::from(old_b) - i32::from(pb);

      for (ky, row) in matrix.rows.iter().enumerate() {
        for (kx, &weight) in row.iter().enumerate() {
          if weight == 0.0 {
            continue;
          }
          let mut dx = kx as i64 - cur_col as i64;
          let dy = ky as i64;
          if right_to_left {
            dx = -dx;
          }
          let nx = x as i64 + dx;
          let ny = y as i64 + dy;
          if nx < 0 || nx >= w as i64 || ny < 0 || ny >= h as i64 {
            continue;
          }
          let nidx = (ny as usize) * w + nx as usize;
          let (br, bg, bb) = working[nidx];
          working[nidx] = (
            color::round_clamp_f32(f32::from(br) + (er as f32) * weight),
            color::round_clamp_f32(f32::from(bg) + (eg as f32) * weight),
            color::round_clamp_f32(f32::from(bb) + (eb as f32) * weight),
          );
        }
      }
    }
  }

  out
}
