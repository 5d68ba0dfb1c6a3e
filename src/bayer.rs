//! Ordered-dither threshold matrix synthesis.
//!
//! Generates rectangular Bayer matrices whose side lengths are powers of two,
//! via recursive bit-interleaved subdivision, plus the three hand-coded
//! exceptions that cannot be produced by that generator.

use crate::error::DitherError;

fn is_pow2(v: u32) -> bool {
  v != 0 && (v & (v - 1)) == 0
}

fn log2_exact(v: u32) -> u32 {
  v.trailing_zeros()
}

/// One recursive doubling step that grows only the row count (height),
/// splitting each cell into a top/bottom pair with offsets `0`/`1`.
fn heighten(m: &[Vec<u32>]) -> Vec<Vec<u32>> {
  let h = m.len();
  let w = m[0].len();
  let mut out = vec![vec![0u32; w]; 2 * h];
  for i in 0..h {
    for j in 0..w {
      out[i][j] = 2 * m[i][j];
      out[i + h][j] = 2 * m[i][j] + 1;
    }
  }
  out
}

/// One recursive doubling step that grows both dimensions at once, in the
/// canonical Bayer quadrant order (top-left, top-right, bottom-left,
/// bottom-right) = (0, 3, 2, 1).
fn joint_double(m: &[Vec<u32>]) -> Vec<Vec<u32>> {
  let h = m.len();
  let w = m[0].len();
  let mut out = vec![vec![0u32; 2 * w]; 2 * h];
  for i in 0..h {
    for j in 0..w {
      let old = m[i][j];
      out[i][j] = 4 * old;
      out[i][j + w] = 4 * old + 3;
      out[i + h][j] = 4 * old + 2;
      out[i + h][j + w] = 4 * old + 1;
    }
  }
  out
}

/// Builds a `2^p`-wide, `2^q`-tall matrix, requiring `p <= q`.
fn build_le(p: u32, q: u32) -> Vec<Vec<u32>> {
  debug_assert!(p <= q);
  let mut m = vec![vec![0u32]];
  for _ in 0..(q - p) {
    m = heighten(&m);
  }
  for _ in 0..p {
    m = joint_double(&m);
  }
  m
}

fn transpose(m: &[Vec<u32>]) -> Vec<Vec<u32>> {
  let h = m.len();
  let w = m[0].len();
  let mut out = vec![vec![0u32; h]; w];
  for (i, row) in m.iter().enumerate() {
    for (j, &v) in row.iter().enumerate() {
      out[j][i] = v;
    }
  }
  out
}

/// The 3x3 hand-coded exception. Stored verbatim; not produced by the generator.
const EXCEPTION_3X3: [[u32; 3]; 3] = [[0, 7, 3], [6, 5, 2], [4, 1, 8]];

/// The 5x3 hand-coded exception (width 5, height 3).
const EXCEPTION_5X3: [[u32; 5]; 3] = [[0, 8, 2, 10, 4], [12, 5, 13, 6, 14], [3, 11, 1, 9, 7]];

/// The 3x5 hand-coded exception (width 3, height 5).
const EXCEPTION_3X5: [[u32; 3]; 5] = [[0, 12, 3], [8, 5, 11], [2, 13, 1], [10, 6, 9], [4, 14, 7]];

/// Synthesizes a Bayer matrix of dimensions `(width, height)`.
///
/// Both dimensions must be powers of two, or the pair must be one of the
/// three hand-coded exceptions `(3,3)`, `(5,3)`, `(3,5)`. Returns rows
/// indexed `[y][x]`, with cell values in `[0, width*height)`.
pub fn bayer_matrix(width: u32, height: u32) -> Result<Vec<Vec<u32>>, DitherError> {
  match (width, height) {
    (3, 3) => return Ok(EXCEPTION_3X3.iter().map(|r| r.to_vec()).collect()),
    (5, 3) => return Ok(EXCEPTION_5X3.iter().map(|r| r.to_vec()).collect()),
    (3, 5) => return Ok(EXCEPTION_3X5.iter().map(|r| r.to_vec()).collect()),
    _ => {}
  }
  if !is_pow2(width) || !is_pow2(height) {
    return Err(DitherError::InvalidConfiguration {
      reason: format!("bayer dimensions ({width}, {height}) are not powers of two and not a hand-coded exception"),
    });
  }
  let p = log2_exact(width);
  let q = log2_exact(height);
  let m = if p <= q { build_le(p, q) } else { transpose(&build_le(q, p)) };
  Ok(m)
}

/// Converts a synthesized Bayer matrix into precomputed additive linear-RGB
/// offsets, per `offset(i,j) = S*(cell+1)/max - S*(0.5+eps)` with
/// `S = 65535 * strength`. The divisor is taken from the matrix's own area,
/// which is always correct for a matrix this module generated.
pub fn to_offsets(matrix: &[Vec<u32>], strength: f64) -> Vec<Vec<f64>> {
  let max = (matrix.len() * matrix[0].len()) as f64;
  offsets_with_divisor(matrix, max, strength)
}

fn offsets_with_divisor(matrix: &[Vec<u32>], max: f64, strength: f64) -> Vec<Vec<f64>> {
  let s = 65535.0 * strength;
  let eps = f64::EPSILON;
  matrix
    .iter()
    .map(|row| row.iter().map(|&cell| s * (f64::from(cell) + 1.0) / max - s * (0.5 + eps)).collect())
    .collect()
}

/// The wire representation of a caller-supplied ordered-dither matrix:
/// a rectangular array of cells plus an explicit `max` divisor, which
/// need not equal the matrix's own area.
#[derive(Clone, Debug)]
pub struct OrderedMatrix {
  pub cells: Vec<Vec<u32>>,
  pub max: u32,
}

impl OrderedMatrix {
  /// Converts to additive offsets. `max == 0` is a configuration fault, not
  /// a panic or silent division.
  pub fn to_offsets(&self, strength: f64) -> Result<Vec<Vec<f64>>, DitherError> {
    if self.max == 0 {
      return Err(DitherError::InvalidConfiguration {
        reason: "ordered-dither matrix `max` divisor must be nonzero".to_string(),
      });
    }
    Ok(offsets_with_divisor(&self.cells, f64::from(self.max), strength))
  }
}
