//! Palette storage and nearest-in-linear-RGB closest-color lookup.

use crate::color::{Color16, to_linear_rgb};

/// Luminance weights 0.2126 / 0.7152 / 0.0722 expressed as exact rationals so
/// the distance computation stays integer. See the design notes on why
/// unweighted Euclidean distance (the naive v1 behavior) picks visibly wrong
/// nearest colors on saturated reds/blues.
const WEIGHT_R_NUM: i64 = 1063;
const WEIGHT_R_DEN: i64 = 5000;
const WEIGHT_G_NUM: i64 = 447;
const WEIGHT_G_DEN: i64 = 625;
const WEIGHT_B_NUM: i64 = 361;
const WEIGHT_B_DEN: i64 = 5000;

fn sq_diff(a: u16, b: u16) -> i64 {
  let d = i64::from(a) - i64::from(b);
  (d * d) >> 2
}

/// An ordered, non-empty sequence of opaque colors, stored in both sRGB and
/// precomputed linear-RGB form.
#[derive(Clone, Debug)]
pub struct Palette {
  srgb: Vec<Color16>,
  linear: Vec<(u16, u16, u16)>,
}

impl Palette {
  /// Builds a palette from a non-empty sequence of opaque colors.
  ///
  /// Returns `None` for an empty input: empty-palette construction yields
  /// a null handle rather than a ditherer.
  pub fn new(colors: Vec<Color16>) -> Option<Self> {
    if colors.is_empty() {
      return None;
    }
    let linear = colors.iter().map(|c| to_linear_rgb(c.r, c.g, c.b)).collect();
    Some(Palette { srgb: colors, linear })
  }

  pub fn len(&self) -> usize {
    self.srgb.len()
  }

  pub fn is_empty(&self) -> bool {
    self.srgb.is_empty()
  }

  /// The stored sRGB color at `idx`.
  pub fn srgb_at(&self, idx: usize) -> Color16 {
    self.srgb[idx]
  }

  /// The precomputed linear-RGB triple at `idx`.
  pub fn linear_at(&self, idx: usize) -> (u16, u16, u16) {
    self.linear[idx]
  }

  /// Finds the index of the closest palette entry to `(r, g, b)`, given in
  /// linear RGB. Ties go to the first (lowest-index) entry; an exact match
  /// short-circuits the scan.
  pub fn closest(&self, r: u16, g: u16, b: u16) -> usize {
    let mut best_idx = 0;
    let mut best_dist = i64::MAX;
    for (idx, &(pr, pg, pb)) in self.linear.iter().enumerate() {
      let dist = WEIGHT_R_NUM * sq_diff(r, pr) / WEIGHT_R_DEN
        + WEIGHT_G_NUM * sq_diff(g, pg) / WEIGHT_G_DEN
        + WEIGHT_B_NUM * sq_diff(b, pb) / WEIGHT_B_DEN;
      if dist == 0 {
        return idx;
      }
      if dist < best_dist {
        best_dist = dist;
        best_idx = idx;
      }
    }
    best_idx
  }

  /// Multiset equality: two palettes are "the same" if they contain the same
  /// colors regardless of order.
  pub fn same(&self, other: &Palette) -> bool {
    if self.srgb.len() != other.srgb.len() {
      return false;
    }
    let mut mine: Vec<(u16, u16, u16, u16)> = self.srgb.iter().map(|c| (c.r, c.g, c.b, c.a)).collect();
    let mut theirs: Vec<(u16, u16, u16, u16)> = other.srgb.iter().map(|c| (c.r, c.g, c.b, c.a)).collect();
    mine.sort_unstable();
    theirs.sort_unstable();
    mine == theirs
  }
}
