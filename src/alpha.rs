//! Unpremultiplication on read, premultiplication of the quantized color on write.

use crate::color::{self, Color16};

/// Whether a source image's RGB channels are already scaled by alpha.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum AlphaConvention {
  #[default]
  Straight,
  Premultiplied,
}

/// Unpremultiplies (if needed) and linearizes a source color.
///
/// Returns `(r, g, b, a)` in 16-bit linear RGB plus straight alpha. Fully
/// transparent pixels return all zeros without dividing.
pub fn unpremult_and_linearize(c: Color16, convention: AlphaConvention) -> (u16, u16, u16, u16) {
  if c.a == 0 {
    return (0, 0, 0, 0);
  }
  let (r, g, b) = match convention {
    AlphaConvention::Straight => (c.r, c.g, c.b),
    AlphaConvention::Premultiplied => {
      let af = f64::from(c.a) / 65535.0;
      let unscale = |v: u16| color::round_even_u16(f64::from(v) / af);
      (unscale(c.r), unscale(c.g), unscale(c.b))
    }
  };
  let (lr, lg, lb) = color::to_linear_rgb(r, g, b);
  (lr, lg, lb, c.a)
}

/// Premultiplies a quantized straight-alpha sRGB color by the source alpha.
pub fn premult(quantized_srgb: Color16, src_alpha: u16) -> Color16 {
  if src_alpha == 0 {
    return Color16::transparent();
  }
  if src_alpha == 0xFFFF {
    return Color16 { a: src_alpha, ..quantized_srgb };
  }
  let a = u32::from(src_alpha);
  let scale = |v: u16| -> u16 { ((u32::from(v) * a) / 65535) as u16 };
  Color16 {
    r: scale(quantized_srgb.r),
    g: scale(quantized_srgb.g),
    b: scale(quantized_srgb.b),
    a: src_alpha,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn transparent_short_circuits() {
    let c = Color16 { r: 1234, g: 5678, b: 9012, a: 0 };
    assert_eq!(unpremult_and_linearize(c, AlphaConvention::Straight), (0, 0, 0, 0));
    assert_eq!(unpremult_and_linearize(c, AlphaConvention::Premultiplied), (0, 0, 0, 0));
  }

  #[test]
  fn premult_zero_alpha_is_transparent_black() {
    let c = Color16::opaque(65535, 65535, 65535);
    assert_eq!(premult(c, 0), Color16::transparent());
  }

  #[test]
  fn premult_opaque_passes_through() {
    let c = Color16::opaque(1000, 2000, 3000);
    assert_eq!(premult(c, 0xFFFF), c);
  }

  #[test]
  fn premult_half_alpha_scales_down() {
    let c = Color16::opaque(65535, 65535, 65535);
    let p = premult(c, 32768);
    assert!(p.r < 65535 && p.r > 32000);
    assert_eq!(p.a, 32768);
  }

  #[test]
  fn straight_convention_skips_division() {
    let c = Color16 { r: 100, g: 200, b: 300, a: 100 };
    let (r, g, b, a) = unpremult_and_linearize(c, AlphaConvention::Straight);
    assert_eq!(a, 100);
    // straight values go through to_linear_rgb directly on c.r/g/b (no unscale)
    let (er, eg, eb) = color::to_linear_rgb(c.r, c.g, c.b);
    assert_eq!((r, g, b), (er, eg, eb));
  }
}
