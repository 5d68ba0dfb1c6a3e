//! Public error type for the dithering engine.

use thiserror::Error;

/// Everything that can go wrong calling into this crate.
///
/// Container faults (an incompatible paletted image, or an image that cannot
/// be written in place) are recovered internally by allocating a fresh RGBA
/// copy and are never surfaced here, see [`crate::ditherer::Ditherer`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DitherError {
  /// A [`crate::palette::Palette`] was constructed from zero colors.
  #[error("palette must contain at least one color")]
  EmptyPalette,

  /// Exactly one of {matrix, mapper} must be configured, Bayer dimensions
  /// must be powers of two (plus the three hand-coded exceptions), and an
  /// ordered matrix's `max` divisor must be nonzero.
  #[error("invalid ditherer configuration: {reason}")]
  InvalidConfiguration { reason: String },

  /// `dither_paletted` was asked for paletted output with more than 256
  /// colors in the palette.
  #[error("palette has {len} colors, paletted output allows at most 256")]
  PaletteTooLarge { len: usize },

  /// The `quantize` interface's capacity constraints could not be met by
  /// the configured palette.
  #[error("quantize request incompatible with configured palette: {reason}")]
  QuantizeMismatch { reason: String },
}
