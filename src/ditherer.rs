//! The top-level dispatcher: validates configuration, chooses the
//! error-diffusion or pixel-map driver, and manages in-place vs. copy
//! output over the `image` crate's container type.

use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};

use crate::alpha::AlphaConvention;
use crate::color::{self, Color16};
use crate::error::DitherError;
use crate::map_driver::{self, Mapper};
use crate::matrices::DiffusionMatrix;
use crate::palette::Palette;

/// Exactly one of {error diffusion, pixel map} per invocation.
enum Algorithm {
  ErrorDiffusion(DiffusionMatrix),
  Map(Box<dyn Mapper>),
}

/// A rectangular sub-region, used by [`Ditherer::draw`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Rect {
  pub x: u32,
  pub y: u32,
  pub width: u32,
  pub height: u32,
}

/// The result of [`Ditherer::dither_paletted`]: palette indices rather than
/// raw RGBA, since the `image` crate carries no public indexed-color image
/// buffer type of its own.
#[derive(Clone, Debug)]
pub struct PalettedImage {
  pub indices: Vec<u8>,
  pub width: u32,
  pub height: u32,
  pub palette: Palette,
}

/// A configured ditherer: a non-empty palette plus exactly one algorithm
/// selector and the `serpentine`/`single_threaded` flags.
pub struct Ditherer {
  palette: Palette,
  algorithm: Option<Algorithm>,
  serpentine: bool,
  single_threaded: bool,
  alpha_convention: AlphaConvention,
}

impl Ditherer {
  /// Constructs a ditherer from a non-empty palette. An empty palette is
  /// not a panic but a typed "no ditherer" failure.
  pub fn new(palette: Vec<Color16>) -> Result<Self, DitherError> {
    let palette = Palette::new(palette).ok_or(DitherError::EmptyPalette)?;
    Ok(Ditherer {
      palette,
      algorithm: None,
      serpentine: false,
      single_threaded: false,
      alpha_convention: AlphaConvention::Straight,
    })
  }

  /// Selects error diffusion with `matrix`. Replaces any prior selector.
  pub fn with_matrix(mut self, matrix: DiffusionMatrix) -> Self {
    self.algorithm = Some(Algorithm::ErrorDiffusion(matrix));
    self
  }

  /// Selects the pixel-map driver with `mapper`. Replaces any prior
  /// selector.
  pub fn with_mapper(mut self, mapper: Box<dyn Mapper>) -> Self {
    self.algorithm = Some(Algorithm::Map(mapper));
    self
  }

  pub fn with_serpentine(mut self, serpentine: bool) -> Self {
    self.serpentine = serpentine;
    self
  }

  pub fn with_single_threaded(mut self, single_threaded: bool) -> Self {
    self.single_threaded = single_threaded;
    self
  }

  /// Declares whether source images carry straight or premultiplied alpha.
  /// Defaults to straight.
  pub fn with_alpha_convention(mut self, convention: AlphaConvention) -> Self {
    self.alpha_convention = convention;
    self
  }

  pub fn palette(&self) -> &Palette {
    &self.palette
  }

  fn run(&self, width: u32, height: u32, colors: &[Color16], x_off: u32, y_off: u32) -> Result<Vec<Color16>, DitherError> {
    match &self.algorithm {
      None => Err(DitherError::InvalidConfiguration {
        reason: "no algorithm configured: exactly one of matrix/mapper must be set".to_string(),
      }),
      Some(Algorithm::ErrorDiffusion(matrix)) => {
        Ok(crate::diffuse::diffuse(width, height, colors, &self.palette, matrix, self.serpentine, self.alpha_convention))
      }
      Some(Algorithm::Map(mapper)) => Ok(map_driver::map_pixels(
        width,
        height,
        colors,
        &self.palette,
        mapper.as_ref(),
        self.alpha_convention,
        self.single_threaded,
        x_off,
        y_off,
      )),
    }
  }

  /// Dithers `img` in place when possible. An `Rgba8` image is mutated and
  /// returned directly; any other container is a recovered container fault,
  /// so a fresh RGBA8 copy is allocated, dithered, and returned instead.
  pub fn dither(&self, img: DynamicImage) -> Result<RgbaImage, DitherError> {
    tracing::debug!(width = img.width(), height = img.height(), palette_len = self.palette.len(), "dither");
    match img {
      DynamicImage::ImageRgba8(mut buf) => {
        let (w, h) = buf.dimensions();
        let colors = image_to_colors(&buf);
        let out = self.run(w, h, &colors, 0, 0)?;
        write_colors_into(&mut buf, &out);
        Ok(buf)
      }
      other => {
        tracing::warn!("container fault: source image is not Rgba8, recovering via fresh RGBA copy");
        self.dither_copy(&other)
      }
    }
  }

  /// Always allocates a fresh RGBA8 image; the source is left untouched.
  /// Pixelwise identical to [`Ditherer::dither`] on the same input; only
  /// ownership and container type differ.
  pub fn dither_copy(&self, img: &DynamicImage) -> Result<RgbaImage, DitherError> {
    tracing::debug!(width = img.width(), height = img.height(), palette_len = self.palette.len(), "dither_copy");
    let rgba = img.to_rgba8();
    let (w, h) = rgba.dimensions();
    let colors = image_to_colors(&rgba);
    let out = self.run(w, h, &colors, 0, 0)?;
    Ok(colors_to_image(&out, w, h))
  }

  /// Dithers to an RGBA8 copy, then maps every output pixel to its palette
  /// index. Requires the configured palette to have at most 256 colors.
  pub fn dither_paletted(&self, img: &DynamicImage) -> Result<PalettedImage, DitherError> {
    if self.palette.len() > 256 {
      return Err(DitherError::PaletteTooLarge { len: self.palette.len() });
    }
    let rgba = self.dither_copy(img)?;
    let (w, h) = rgba.dimensions();
    let mut indices = Vec::with_capacity((w as usize) * (h as usize));
    for p in rgba.pixels() {
      let c = Color16::from([p[0], p[1], p[2], p[3]]);
      let (lr, lg, lb, _a) = crate::alpha::unpremult_and_linearize(c, self.alpha_convention);
      indices.push(self.palette.closest(lr, lg, lb) as u8);
    }
    Ok(PalettedImage { indices, width: w, height: h, palette: self.palette.clone() })
  }

  /// The quantize interface: returns the configured palette verbatim for a
  /// caller that needs a palette chooser (e.g. an animated-image encoder),
  /// failing if the caller's capacity constraints can't be met.
  pub fn quantize(&self, max_colors: Option<usize>, required: &[Color16]) -> Result<Vec<Color16>, DitherError> {
    if let Some(max) = max_colors {
      if self.palette.len() > max {
        return Err(DitherError::QuantizeMismatch {
          reason: format!("caller allows at most {max} colors but the configured palette has {}", self.palette.len()),
        });
      }
    }
    for &req in required {
      let present = (0..self.palette.len()).any(|i| self.palette.srgb_at(i) == req);
      if !present {
        return Err(DitherError::QuantizeMismatch {
          reason: format!("required color {req:?} is not present in the configured palette"),
        });
      }
    }
    Ok((0..self.palette.len()).map(|i| self.palette.srgb_at(i)).collect())
  }

  /// Copies `src[src_pt .. src_pt + (rect.width, rect.height)]` into
  /// `dst[rect]`, then dithers only that sub-region in place. Mapper
  /// coordinates stay in `dst`'s coordinate space, so a tiled mapper (e.g.
  /// ordered dither) lines up with a destination drawn in multiple calls.
  pub fn draw(&self, dst: &mut RgbaImage, rect: Rect, src: &RgbaImage, src_pt: (u32, u32)) -> Result<(), DitherError> {
    tracing::debug!(?rect, "draw");
    for y in 0..rect.height {
      for x in 0..rect.width {
        let p = *src.get_pixel(src_pt.0 + x, src_pt.1 + y);
        dst.put_pixel(rect.x + x, rect.y + y, p);
      }
    }

    let mut colors = Vec::with_capacity((rect.width as usize) * (rect.height as usize));
    for y in 0..rect.height {
      for x in 0..rect.width {
        let p = dst.get_pixel(rect.x + x, rect.y + y);
        colors.push(Color16::from([p[0], p[1], p[2], p[3]]));
      }
    }

    let out = self.run(rect.width, rect.height, &colors, rect.x, rect.y)?;
    for y in 0..rect.height {
      for x in 0..rect.width {
        let c = out[(y * rect.width + x) as usize];
        dst.put_pixel(
          rect.x + x,
          rect.y + y,
          Rgba([color::narrow_16_to_8(c.r), color::narrow_16_to_8(c.g), color::narrow_16_to_8(c.b), color::narrow_16_to_8(c.a)]),
        );
      }
    }
    Ok(())
  }
}

fn image_to_colors(img: &RgbaImage) -> Vec<Color16> {
  img.pixels().map(|p| Color16::from([p[0], p[1], p[2], p[3]])).collect()
}

fn colors_to_image(colors: &[Color16], width: u32, height: u32) -> RgbaImage {
  let mut buf = RgbaImage::new(width, height);
  for (px, c) in buf.pixels_mut().zip(colors) {
    *px = Rgba([color::narrow_16_to_8(c.r), color::narrow_16_to_8(c.g), color::narrow_16_to_8(c.b), color::narrow_16_to_8(c.a)]);
  }
  buf
}

fn write_colors_into(img: &mut RgbaImage, colors: &[Color16]) {
  for (px, c) in img.pixels_mut().zip(colors) {
    *px = Rgba([color::narrow_16_to_8(c.r), color::narrow_16_to_8(c.g), color::narrow_16_to_8(c.b), color::narrow_16_to_8(c.a)]);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::bayer;
  use crate::map_driver::OrderedDither;
  use crate::matrices;

  fn black() -> Color16 {
    Color16::opaque(0, 0, 0)
  }
  fn white() -> Color16 {
    Color16::opaque(65535, 65535, 65535)
  }

  fn gradient_image(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, _y| {
      let v = ((x * 255) / (width - 1).max(1)) as u8;
      Rgba([v, v, v, 255])
    })
  }

  #[test]
  fn empty_palette_is_rejected() {
    assert!(matches!(Ditherer::new(vec![]), Err(DitherError::EmptyPalette)));
  }

  #[test]
  fn no_algorithm_is_a_configuration_fault() {
    let d = Ditherer::new(vec![black(), white()]).unwrap();
    let img = DynamicImage::ImageRgba8(gradient_image(4, 1));
    assert!(matches!(d.dither_copy(&img), Err(DitherError::InvalidConfiguration { .. })));
  }

  #[test]
  fn dither_and_dither_copy_are_pixelwise_identical() {
    let d = Ditherer::new(vec![black(), white()]).unwrap().with_matrix(matrices::floyd_steinberg());
    let img = gradient_image(64, 2);
    let via_copy = d.dither_copy(&DynamicImage::ImageRgba8(img.clone())).unwrap();
    let via_inplace = d.dither(DynamicImage::ImageRgba8(img)).unwrap();
    assert_eq!(via_copy, via_inplace);
  }

  #[test]
  fn non_rgba8_container_is_recovered_as_fresh_copy() {
    let d = Ditherer::new(vec![black(), white()]).unwrap().with_matrix(matrices::floyd_steinberg());
    let rgb = image::RgbImage::from_fn(8, 1, |x, _y| image::Rgb([(x * 32) as u8, (x * 32) as u8, (x * 32) as u8]));
    let out = d.dither(DynamicImage::ImageRgb8(rgb)).unwrap();
    assert_eq!(out.dimensions(), (8, 1));
    for p in out.pixels() {
      let c = Color16::from([p[0], p[1], p[2], p[3]]);
      assert!(c == black() || c == white());
    }
  }

  #[test]
  fn dither_paletted_rejects_oversized_palette() {
    let colors: Vec<Color16> = (0..=256u32).map(|i| Color16::opaque((i % 65536) as u16, 0, 0)).collect();
    let d = Ditherer::new(colors).unwrap().with_matrix(matrices::floyd_steinberg());
    let img = DynamicImage::ImageRgba8(gradient_image(4, 1));
    assert!(matches!(d.dither_paletted(&img), Err(DitherError::PaletteTooLarge { .. })));
  }

  #[test]
  fn dither_paletted_indices_resolve_back_to_palette_colors() {
    let d = Ditherer::new(vec![black(), white()]).unwrap().with_matrix(matrices::floyd_steinberg());
    let img = DynamicImage::ImageRgba8(gradient_image(32, 1));
    let paletted = d.dither_paletted(&img).unwrap();
    assert_eq!(paletted.indices.len(), 32);
    for &idx in &paletted.indices {
      assert!((idx as usize) < paletted.palette.len());
    }
  }

  #[test]
  fn quantize_returns_palette_verbatim() {
    let d = Ditherer::new(vec![black(), white()]).unwrap().with_matrix(matrices::floyd_steinberg());
    let got = d.quantize(None, &[]).unwrap();
    assert_eq!(got, vec![black(), white()]);
  }

  #[test]
  fn quantize_fails_when_caller_wants_fewer_colors_than_configured() {
    let d = Ditherer::new(vec![black(), white()]).unwrap().with_matrix(matrices::floyd_steinberg());
    assert!(matches!(d.quantize(Some(1), &[]), Err(DitherError::QuantizeMismatch { .. })));
  }

  #[test]
  fn quantize_fails_when_required_color_is_missing() {
    let d = Ditherer::new(vec![black(), white()]).unwrap().with_matrix(matrices::floyd_steinberg());
    let missing = Color16::opaque(12345, 6789, 1011);
    assert!(matches!(d.quantize(None, &[missing]), Err(DitherError::QuantizeMismatch { .. })));
  }

  #[test]
  fn draw_paints_and_dithers_only_the_sub_region() {
    let matrix = bayer::bayer_matrix(4, 4).unwrap();
    let mapper = OrderedDither::from_bayer(&matrix, 1.0);
    let d = Ditherer::new(vec![black(), white()]).unwrap().with_mapper(Box::new(mapper)).with_single_threaded(true);

    let src = gradient_image(8, 8);
    let mut dst = RgbaImage::from_pixel(8, 8, Rgba([200, 200, 200, 255]));
    let untouched_pixel = *dst.get_pixel(0, 4);

    d.draw(&mut dst, Rect { x: 0, y: 0, width: 8, height: 4 }, &src, (0, 0)).unwrap();

    for y in 0..4 {
      for x in 0..8 {
        let c = Color16::from([dst.get_pixel(x, y)[0], dst.get_pixel(x, y)[1], dst.get_pixel(x, y)[2], dst.get_pixel(x, y)[3]]);
        assert!(c == black() || c == white());
      }
    }
    // rows outside the drawn rect are untouched
    assert_eq!(*dst.get_pixel(0, 4), untouched_pixel);
  }

  #[test]
  fn transparent_regions_pass_through_bayer_and_opaque_regions_land_on_palette() {
    let matrix = bayer::bayer_matrix(4, 4).unwrap();
    let mapper = OrderedDither::from_bayer(&matrix, 1.0);
    let palette = vec![black(), white(), Color16::opaque(65535, 0, 0), Color16::opaque(0, 65535, 0), Color16::opaque(0, 0, 65535)];
    let d = Ditherer::new(palette).unwrap().with_mapper(Box::new(mapper)).with_single_threaded(true);

    let img = RgbaImage::from_fn(8, 2, |x, y| if y == 0 { Rgba([0, 0, 0, 0]) } else { Rgba([(x * 32) as u8, 10, 200, 255]) });
    let out = d.dither(DynamicImage::ImageRgba8(img.clone())).unwrap();

    for x in 0..8 {
      assert_eq!(*out.get_pixel(x, 0), image::Rgba([0, 0, 0, 0]), "fully transparent pixels must be unchanged");
      assert_eq!(out.get_pixel(x, 1)[3], 255, "alpha must be bit-identical to source");
    }
  }
}
