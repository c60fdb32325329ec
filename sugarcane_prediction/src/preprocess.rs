//! Conversion of decoded bitmaps into the model input tensor.
//!
//! The deployed model takes a single NHWC image of shape `[1, 224, 224, 3]`,
//! channels in R, G, B order. Images that are not already square at the
//! target side are scaled straight to it without preserving the aspect ratio,
//! so non-square photographs come out stretched.

use crate::error::DecodeError;
use image::{imageops, imageops::FilterType, DynamicImage, RgbImage};
use ndarray::{Array4, ArrayView4};
use serde::Deserialize;
use std::{io::Cursor, num::NonZeroU32};

/// Square input side of the packaged model.
pub const MODEL_INPUT_SIZE: NonZeroU32 = match NonZeroU32::new(224) {
    Some(size) => size,
    None => panic!("model input size must be non-zero"),
};

const RGB_CHANNELS: usize = 3;

/// A decoded RGB bitmap with 8-bit channels and at least one pixel.
#[derive(Debug, Clone)]
pub struct RawImage {
    pixels: RgbImage,
}

impl RawImage {
    /// Decodes an encoded image (PNG, JPEG), guessing the container format.
    pub fn from_bytes(data: &[u8]) -> Result<Self, DecodeError> {
        let image_reader = image::ImageReader::new(Cursor::new(data)).with_guessed_format()?;
        let decoded = image_reader.decode()?;
        Self::try_from(decoded)
    }

    /// Wraps a tightly packed row-major RGB buffer.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self, DecodeError> {
        if width == 0 || height == 0 {
            return Err(DecodeError::Empty { width, height });
        }
        let expected = width as usize * height as usize * RGB_CHANNELS;
        let actual = data.len();
        if actual != expected {
            return Err(DecodeError::BufferLength { expected, actual });
        }
        RgbImage::from_raw(width, height, data)
            .map(|pixels| Self { pixels })
            .ok_or(DecodeError::BufferLength { expected, actual })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn as_rgb(&self) -> &RgbImage {
        &self.pixels
    }
}

impl TryFrom<RgbImage> for RawImage {
    type Error = DecodeError;

    fn try_from(pixels: RgbImage) -> Result<Self, Self::Error> {
        let (width, height) = pixels.dimensions();
        if width == 0 || height == 0 {
            return Err(DecodeError::Empty { width, height });
        }
        Ok(Self { pixels })
    }
}

impl TryFrom<DynamicImage> for RawImage {
    type Error = DecodeError;

    fn try_from(image: DynamicImage) -> Result<Self, Self::Error> {
        Self::try_from(image.to_rgb8())
    }
}

/// Numeric convention of the tensor values. It has to match the convention
/// the model was trained with; a mismatch still yields a well-formed tensor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Normalization {
    /// Channel intensity divided by 255, values in `[0, 1]`.
    #[default]
    Unit,
    /// Channel intensity as is, values in `[0, 255]`.
    Raw,
}

impl Normalization {
    pub fn apply(self, intensity: u8) -> f32 {
        match self {
            Normalization::Unit => intensity as f32 / 255.0,
            Normalization::Raw => intensity as f32,
        }
    }

    /// Inclusive bounds every tensor value falls into.
    pub fn range(self) -> (f32, f32) {
        match self {
            Normalization::Unit => (0.0, 1.0),
            Normalization::Raw => (0.0, 255.0),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeFilter {
    /// Non-interpolated scaling.
    #[default]
    Nearest,
    Bilinear,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Bilinear => FilterType::Triangle,
        }
    }
}

/// Model input of logical shape `[1, S, S, 3]`, always in standard layout.
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    data: Array4<f32>,
}

impl InputTensor {
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.data.view()
    }

    /// Values in row-major pixel order, R, G, B per pixel.
    pub fn iter(&self) -> impl Iterator<Item = &f32> + '_ {
        self.data.iter()
    }

    pub fn to_vec(&self) -> Vec<f32> {
        self.data.iter().copied().collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preprocessor {
    target_size: NonZeroU32,
    normalization: Normalization,
    filter: ResizeFilter,
}

impl Preprocessor {
    pub fn new(target_size: NonZeroU32, normalization: Normalization, filter: ResizeFilter) -> Self {
        Self {
            target_size,
            normalization,
            filter,
        }
    }

    /// Preprocessor for the packaged model's input side.
    pub fn for_model(normalization: Normalization, filter: ResizeFilter) -> Self {
        Self::new(MODEL_INPUT_SIZE, normalization, filter)
    }

    pub fn target_size(&self) -> NonZeroU32 {
        self.target_size
    }

    pub fn normalization(&self) -> Normalization {
        self.normalization
    }

    pub fn filter(&self) -> ResizeFilter {
        self.filter
    }

    pub fn preprocess(&self, image: &RawImage) -> InputTensor {
        preprocess(image, self.target_size, self.normalization, self.filter)
    }

    pub fn preprocess_bytes(&self, image_data: &[u8]) -> Result<InputTensor, DecodeError> {
        let image = RawImage::from_bytes(image_data)?;
        Ok(self.preprocess(&image))
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::for_model(Normalization::default(), ResizeFilter::default())
    }
}

pub fn preprocess(
    image: &RawImage,
    target_size: NonZeroU32,
    normalization: Normalization,
    filter: ResizeFilter,
) -> InputTensor {
    let side = target_size.get();
    let resized;
    let pixels = if image.width() == side && image.height() == side {
        image.as_rgb()
    } else {
        resized = imageops::resize(image.as_rgb(), side, side, filter.into());
        &resized
    };

    let side = side as usize;
    let data = Array4::from_shape_fn((1, side, side, RGB_CHANNELS), |(_, y, x, c)| {
        normalization.apply(pixels.get_pixel(x as u32, y as u32)[c])
    });

    InputTensor { data }
}
