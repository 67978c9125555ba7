//! Image decoding and resizing.
//!
//! Images are materialized as `u8` tensors in `(channels, height, width)`
//! layout. The channel count follows the decoded color layout: 1 for gray,
//! 2 for gray with alpha, 3 for RGB and 4 for RGBA. Higher bit depths are
//! reduced to 8 bits.

use image::{imageops::FilterType, DynamicImage, ImageReader};
use imtext_core::{ImTextError, Result};
use ndarray::Array3;
use std::path::Path;

/// An image in `(channels, height, width)` layout.
pub type ImageTensor = Array3<u8>;

/// Configuration for image processing.
#[derive(Debug, Clone)]
pub struct ImageProcessorConfig {
    /// Square edge length images are resized to.
    pub size: u32,
    /// Resampling filter.
    pub filter: FilterType,
}

impl Default for ImageProcessorConfig {
    fn default() -> Self {
        Self {
            size: 300,
            // Bilinear
            filter: FilterType::Triangle,
        }
    }
}

/// Loads images from disk and resizes them to a fixed square.
#[derive(Debug, Clone)]
pub struct ImageProcessor {
    config: ImageProcessorConfig,
}

impl ImageProcessor {
    /// Create a new processor.
    pub fn new(config: ImageProcessorConfig) -> Self {
        Self { config }
    }

    /// Create a processor for `size x size` output with the default filter.
    pub fn with_size(size: u32) -> Self {
        Self::new(ImageProcessorConfig {
            size,
            ..Default::default()
        })
    }

    /// Load and preprocess an image from file.
    ///
    /// The format is detected from the file content, not its extension.
    pub fn preprocess(&self, image_path: impl AsRef<Path>) -> Result<ImageTensor> {
        let img = decode_image(image_path.as_ref())?;
        self.process_image(img)
    }

    /// Resize a decoded image and convert it to a tensor.
    pub fn process_image(&self, img: DynamicImage) -> Result<ImageTensor> {
        let size = self.config.size;
        let resized = img.resize_exact(size, size, self.config.filter);
        image_to_tensor(&resized)
    }

    /// Get the config.
    pub fn config(&self) -> &ImageProcessorConfig {
        &self.config
    }
}

/// Decode the image at `path`.
pub fn decode_image(path: &Path) -> Result<DynamicImage> {
    if !path.is_file() {
        return Err(ImTextError::ImageNotFound(path.to_path_buf()));
    }

    ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| ImTextError::ImageDecode(format!("{}: {}", path.display(), e)))
}

/// Convert an image to a `(channels, height, width)` tensor.
pub fn image_to_tensor(img: &DynamicImage) -> Result<ImageTensor> {
    let color = img.color();
    let channels = color.channel_count() as usize;
    let (width, height) = (img.width() as usize, img.height() as usize);

    let interleaved = match channels {
        1 => img.to_luma8().into_raw(),
        2 => img.to_luma_alpha8().into_raw(),
        3 => img.to_rgb8().into_raw(),
        4 => img.to_rgba8().into_raw(),
        n => {
            return Err(ImTextError::ImageDecode(format!(
                "unsupported channel count {} ({:?})",
                n, color
            )))
        }
    };

    let hwc = Array3::from_shape_vec((height, width, channels), interleaved).map_err(|e| {
        ImTextError::ImageDecode(format!("pixel buffer does not match image size: {}", e))
    })?;

    Ok(hwc.permuted_axes([2, 0, 1]).as_standard_layout().into_owned())
}

/// Convert a tensor back to an image, e.g. to save an augmented preview.
pub fn tensor_to_image(tensor: &ImageTensor) -> Result<DynamicImage> {
    let (channels, height, width) = tensor.dim();
    let raw: Vec<u8> = tensor
        .view()
        .permuted_axes([1, 2, 0])
        .iter()
        .copied()
        .collect();
    let (w, h) = (width as u32, height as u32);

    let img = match channels {
        1 => image::GrayImage::from_raw(w, h, raw).map(DynamicImage::ImageLuma8),
        2 => image::GrayAlphaImage::from_raw(w, h, raw).map(DynamicImage::ImageLumaA8),
        3 => image::RgbImage::from_raw(w, h, raw).map(DynamicImage::ImageRgb8),
        4 => image::RgbaImage::from_raw(w, h, raw).map(DynamicImage::ImageRgba8),
        _ => None,
    };

    img.ok_or_else(|| ImTextError::ShapeMismatch {
        expected: vec![3, height, width],
        actual: vec![channels, height, width],
    })
}
