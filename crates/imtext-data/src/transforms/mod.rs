//! Randomized image augmentation.
//!
//! Transforms draw their random parameters from the caller's RNG on every
//! call, so the same image augments differently each time it is read.

pub mod functional;

use crate::image_processing::ImageTensor;
use imtext_core::{ImTextError, Result};
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use std::fmt;

/// A single image transformation.
pub trait Transform: fmt::Debug + Send + Sync {
    /// Apply the transformation.
    fn apply(&self, image: ImageTensor, rng: &mut dyn RngCore) -> Result<ImageTensor>;
}

fn check_probability(p: f64) -> Result<f64> {
    if (0.0..=1.0).contains(&p) {
        Ok(p)
    } else {
        Err(ImTextError::InvalidArgument(format!(
            "probability must be in [0, 1], got {}",
            p
        )))
    }
}

/// Posterize with probability `p`.
#[derive(Debug, Clone)]
pub struct RandomPosterize {
    bits: u8,
    p: f64,
}

impl RandomPosterize {
    /// Keep `bits` bits per channel (0 to 8), applied with probability `p`.
    pub fn new(bits: u8, p: f64) -> Result<Self> {
        if bits > 8 {
            return Err(ImTextError::InvalidArgument(format!(
                "posterize bits must be at most 8, got {}",
                bits
            )));
        }
        Ok(Self {
            bits,
            p: check_probability(p)?,
        })
    }
}

impl Transform for RandomPosterize {
    fn apply(&self, mut image: ImageTensor, rng: &mut dyn RngCore) -> Result<ImageTensor> {
        if rng.gen_bool(self.p) {
            functional::posterize(&mut image, self.bits);
        }
        Ok(image)
    }
}

/// Adjust sharpness by a fixed factor with probability `p`.
#[derive(Debug, Clone)]
pub struct RandomAdjustSharpness {
    factor: f32,
    p: f64,
}

impl RandomAdjustSharpness {
    /// Create the transform. `factor` must be non-negative.
    pub fn new(factor: f32, p: f64) -> Result<Self> {
        if factor.is_nan() || factor < 0.0 {
            return Err(ImTextError::InvalidArgument(format!(
                "sharpness factor must be non-negative, got {}",
                factor
            )));
        }
        Ok(Self {
            factor,
            p: check_probability(p)?,
        })
    }
}

impl Transform for RandomAdjustSharpness {
    fn apply(&self, mut image: ImageTensor, rng: &mut dyn RngCore) -> Result<ImageTensor> {
        if rng.gen_bool(self.p) {
            functional::adjust_sharpness(&mut image, self.factor);
        }
        Ok(image)
    }
}

/// Rotate by an angle drawn uniformly from a degree range.
#[derive(Debug, Clone)]
pub struct RandomRotation {
    min_degrees: f32,
    max_degrees: f32,
    fill: u8,
}

impl RandomRotation {
    /// Rotate by an angle in `[min_degrees, max_degrees]`, filling with 0.
    pub fn new(min_degrees: f32, max_degrees: f32) -> Result<Self> {
        if min_degrees > max_degrees {
            return Err(ImTextError::InvalidArgument(format!(
                "rotation range is empty: ({}, {})",
                min_degrees, max_degrees
            )));
        }
        Ok(Self {
            min_degrees,
            max_degrees,
            fill: 0,
        })
    }

    /// Value written to pixels the rotation uncovers.
    pub fn with_fill(mut self, fill: u8) -> Self {
        self.fill = fill;
        self
    }
}

impl Transform for RandomRotation {
    fn apply(&self, image: ImageTensor, rng: &mut dyn RngCore) -> Result<ImageTensor> {
        let angle = rng.gen_range(self.min_degrees..=self.max_degrees);
        Ok(functional::rotate(&image, angle, self.fill))
    }
}

/// Randomly change brightness, contrast, saturation and hue.
///
/// Enabled adjustments run in a freshly shuffled order on every call.
#[derive(Debug, Clone, Default)]
pub struct ColorJitter {
    brightness: Option<(f32, f32)>,
    contrast: Option<(f32, f32)>,
    saturation: Option<(f32, f32)>,
    hue: Option<(f32, f32)>,
}

fn factor_range(name: &str, amount: f32) -> Result<(f32, f32)> {
    if amount.is_nan() || amount < 0.0 {
        return Err(ImTextError::InvalidArgument(format!(
            "{} jitter must be non-negative, got {}",
            name, amount
        )));
    }
    Ok(((1.0 - amount).max(0.0), 1.0 + amount))
}

#[derive(Debug, Clone, Copy)]
enum Jitter {
    Brightness(f32),
    Contrast(f32),
    Saturation(f32),
    Hue(f32),
}

impl ColorJitter {
    /// A jitter with every adjustment disabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Brightness factor drawn from `[max(0, 1 - amount), 1 + amount]`.
    pub fn with_brightness(mut self, amount: f32) -> Result<Self> {
        self.brightness = Some(factor_range("brightness", amount)?);
        Ok(self)
    }

    /// Contrast factor drawn from `[max(0, 1 - amount), 1 + amount]`.
    pub fn with_contrast(mut self, amount: f32) -> Result<Self> {
        self.contrast = Some(factor_range("contrast", amount)?);
        Ok(self)
    }

    /// Saturation factor drawn from `[max(0, 1 - amount), 1 + amount]`.
    pub fn with_saturation(mut self, amount: f32) -> Result<Self> {
        self.saturation = Some(factor_range("saturation", amount)?);
        Ok(self)
    }

    /// Hue shift drawn from `[-amount, amount]`, `amount` at most 0.5.
    pub fn with_hue(mut self, amount: f32) -> Result<Self> {
        if !(0.0..=0.5).contains(&amount) {
            return Err(ImTextError::InvalidArgument(format!(
                "hue jitter must be in [0, 0.5], got {}",
                amount
            )));
        }
        self.hue = Some((-amount, amount));
        Ok(self)
    }

    fn sample(&self, rng: &mut dyn RngCore) -> Vec<Jitter> {
        let mut ops = Vec::with_capacity(4);
        if let Some((lo, hi)) = self.brightness {
            ops.push(Jitter::Brightness(rng.gen_range(lo..=hi)));
        }
        if let Some((lo, hi)) = self.contrast {
            ops.push(Jitter::Contrast(rng.gen_range(lo..=hi)));
        }
        if let Some((lo, hi)) = self.saturation {
            ops.push(Jitter::Saturation(rng.gen_range(lo..=hi)));
        }
        if let Some((lo, hi)) = self.hue {
            ops.push(Jitter::Hue(rng.gen_range(lo..=hi)));
        }
        ops.shuffle(rng);
        ops
    }
}

impl Transform for ColorJitter {
    fn apply(&self, mut image: ImageTensor, rng: &mut dyn RngCore) -> Result<ImageTensor> {
        for op in self.sample(rng) {
            match op {
                Jitter::Brightness(f) => functional::adjust_brightness(&mut image, f),
                Jitter::Contrast(f) => functional::adjust_contrast(&mut image, f),
                Jitter::Saturation(f) => functional::adjust_saturation(&mut image, f),
                Jitter::Hue(shift) => functional::adjust_hue(&mut image, shift),
            }
        }
        Ok(image)
    }
}

/// Autocontrast with probability `p`.
#[derive(Debug, Clone)]
pub struct RandomAutocontrast {
    p: f64,
}

impl RandomAutocontrast {
    /// Create the transform.
    pub fn new(p: f64) -> Result<Self> {
        Ok(Self {
            p: check_probability(p)?,
        })
    }
}

impl Transform for RandomAutocontrast {
    fn apply(&self, mut image: ImageTensor, rng: &mut dyn RngCore) -> Result<ImageTensor> {
        if rng.gen_bool(self.p) {
            functional::autocontrast(&mut image);
        }
        Ok(image)
    }
}

/// Transforms applied in sequence, each to the previous one's output.
#[derive(Debug, Default)]
pub struct Compose {
    transforms: Vec<Box<dyn Transform>>,
}

impl Compose {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transform.
    pub fn then<T: Transform + 'static>(mut self, transform: T) -> Self {
        self.transforms.push(Box::new(transform));
        self
    }

    /// Number of transforms.
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    /// Check if the pipeline has no transforms.
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// The transforms, in application order.
    pub fn transforms(&self) -> &[Box<dyn Transform>] {
        &self.transforms
    }
}

impl Transform for Compose {
    fn apply(&self, image: ImageTensor, rng: &mut dyn RngCore) -> Result<ImageTensor> {
        self.transforms
            .iter()
            .try_fold(image, |img, transform| transform.apply(img, rng))
    }
}

/// The default augmentation pipeline.
///
/// 1. posterize to 3 bits, p = 0.4
/// 2. sharpness factor 0.5, p = 0.5
/// 3. rotation in [-10, 20] degrees
/// 4. color jitter: brightness 0.2, hue 0.1
/// 5. autocontrast, p = 0.5
pub fn default_pipeline() -> Compose {
    Compose::new()
        .then(RandomPosterize { bits: 3, p: 0.4 })
        .then(RandomAdjustSharpness {
            factor: 0.5,
            p: 0.5,
        })
        .then(RandomRotation {
            min_degrees: -10.0,
            max_degrees: 20.0,
            fill: 0,
        })
        .then(ColorJitter {
            brightness: Some((0.8, 1.2)),
            hue: Some((-0.1, 0.1)),
            ..Default::default()
        })
        .then(RandomAutocontrast { p: 0.5 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sample_image(channels: usize) -> ImageTensor {
        ImageTensor::from_shape_fn((channels, 16, 16), |(c, y, x)| {
            (c * 40 + y * 9 + x * 5) as u8
        })
    }

    #[test]
    fn test_default_pipeline_order() {
        let pipeline = default_pipeline();
        assert_eq!(pipeline.len(), 5);

        let names: Vec<String> = pipeline
            .transforms()
            .iter()
            .map(|t| format!("{:?}", t))
            .collect();
        assert!(names[0].starts_with("RandomPosterize"));
        assert!(names[1].starts_with("RandomAdjustSharpness"));
        assert!(names[2].starts_with("RandomRotation"));
        assert!(names[3].starts_with("ColorJitter"));
        assert!(names[4].starts_with("RandomAutocontrast"));
    }

    #[test]
    fn test_pipeline_preserves_shape() {
        let pipeline = default_pipeline();
        let mut rng = StdRng::seed_from_u64(7);
        for channels in 1..=4 {
            let out = pipeline.apply(sample_image(channels), &mut rng).unwrap();
            assert_eq!(out.shape(), &[channels, 16, 16]);
        }
    }

    #[test]
    fn test_pipeline_deterministic_for_seed() {
        let pipeline = default_pipeline();
        let a = pipeline
            .apply(sample_image(3), &mut StdRng::seed_from_u64(11))
            .unwrap();
        let b = pipeline
            .apply(sample_image(3), &mut StdRng::seed_from_u64(11))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_probability_bounds() {
        let mut rng = StdRng::seed_from_u64(0);
        let img = sample_image(3);

        let never = RandomPosterize::new(1, 0.0).unwrap();
        assert_eq!(never.apply(img.clone(), &mut rng).unwrap(), img);

        let always = RandomPosterize::new(1, 1.0).unwrap();
        let out = always.apply(img, &mut rng).unwrap();
        assert!(out.iter().all(|&v| v == 0 || v == 128));
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(RandomPosterize::new(9, 0.5).is_err());
        assert!(RandomPosterize::new(3, 1.5).is_err());
        assert!(RandomAdjustSharpness::new(-1.0, 0.5).is_err());
        assert!(RandomRotation::new(20.0, -10.0).is_err());
        assert!(ColorJitter::new().with_hue(0.7).is_err());
        assert!(ColorJitter::new().with_brightness(-0.1).is_err());
    }

    #[test]
    fn test_zero_degree_rotation_range() {
        let rotation = RandomRotation::new(0.0, 0.0).unwrap();
        let img = sample_image(3);
        let out = rotation
            .apply(img.clone(), &mut StdRng::seed_from_u64(3))
            .unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn test_jitter_factor_ranges() {
        let jitter = ColorJitter::new()
            .with_brightness(0.2)
            .unwrap()
            .with_hue(0.1)
            .unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..100 {
            let ops = jitter.sample(&mut rng);
            assert_eq!(ops.len(), 2);
            for op in ops {
                match op {
                    Jitter::Brightness(f) => assert!((0.8..=1.2).contains(&f)),
                    Jitter::Hue(h) => assert!((-0.1..=0.1).contains(&h)),
                    other => panic!("unexpected jitter {:?}", other),
                }
            }
        }
    }

    #[test]
    fn test_jitter_leaves_alpha() {
        let jitter = ColorJitter::new()
            .with_brightness(0.9)
            .unwrap()
            .with_hue(0.5)
            .unwrap();
        let img = sample_image(4);
        let out = jitter
            .apply(img.clone(), &mut StdRng::seed_from_u64(9))
            .unwrap();
        assert_eq!(
            out.index_axis(ndarray::Axis(0), 3),
            img.index_axis(ndarray::Axis(0), 3)
        );
    }

    #[test]
    fn test_empty_compose_is_identity() {
        let img = sample_image(2);
        let out = Compose::new()
            .apply(img.clone(), &mut StdRng::seed_from_u64(1))
            .unwrap();
        assert_eq!(out, img);
    }
}
