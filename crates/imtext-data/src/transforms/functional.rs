//! Deterministic image operations behind the random transforms.
//!
//! Every function takes a `(channels, height, width)` tensor. Color
//! operations leave a trailing alpha channel (2- and 4-channel images)
//! untouched.

use crate::image_processing::ImageTensor;

const MAX_VALUE: f32 = 255.0;

/// Number of leading channels that carry color, excluding alpha.
pub fn color_channels(image: &ImageTensor) -> usize {
    match image.dim().0 {
        2 => 1,
        4 => 3,
        n => n,
    }
}

#[inline]
fn to_u8(v: f32) -> u8 {
    v.round().clamp(0.0, MAX_VALUE) as u8
}

/// Keep only the `bits` most significant bits of every color value.
pub fn posterize(image: &mut ImageTensor, bits: u8) {
    if bits >= 8 {
        return;
    }
    let mask = !((1u16 << (8 - bits)) - 1) as u8;
    let colors = color_channels(image);
    for c in 0..colors {
        image
            .index_axis_mut(ndarray::Axis(0), c)
            .mapv_inplace(|v| v & mask);
    }
}

/// Blend each color channel with its 3x3 smoothed version.
///
/// A factor of 0 gives the smoothed image, 1 the original, and values above
/// 1 sharpen. Border pixels keep their original value in the smoothed image,
/// and images with a side of 2 pixels or less are returned unchanged.
pub fn adjust_sharpness(image: &mut ImageTensor, factor: f32) {
    let (_, height, width) = image.dim();
    if height <= 2 || width <= 2 {
        return;
    }

    const KERNEL: [[f32; 3]; 3] = [[1.0, 1.0, 1.0], [1.0, 5.0, 1.0], [1.0, 1.0, 1.0]];
    const KERNEL_SUM: f32 = 13.0;

    for c in 0..color_channels(image) {
        let original = image.index_axis(ndarray::Axis(0), c).to_owned();
        let mut channel = image.index_axis_mut(ndarray::Axis(0), c);

        for y in 1..height - 1 {
            for x in 1..width - 1 {
                let mut acc = 0.0;
                for (ky, row) in KERNEL.iter().enumerate() {
                    for (kx, weight) in row.iter().enumerate() {
                        acc += weight * original[[y + ky - 1, x + kx - 1]] as f32;
                    }
                }
                let blurred = (acc / KERNEL_SUM).round();
                let value = original[[y, x]] as f32;
                channel[[y, x]] = to_u8(factor * value + (1.0 - factor) * blurred);
            }
        }
    }
}

/// Rotate counter-clockwise by `degrees` around the image center.
///
/// Nearest-neighbor sampling, output keeps the input size, and pixels that
/// map outside the source are set to `fill` on every channel.
pub fn rotate(image: &ImageTensor, degrees: f32, fill: u8) -> ImageTensor {
    let (channels, height, width) = image.dim();
    let (sin, cos) = degrees.to_radians().sin_cos();
    let cx = (width as f32 - 1.0) / 2.0;
    let cy = (height as f32 - 1.0) / 2.0;

    let mut out = ImageTensor::from_elem((channels, height, width), fill);
    for y in 0..height {
        for x in 0..width {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            let sx = (cx + dx * cos - dy * sin).round();
            let sy = (cy + dx * sin + dy * cos).round();
            if sx < 0.0 || sy < 0.0 || sx >= width as f32 || sy >= height as f32 {
                continue;
            }
            let (sx, sy) = (sx as usize, sy as usize);
            for c in 0..channels {
                out[[c, y, x]] = image[[c, sy, sx]];
            }
        }
    }
    out
}

/// Scale every color value by `factor`.
pub fn adjust_brightness(image: &mut ImageTensor, factor: f32) {
    for c in 0..color_channels(image) {
        image
            .index_axis_mut(ndarray::Axis(0), c)
            .mapv_inplace(|v| to_u8(v as f32 * factor));
    }
}

fn luminance(r: f32, g: f32, b: f32) -> f32 {
    0.299 * r + 0.587 * g + 0.114 * b
}

/// Blend the image with its mean gray level.
pub fn adjust_contrast(image: &mut ImageTensor, factor: f32) {
    let colors = color_channels(image);
    let (_, height, width) = image.dim();
    if height == 0 || width == 0 {
        return;
    }

    let mean = if colors >= 3 {
        let mut sum = 0.0;
        for y in 0..height {
            for x in 0..width {
                sum += luminance(
                    image[[0, y, x]] as f32,
                    image[[1, y, x]] as f32,
                    image[[2, y, x]] as f32,
                );
            }
        }
        sum / (height * width) as f32
    } else {
        image
            .index_axis(ndarray::Axis(0), 0)
            .iter()
            .map(|&v| v as f32)
            .sum::<f32>()
            / (height * width) as f32
    };

    for c in 0..colors {
        image
            .index_axis_mut(ndarray::Axis(0), c)
            .mapv_inplace(|v| to_u8(factor * v as f32 + (1.0 - factor) * mean));
    }
}

/// Blend each pixel with its own gray level. No-op below three color channels.
pub fn adjust_saturation(image: &mut ImageTensor, factor: f32) {
    if color_channels(image) < 3 {
        return;
    }
    let (_, height, width) = image.dim();
    for y in 0..height {
        for x in 0..width {
            let rgb = [
                image[[0, y, x]] as f32,
                image[[1, y, x]] as f32,
                image[[2, y, x]] as f32,
            ];
            let gray = luminance(rgb[0], rgb[1], rgb[2]);
            for (c, v) in rgb.iter().enumerate() {
                image[[c, y, x]] = to_u8(factor * v + (1.0 - factor) * gray);
            }
        }
    }
}

/// Shift hue by `shift` turns of the color wheel, in `[-0.5, 0.5]`.
///
/// No-op below three color channels.
pub fn adjust_hue(image: &mut ImageTensor, shift: f32) {
    if color_channels(image) < 3 || shift == 0.0 {
        return;
    }
    let (_, height, width) = image.dim();
    for y in 0..height {
        for x in 0..width {
            let (h, s, v) = rgb_to_hsv(
                image[[0, y, x]] as f32 / MAX_VALUE,
                image[[1, y, x]] as f32 / MAX_VALUE,
                image[[2, y, x]] as f32 / MAX_VALUE,
            );
            let (r, g, b) = hsv_to_rgb((h + shift).rem_euclid(1.0), s, v);
            image[[0, y, x]] = to_u8(r * MAX_VALUE);
            image[[1, y, x]] = to_u8(g * MAX_VALUE);
            image[[2, y, x]] = to_u8(b * MAX_VALUE);
        }
    }
}

/// Stretch each color channel so its minimum maps to 0 and maximum to 255.
///
/// Constant channels are left as they are.
pub fn autocontrast(image: &mut ImageTensor) {
    for c in 0..color_channels(image) {
        let mut channel = image.index_axis_mut(ndarray::Axis(0), c);
        let (lo, hi) = channel
            .iter()
            .fold((u8::MAX, u8::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        if hi <= lo {
            continue;
        }
        let scale = MAX_VALUE / (hi - lo) as f32;
        channel.mapv_inplace(|v| to_u8((v - lo) as f32 * scale));
    }
}

/// RGB in `[0, 1]` to (hue in turns, saturation, value).
pub fn rgb_to_hsv(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let s = if max > 0.0 { delta / max } else { 0.0 };
    let h = if delta == 0.0 {
        0.0
    } else if max == r {
        ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        (b - r) / delta + 2.0
    } else {
        (r - g) / delta + 4.0
    };

    (h / 6.0, s, max)
}

/// Inverse of [`rgb_to_hsv`].
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (f32, f32, f32) {
    let h6 = h.rem_euclid(1.0) * 6.0;
    let sector = h6.floor();
    let f = h6 - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));

    match sector as u32 % 6 {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb(height: usize, width: usize, pixel: [u8; 3]) -> ImageTensor {
        ImageTensor::from_shape_fn((3, height, width), |(c, _, _)| pixel[c])
    }

    #[test]
    fn test_posterize_three_bits() {
        let mut img = rgb(2, 2, [0b1011_0111, 255, 31]);
        posterize(&mut img, 3);
        assert_eq!(img[[0, 0, 0]], 0b1010_0000);
        assert_eq!(img[[1, 1, 1]], 0b1110_0000);
        assert_eq!(img[[2, 0, 1]], 0);
    }

    #[test]
    fn test_posterize_keeps_alpha() {
        let mut img = ImageTensor::from_elem((4, 2, 2), 0b0111_1111);
        posterize(&mut img, 1);
        assert_eq!(img[[0, 0, 0]], 0);
        assert_eq!(img[[3, 0, 0]], 0b0111_1111);
    }

    #[test]
    fn test_sharpness_identity_and_uniform() {
        let original = ImageTensor::from_shape_fn((1, 5, 5), |(_, y, x)| (y * 40 + x * 7) as u8);
        let mut img = original.clone();
        adjust_sharpness(&mut img, 1.0);
        assert_eq!(img, original);

        let mut flat = rgb(4, 4, [90, 90, 90]);
        adjust_sharpness(&mut flat, 0.5);
        assert!(flat.iter().all(|&v| v == 90));
    }

    #[test]
    fn test_sharpness_smooths_spike_and_keeps_border() {
        let mut img = ImageTensor::zeros((1, 3, 3));
        img[[0, 1, 1]] = 130;
        img[[0, 0, 0]] = 200;
        adjust_sharpness(&mut img, 0.0);
        // Center: (5 * 130 + 200) / 13 = 65.38
        assert_eq!(img[[0, 1, 1]], 65);
        assert_eq!(img[[0, 0, 0]], 200);
    }

    #[test]
    fn test_rotate_zero_is_identity() {
        let img = ImageTensor::from_shape_fn((3, 4, 6), |(c, y, x)| (c * 50 + y * 6 + x) as u8);
        assert_eq!(rotate(&img, 0.0, 0), img);
    }

    #[test]
    fn test_rotate_quarter_turn_counter_clockwise() {
        // Marker right of center moves above center.
        let mut img = ImageTensor::zeros((1, 3, 3));
        img[[0, 1, 2]] = 255;
        let out = rotate(&img, 90.0, 0);
        assert_eq!(out[[0, 0, 1]], 255);
        assert_eq!(out[[0, 1, 2]], 0);
    }

    #[test]
    fn test_rotate_fills_corners() {
        let img = ImageTensor::from_elem((2, 9, 9), 200);
        let out = rotate(&img, 45.0, 0);
        assert_eq!(out[[0, 0, 0]], 0);
        assert_eq!(out[[1, 0, 0]], 0);
        assert_eq!(out[[0, 4, 4]], 200);
    }

    #[test]
    fn test_brightness() {
        let mut img = rgb(1, 2, [100, 200, 0]);
        adjust_brightness(&mut img, 1.2);
        assert_eq!(img[[0, 0, 0]], 120);
        assert_eq!(img[[1, 0, 0]], 240);

        adjust_brightness(&mut img, 2.0);
        assert_eq!(img[[1, 0, 1]], 255);
    }

    #[test]
    fn test_contrast_zero_gives_mean() {
        let mut img = ImageTensor::from_shape_vec((1, 1, 2), vec![0, 200]).unwrap();
        adjust_contrast(&mut img, 0.0);
        assert_eq!(img[[0, 0, 0]], 100);
        assert_eq!(img[[0, 0, 1]], 100);
    }

    #[test]
    fn test_saturation_zero_is_gray() {
        let mut img = rgb(1, 1, [255, 0, 0]);
        adjust_saturation(&mut img, 0.0);
        let gray = to_u8(0.299 * 255.0);
        assert_eq!(img[[0, 0, 0]], gray);
        assert_eq!(img[[1, 0, 0]], gray);
        assert_eq!(img[[2, 0, 0]], gray);
    }

    #[test]
    fn test_hue_rotates_red_to_green() {
        let mut img = rgb(1, 1, [255, 0, 0]);
        adjust_hue(&mut img, 1.0 / 3.0);
        assert_eq!(img[[0, 0, 0]], 0);
        assert_eq!(img[[1, 0, 0]], 255);
        assert_eq!(img[[2, 0, 0]], 0);
    }

    #[test]
    fn test_hue_skips_gray_images() {
        let mut img = ImageTensor::from_elem((1, 2, 2), 77);
        adjust_hue(&mut img, 0.25);
        assert!(img.iter().all(|&v| v == 77));
    }

    #[test]
    fn test_hsv_round_trip() {
        for &(r, g, b) in &[(0.2, 0.4, 0.6), (0.9, 0.1, 0.5), (0.3, 0.3, 0.3)] {
            let (h, s, v) = rgb_to_hsv(r, g, b);
            let (r2, g2, b2) = hsv_to_rgb(h, s, v);
            assert!((r - r2).abs() < 1e-5);
            assert!((g - g2).abs() < 1e-5);
            assert!((b - b2).abs() < 1e-5);
        }
    }

    #[test]
    fn test_autocontrast_stretches_each_channel() {
        let mut img = ImageTensor::from_shape_vec(
            (2, 1, 3),
            vec![
                50, 100, 150, // stretched to 0..255
                10, 10, 10, // constant, untouched
            ],
        )
        .unwrap();
        autocontrast(&mut img);
        assert_eq!(img[[0, 0, 0]], 0);
        assert_eq!(img[[0, 0, 1]], 128);
        assert_eq!(img[[0, 0, 2]], 255);
        // Two channels means gray + alpha: alpha is not stretched.
        assert_eq!(img[[1, 0, 0]], 10);
    }
}
