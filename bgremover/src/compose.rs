use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma, Rgb, RgbImage, Rgba, RgbaImage};
use ndarray::Array2;

/// Raw network output, indexed `[y, x]`, at the network's working resolution.
pub type Prediction = Array2<f32>;

/// Foreground confidence in [0, 1] at image resolution.
pub type Mask = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Min-max normalize a prediction into [0, 1].
///
/// There is no fixed threshold, so the result is relative to this image only.
/// A constant (or empty, or all non-finite) prediction has no contrast to
/// stretch and becomes all zeros. Non-finite values map to 0.
pub fn normalize(pred: &Prediction) -> Array2<f32> {
	let mut min_v = f32::INFINITY;
	let mut max_v = f32::NEG_INFINITY;
	for &v in pred.iter().filter(|v| v.is_finite()) {
		min_v = min_v.min(v);
		max_v = max_v.max(v);
	}

	let range = max_v - min_v;
	if !range.is_finite() || range <= 0.0 {
		return Array2::zeros(pred.raw_dim());
	}

	pred.mapv(|v| if v.is_finite() { ((v - min_v) / range).clamp(0.0, 1.0) } else { 0.0 })
}

/// Resize a normalized mask to `width x height` with Lanczos3.
///
/// Lanczos rings past the input range near hard edges, so values are clamped back to [0, 1].
pub fn upscale(mask: &Array2<f32>, width: u32, height: u32) -> Mask {
	let (h, w) = mask.dim();
	if h == 0 || w == 0 {
		return Mask::new(width, height);
	}

	let small = Mask::from_fn(w as u32, h as u32, |x, y| Luma([mask[[y as usize, x as usize]]]));
	let mut big = if (w as u32, h as u32) == (width, height) {
		small
	} else {
		imageops::resize(&small, width, height, FilterType::Lanczos3)
	};
	for p in big.pixels_mut() {
		p.0[0] = p.0[0].clamp(0.0, 1.0);
	}
	big
}

/// RGB copied unchanged, alpha = round(mask * 255).
pub fn apply_alpha(img: &RgbImage, mask: &Mask) -> RgbaImage {
	let (w, h) = img.dimensions();
	debug_assert_eq!(mask.dimensions(), (w, h));

	RgbaImage::from_fn(w, h, |x, y| {
		let p = img.get_pixel(x, y);
		let a = mask.get_pixel(x, y)[0];
		Rgba([p[0], p[1], p[2], to_alpha(a)])
	})
}

/// Full compositing step: normalize, upscale to the source size, write alpha.
///
/// The result always has the dimensions of `img`, whatever resolution the
/// prediction came out at.
pub fn composite(img: &RgbImage, pred: &Prediction) -> RgbaImage {
	let normalized = normalize(pred);
	let mask = upscale(&normalized, img.width(), img.height());
	apply_alpha(img, &mask)
}

/// Alpha-blend onto an opaque background color, dropping transparency.
pub fn flatten_onto(img: &RgbaImage, bg: [u8; 3]) -> RgbImage {
	let [bg_r, bg_g, bg_b] = bg;
	RgbImage::from_fn(img.width(), img.height(), |x, y| {
		let p = img.get_pixel(x, y);
		let a = p[3] as u32;
		let inv = 255u32 - a;

		let r = (p[0] as u32 * a + bg_r as u32 * inv + 127) / 255;
		let g = (p[1] as u32 * a + bg_g as u32 * inv + 127) / 255;
		let b = (p[2] as u32 * a + bg_b as u32 * inv + 127) / 255;

		Rgb([r as u8, g as u8, b as u8])
	})
}

fn to_alpha(v: f32) -> u8 {
	(v.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
	use ndarray::array;

	use super::*;

	#[test]
	fn normalize_stretches_to_unit_range() {
		let pred = array![[2.0f32, 4.0], [6.0, 10.0]];
		let n = normalize(&pred);
		assert_eq!(n[[0, 0]], 0.0);
		assert_eq!(n[[1, 1]], 1.0);
		assert!((n[[0, 1]] - 0.25).abs() < 1e-6);
	}

	#[test]
	fn constant_prediction_becomes_zero_mask() {
		let pred = Array2::from_elem((320, 320), 0.7f32);
		let n = normalize(&pred);
		assert!(n.iter().all(|&v| v == 0.0));

		let img = RgbImage::from_pixel(5, 7, Rgb([1, 2, 3]));
		let out = composite(&img, &pred);
		assert!(out.pixels().all(|p| p[3] == 0));
	}

	#[test]
	fn nan_values_do_not_poison_the_mask() {
		let pred = array![[f32::NAN, 0.0], [0.5, 1.0]];
		let n = normalize(&pred);
		assert_eq!(n[[0, 0]], 0.0);
		assert_eq!(n[[1, 1]], 1.0);
		assert!(n.iter().all(|v| v.is_finite()));
	}

	#[test]
	fn output_keeps_source_dimensions() {
		let pred = Array2::from_shape_fn((320, 320), |(y, x)| (x + y) as f32);
		for &(w, h) in &[(1u32, 1u32), (640, 480), (333, 1001), (320, 320)] {
			let img = RgbImage::from_pixel(w, h, Rgb([9, 9, 9]));
			let out = composite(&img, &pred);
			assert_eq!(out.dimensions(), (w, h));
		}
	}

	#[test]
	fn rgb_channels_pass_through() {
		let img = RgbImage::from_fn(8, 4, |x, y| Rgb([x as u8, y as u8, 200]));
		let pred = Array2::from_shape_fn((2, 2), |(_, x)| x as f32);
		let out = composite(&img, &pred);
		for (x, y, p) in out.enumerate_pixels() {
			assert_eq!([p[0], p[1], p[2]], [x as u8, y as u8, 200]);
		}
	}

	#[test]
	fn alpha_rounds_to_nearest() {
		assert_eq!(to_alpha(0.5), 128);
		assert_eq!(to_alpha(1.0), 255);
		assert_eq!(to_alpha(-0.2), 0);
		assert_eq!(to_alpha(1.3), 255);
	}

	#[test]
	fn upscale_stays_in_unit_range() {
		let mut m = Array2::zeros((4, 4));
		m[[1, 1]] = 1.0;
		m[[2, 2]] = 1.0;
		let big = upscale(&m, 37, 23);
		assert_eq!(big.dimensions(), (37, 23));
		assert!(big.pixels().all(|p| (0.0..=1.0).contains(&p[0])));
	}

	#[test]
	fn flatten_blends_with_background() {
		let mut img = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 0, 0]));
		img.put_pixel(1, 0, Rgba([10, 20, 30, 255]));
		let flat = flatten_onto(&img, [255, 255, 255]);
		assert_eq!(flat.get_pixel(0, 0).0, [255, 255, 255]);
		assert_eq!(flat.get_pixel(1, 0).0, [10, 20, 30]);
	}
}
