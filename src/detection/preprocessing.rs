use image::{DynamicImage, Rgb, RgbImage};
use image::imageops::{self, FilterType};
use rten_tensor::NdTensor;

/// Gray used by YOLO letterboxing
const PAD_VALUE: u8 = 114;

/// How a frame was fitted into the square model input
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
}

impl Letterbox {
    pub fn for_size(width: u32, height: u32, target: u32) -> Self {
        let scale = (target as f32 / width as f32).min(target as f32 / height as f32);
        let scaled_w = (width as f32 * scale).round();
        let scaled_h = (height as f32 * scale).round();
        Self {
            scale,
            pad_x: ((target as f32 - scaled_w) / 2.0).floor(),
            pad_y: ((target as f32 - scaled_h) / 2.0).floor(),
        }
    }

    /// Map a center/size box from model space back to frame pixels
    pub fn unmap(&self, cx: f32, cy: f32, w: f32, h: f32) -> (f32, f32, f32, f32) {
        (
            (cx - self.pad_x) / self.scale,
            (cy - self.pad_y) / self.scale,
            w / self.scale,
            h / self.scale,
        )
    }
}

/// Resize keeping aspect ratio and center on a gray square canvas
pub fn letterbox(img: &DynamicImage, target: u32) -> (RgbImage, Letterbox) {
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();
    let lb = Letterbox::for_size(width, height, target);

    let scaled_w = ((width as f32 * lb.scale).round() as u32).clamp(1, target);
    let scaled_h = ((height as f32 * lb.scale).round() as u32).clamp(1, target);
    let scaled = imageops::resize(&rgb, scaled_w, scaled_h, FilterType::Triangle);

    let mut canvas = RgbImage::from_pixel(target, target, Rgb([PAD_VALUE; 3]));
    imageops::overlay(&mut canvas, &scaled, lb.pad_x as i64, lb.pad_y as i64);

    (canvas, lb)
}

/// NCHW float tensor in [0, 1]
pub fn to_input_tensor(img: &RgbImage) -> NdTensor<f32, 4> {
    let (width, height) = img.dimensions();
    let (w, h) = (width as usize, height as usize);
    let mut data = vec![0.0f32; 3 * w * h];

    for (x, y, pixel) in img.enumerate_pixels() {
        let offset = y as usize * w + x as usize;
        for c in 0..3 {
            data[c * w * h + offset] = pixel[c] as f32 / 255.0;
        }
    }

    NdTensor::from_data([1, 3, h, w], data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rten_tensor::prelude::*;

    #[test]
    fn test_letterbox_wide_frame() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(1280, 720, Rgb([255, 0, 0])));
        let (canvas, lb) = letterbox(&img, 640);

        assert_eq!(canvas.dimensions(), (640, 640));
        assert_eq!(lb.scale, 0.5);
        assert_eq!(lb.pad_x, 0.0);
        assert_eq!(lb.pad_y, 140.0);
        assert_eq!(canvas.get_pixel(320, 10), &Rgb([PAD_VALUE; 3]));
        assert_eq!(canvas.get_pixel(320, 320), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_unmap_inverts_letterbox() {
        let lb = Letterbox::for_size(1280, 720, 640);
        let (cx, cy, w, h) = lb.unmap(320.0, 320.0, 50.0, 100.0);
        assert_eq!((cx, cy, w, h), (640.0, 360.0, 100.0, 200.0));
    }

    #[test]
    fn test_tensor_is_planar() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(1, 0, Rgb([255, 0, 51]));
        let tensor = to_input_tensor(&img);
        assert_eq!(tensor.shape(), [1, 3, 1, 2]);
        assert_eq!(tensor[[0, 0, 0, 1]], 1.0);
        assert_eq!(tensor[[0, 1, 0, 1]], 0.0);
        assert!((tensor[[0, 2, 0, 1]] - 0.2).abs() < 1e-6);
    }
}
