use crate::domain::model::Detection;
use image::{DynamicImage, Rgb, RgbImage};

const BOX_THICKNESS: u32 = 2;

const PALETTE: [[u8; 3]; 6] = [
    [255, 56, 56],
    [56, 255, 56],
    [56, 56, 255],
    [255, 178, 29],
    [207, 210, 49],
    [255, 55, 199],
];

/// 同一類別永遠使用同一顏色
pub fn label_color(label: &str) -> Rgb<u8> {
    let hash = label
        .bytes()
        .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
    Rgb(PALETTE[hash % PALETTE.len()])
}

/// 在影像副本上畫出偵測框
pub fn draw_detections(image: &DynamicImage, detections: &[Detection]) -> RgbImage {
    let mut canvas = image.to_rgb8();
    for detection in detections {
        draw_box(&mut canvas, detection.bbox, label_color(&detection.label));
    }
    canvas
}

fn draw_box(canvas: &mut RgbImage, bbox: [f32; 4], color: Rgb<u8>) {
    let (width, height) = canvas.dimensions();
    if width == 0 || height == 0 {
        return;
    }

    // 座標裁切至影像範圍內
    let clamp = |v: f32, max: u32| -> u32 {
        if v.is_nan() || v <= 0.0 {
            0
        } else {
            (v as u32).min(max - 1)
        }
    };
    let x0 = clamp(bbox[0].min(bbox[2]), width);
    let x1 = clamp(bbox[0].max(bbox[2]), width);
    let y0 = clamp(bbox[1].min(bbox[3]), height);
    let y1 = clamp(bbox[1].max(bbox[3]), height);

    for t in 0..BOX_THICKNESS {
        let top = (y0 + t).min(y1);
        let bottom = y1.saturating_sub(t).max(y0);
        for x in x0..=x1 {
            canvas.put_pixel(x, top, color);
            canvas.put_pixel(x, bottom, color);
        }

        let left = (x0 + t).min(x1);
        let right = x1.saturating_sub(t).max(x0);
        for y in y0..=y1 {
            canvas.put_pixel(left, y, color);
            canvas.put_pixel(right, y, color);
        }
    }
}
