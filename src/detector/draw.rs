use anyhow::Result;
use image::{DynamicImage, GenericImageView, RgbaImage};
use raqote::{DrawOptions, DrawTarget, LineJoin, PathBuilder, SolidSource, Source, StrokeStyle};

use crate::detector::bounds::Detection;

// 按类别循环使用的框颜色 (r, g, b)
const PALETTE: [(u8, u8, u8); 10] = [
    (0x00, 0xFF, 0xFF),
    (0xFF, 0x38, 0x38),
    (0xFF, 0x9D, 0x97),
    (0xFF, 0x70, 0x1F),
    (0xFF, 0xB2, 0x1D),
    (0xCF, 0xD2, 0x31),
    (0x48, 0xF9, 0x0A),
    (0x1A, 0x93, 0x34),
    (0x00, 0xC2, 0xFF),
    (0x34, 0x45, 0xFF),
];

fn class_color(class_id: usize) -> SolidSource {
    let (r, g, b) = PALETTE[class_id % PALETTE.len()];
    SolidSource { r, g, b, a: 0xFF }
}

/// 在图像上绘制检测结果
///
/// 每个检测框按类别使用不同颜色描边，线宽随图像尺寸变化。
///
/// # 参数
/// * `image` - 原始图像
/// * `detections` - 检测结果列表
///
/// # 返回值
/// 返回绘制了检测框的RGBA图像
pub fn draw_detections(image: &DynamicImage, detections: &[Detection]) -> Result<DynamicImage> {
    let (img_width, img_height) = image.dimensions();
    let mut dt = DrawTarget::new(img_width as i32, img_height as i32);

    // raqote 使用预乘后的 ARGB
    let image_data: Vec<u32> = image
        .to_rgba8()
        .pixels()
        .map(|pixel| {
            let [r, g, b, a] = pixel.0;
            let premul = |c: u8| ((c as u32 * a as u32 + 127) / 255) as u8;
            u32::from_le_bytes([premul(b), premul(g), premul(r), a])
        })
        .collect();

    let img = raqote::Image {
        width: img_width as i32,
        height: img_height as i32,
        data: &image_data,
    };
    dt.draw_image_at(0.0, 0.0, &img, &DrawOptions::new());

    let line_width = (img_width.max(img_height) as f32 / 320.0).max(2.0);

    for detection in detections {
        let bbox = &detection.bbox;

        let mut pb = PathBuilder::new();
        pb.rect(bbox.x1, bbox.y1, bbox.width(), bbox.height());
        let path = pb.finish();

        dt.stroke(
            &path,
            &Source::Solid(class_color(detection.class_id)),
            &StrokeStyle {
                join: LineJoin::Round,
                width: line_width,
                ..StrokeStyle::default()
            },
            &DrawOptions::default(),
        );
    }

    let pixels: Vec<u8> = dt
        .get_data()
        .iter()
        .flat_map(|&pixel| {
            let [b, g, r, a] = pixel.to_le_bytes();
            let unpremul = |c: u8| if a == 0 { 0 } else { ((c as u32 * 255 + a as u32 / 2) / a as u32).min(255) as u8 };
            [unpremul(r), unpremul(g), unpremul(b), a]
        })
        .collect();

    let buffer = RgbaImage::from_raw(img_width, img_height, pixels)
        .ok_or_else(|| anyhow::anyhow!("无法由绘制结果创建图像"))?;

    Ok(DynamicImage::ImageRgba8(buffer))
}
