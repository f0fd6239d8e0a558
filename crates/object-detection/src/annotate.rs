//! Annotated preview rendering
//!
//! Draws each detection as a 2px box in a per-class color. When a
//! [`LabelFont`] is available, a filled tab with `"{class_name} {confidence}"`
//! is drawn above the box (or inside it when the box touches the top edge).

use crate::{Detection, ObjectDetectionError};
use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::path::Path;

const LINE_THICKNESS: u32 = 2;
const LABEL_PADDING: u32 = 2;

/// Ultralytics default palette
const PALETTE: [[u8; 3]; 20] = [
    [0xFF, 0x38, 0x38],
    [0xFF, 0x9D, 0x97],
    [0xFF, 0x70, 0x1F],
    [0xFF, 0xB2, 0x1D],
    [0xCF, 0xD2, 0x31],
    [0x48, 0xF9, 0x0A],
    [0x92, 0xCC, 0x17],
    [0x3D, 0xDB, 0x86],
    [0x1A, 0x93, 0x34],
    [0x00, 0xD4, 0xBB],
    [0x2C, 0x99, 0xA8],
    [0x00, 0xC2, 0xFF],
    [0x34, 0x45, 0x93],
    [0x64, 0x73, 0xFF],
    [0x00, 0x18, 0xEC],
    [0x84, 0x38, 0xFF],
    [0x52, 0x00, 0x85],
    [0xCB, 0x38, 0xFF],
    [0xFF, 0x95, 0xC8],
    [0xFF, 0x37, 0xC7],
];

/// TrueType font used for box labels
pub struct LabelFont {
    font: FontVec,
    scale: PxScale,
}

impl LabelFont {
    /// Load a `.ttf`/`.otf` file and render labels at `px` pixels
    ///
    /// # Errors
    ///
    /// Returns [`ObjectDetectionError::Font`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path, px: f32) -> Result<Self, ObjectDetectionError> {
        let data = std::fs::read(path)
            .map_err(|e| ObjectDetectionError::Font(format!("{}: {e}", path.display())))?;
        let font = FontVec::try_from_vec(data)
            .map_err(|e| ObjectDetectionError::Font(format!("{}: {e}", path.display())))?;
        Ok(Self {
            font,
            scale: PxScale::from(px),
        })
    }
}

/// Box color for a class id
#[must_use]
pub fn class_color(class_id: u32) -> Rgb<u8> {
    Rgb(PALETTE[class_id as usize % PALETTE.len()])
}

/// Draw `detections` onto a copy of `image`
#[must_use]
pub fn draw_detections(
    image: &RgbImage,
    detections: &[Detection],
    font: Option<&LabelFont>,
) -> RgbImage {
    let mut canvas = image.clone();
    let (img_w, img_h) = canvas.dimensions();

    for detection in detections {
        let color = class_color(detection.class_id);
        let bbox = detection.bbox;

        let x = bbox.x1.max(0);
        let y = bbox.y1.max(0);
        let w = (bbox.width() + 1).min(img_w.saturating_sub(x.unsigned_abs()));
        let h = (bbox.height() + 1).min(img_h.saturating_sub(y.unsigned_abs()));
        if w == 0 || h == 0 {
            continue;
        }

        for t in 0..LINE_THICKNESS {
            let inner_w = w.saturating_sub(2 * t);
            let inner_h = h.saturating_sub(2 * t);
            if inner_w > 0 && inner_h > 0 {
                let offset = t as i32;
                let rect = Rect::at(x + offset, y + offset).of_size(inner_w, inner_h);
                draw_hollow_rect_mut(&mut canvas, rect, color);
            }
        }

        if let Some(font) = font {
            let label = format!("{} {:.2}", detection.class_name, detection.confidence);
            draw_label(&mut canvas, font, &label, x, y, color);
        }
    }

    canvas
}

fn draw_label(
    canvas: &mut RgbImage,
    font: &LabelFont,
    label: &str,
    x: i32,
    y: i32,
    color: Rgb<u8>,
) {
    let (text_w, text_h) = text_size(font.scale, &font.font, label);
    let tab_w = text_w + 2 * LABEL_PADDING;
    let tab_h = text_h + 2 * LABEL_PADDING;

    // Above the box when there is room, otherwise inside its top edge
    let tab_y = if y >= tab_h as i32 { y - tab_h as i32 } else { y };

    draw_filled_rect_mut(canvas, Rect::at(x, tab_y).of_size(tab_w, tab_h), color);
    draw_text_mut(
        canvas,
        Rgb([255, 255, 255]),
        x + LABEL_PADDING as i32,
        tab_y + LABEL_PADDING as i32,
        font.scale,
        &font.font,
        label,
    );
}
