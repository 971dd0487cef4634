use ab_glyph::{FontArc, PxScale};
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use shared::Detection;
use std::path::{Path, PathBuf};

use crate::config::AnnotationConfig;

const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

const BANNER_POSITION: (i32, i32) = (10, 8);
const BANNER_SCALE: f32 = 28.0;
const BANNER_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);

const BOX_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);
const CAPTION_SCALE: f32 = 18.0;

/// Burns labels and face boxes into result images.
#[derive(Clone)]
pub struct Annotator {
    font: Option<FontArc>,
}

impl Annotator {
    pub fn new(font: Option<FontArc>) -> Self {
        Self { font }
    }

    /// Loads the configured font, or the first system font found. Without a
    /// font only boxes are drawn.
    pub fn from_config(config: &AnnotationConfig) -> Self {
        let candidates: Vec<PathBuf> = match &config.font_path {
            Some(path) => vec![path.clone()],
            None => FONT_CANDIDATES.iter().map(PathBuf::from).collect(),
        };

        for path in &candidates {
            match load_font(path) {
                Some(font) => {
                    log::info!("Annotation font loaded from {}", path.display());
                    return Self::new(Some(font));
                }
                None => log::debug!("No usable font at {}", path.display()),
            }
        }

        log::warn!("No annotation font available; labels will not be drawn as text");
        Self::new(None)
    }

    /// Writes `label` in red at a fixed spot in the top-left corner.
    pub fn annotate_label(&self, image: &DynamicImage, label: &str) -> DynamicImage {
        let mut canvas = image.to_rgba8();
        if let Some(font) = &self.font {
            let (x, y) = BANNER_POSITION;
            draw_text_mut(&mut canvas, BANNER_COLOR, x, y, PxScale::from(BANNER_SCALE), font, label);
        }
        restore_color_type(image, canvas)
    }

    /// Draws a box and a `"{label} {proba}"` caption for every detection.
    pub fn annotate_detections(&self, image: &DynamicImage, detections: &[Detection]) -> DynamicImage {
        let mut canvas = image.to_rgba8();
        for detection in detections {
            let Some(bounds) = &detection.bounds else {
                continue;
            };
            if bounds.width() == 0 || bounds.height() == 0 {
                continue;
            }

            let rect = Rect::at(bounds.xmin, bounds.ymin).of_size(bounds.width(), bounds.height());
            draw_hollow_rect_mut(&mut canvas, rect, BOX_COLOR);

            if let Some(font) = &self.font {
                let caption = match detection.emo_proba {
                    Some(proba) => format!("{} {:.2}", detection.emo_label, proba),
                    None => detection.emo_label.clone(),
                };
                let y = (bounds.ymin - CAPTION_SCALE as i32 - 2).max(0);
                draw_text_mut(
                    &mut canvas,
                    BOX_COLOR,
                    bounds.xmin.max(0),
                    y,
                    PxScale::from(CAPTION_SCALE),
                    font,
                    &caption,
                );
            }
        }
        restore_color_type(image, canvas)
    }
}

fn load_font(path: &Path) -> Option<FontArc> {
    let bytes = std::fs::read(path).ok()?;
    FontArc::try_from_vec(bytes).ok()
}

fn restore_color_type(original: &DynamicImage, canvas: RgbaImage) -> DynamicImage {
    let annotated = DynamicImage::ImageRgba8(canvas);
    if original.color().has_alpha() {
        annotated
    } else {
        DynamicImage::ImageRgb8(annotated.to_rgb8())
    }
}
