//! Text recognition on raster images.

#[cfg(feature = "ocr")]
mod engine;

#[cfg(feature = "ocr")]
pub use engine::OnnxOcrEngine;

use image::DynamicImage;

use crate::error::OcrError;

/// Boxes whose tops are within this many pixels share a line.
const LINE_HEIGHT: f32 = 20.0;

/// A recognized piece of text and its axis-aligned box.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBox {
    /// `(min_x, min_y, max_x, max_y)` in image pixels, y pointing down.
    pub rect: (f32, f32, f32, f32),
    pub text: String,
    pub confidence: f32,
}

/// Anything that can turn an image into text boxes.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<TextBox>, OcrError>;
}

/// Join boxes in reading order: lines top to bottom, boxes left to right
/// within a line.
pub fn reading_order_text(mut boxes: Vec<TextBox>) -> String {
    let line_of = |b: &TextBox| (b.rect.1 / LINE_HEIGHT) as i64;
    boxes.sort_by(|a, b| {
        line_of(a)
            .cmp(&line_of(b))
            .then(a.rect.0.total_cmp(&b.rect.0))
    });

    let mut lines: Vec<(i64, Vec<&str>)> = Vec::new();
    for b in &boxes {
        let text = b.text.trim();
        if text.is_empty() {
            continue;
        }
        match lines.last_mut() {
            Some((line, words)) if *line == line_of(b) => words.push(text),
            _ => lines.push((line_of(b), vec![text])),
        }
    }

    lines
        .into_iter()
        .map(|(_, words)| words.join(" "))
        .collect::<Vec<_>>()
        .join("\n")
}
