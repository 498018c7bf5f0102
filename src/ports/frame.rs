//! Reference vision adapter over captured frames
//!
//! Keeps the latest RGBA frame per window (pushed by whatever grabs the
//! emulator's screen) and answers template queries with normalized
//! cross-correlation. Text queries go to an optional [`TextRecognizer`].

use std::collections::HashMap;
use std::path::PathBuf;

use image::{GrayImage, ImageBuffer, RgbaImage};
use imageproc::template_matching::{find_extremes, match_template, MatchTemplateMethod};

use super::{Match, Point, VisionError, VisionPort, WindowId};

/// OCR backend: words found in a frame with their centers
pub trait TextRecognizer {
    fn read_words(&mut self, frame: &RgbaImage) -> Vec<(String, Point)>;
}

/// Frame store plus template matcher
pub struct FrameVision {
    /// Latest frame per window
    frames: HashMap<WindowId, RgbaImage>,
    /// Grayscale templates by name
    templates: HashMap<String, GrayImage>,
    /// Directory templates are lazily loaded from
    template_dir: Option<PathBuf>,
    /// Optional OCR backend
    text: Option<Box<dyn TextRecognizer>>,
    /// Frames received so far
    frame_count: u64,
}

impl FrameVision {
    pub fn new() -> Self {
        Self {
            frames: HashMap::new(),
            templates: HashMap::new(),
            template_dir: None,
            text: None,
            frame_count: 0,
        }
    }

    /// Load missing templates from `dir/<name>` on first use
    pub fn with_template_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.template_dir = Some(dir.into());
        self
    }

    pub fn with_text_recognizer(mut self, recognizer: Box<dyn TextRecognizer>) -> Self {
        self.text = Some(recognizer);
        self
    }

    /// Store a new raw RGBA frame for `window`
    pub fn update(
        &mut self,
        window: &WindowId,
        frame_data: &[u8],
        width: u32,
        height: u32,
    ) -> Result<(), VisionError> {
        let expected_size = (width as usize) * (height as usize) * 4;
        if frame_data.len() != expected_size {
            return Err(VisionError::InvalidFrameData);
        }

        let image: RgbaImage = ImageBuffer::from_raw(width, height, frame_data.to_vec())
            .ok_or(VisionError::InvalidFrameData)?;

        self.frames.insert(window.clone(), image);
        self.frame_count += 1;
        Ok(())
    }

    /// Store an already decoded frame
    pub fn update_image(&mut self, window: &WindowId, frame: RgbaImage) {
        self.frames.insert(window.clone(), frame);
        self.frame_count += 1;
    }

    /// Register a template under `name`
    pub fn insert_template(&mut self, name: impl Into<String>, template: GrayImage) {
        self.templates.insert(name.into(), template);
    }

    pub fn has_frame(&self, window: &WindowId) -> bool {
        self.frames.contains_key(window)
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn template(&mut self, name: &str) -> Result<&GrayImage, VisionError> {
        if !self.templates.contains_key(name) {
            let dir = self
                .template_dir
                .as_ref()
                .ok_or_else(|| VisionError::TemplateNotFound(name.to_string()))?;
            let path = dir.join(name);
            if !path.is_file() {
                return Err(VisionError::TemplateNotFound(path.display().to_string()));
            }
            let loaded = image::open(&path)
                .map_err(|e| VisionError::ImageProcessingError(format!("{}: {}", path.display(), e)))?
                .to_luma8();
            log::debug!("Loaded template {} ({}x{})", name, loaded.width(), loaded.height());
            self.templates.insert(name.to_string(), loaded);
        }
        self.templates
            .get(name)
            .ok_or_else(|| VisionError::TemplateNotFound(name.to_string()))
    }
}

impl Default for FrameVision {
    fn default() -> Self {
        Self::new()
    }
}

impl VisionPort for FrameVision {
    fn find_image(
        &mut self,
        window: &WindowId,
        template: &str,
        threshold: f32,
    ) -> Result<Option<Match>, VisionError> {
        let Some(frame) = self.frames.get(window) else {
            return Ok(None);
        };
        let gray = image::imageops::grayscale(frame);
        let tpl = self.template(template)?;

        if tpl.width() == 0
            || tpl.height() == 0
            || tpl.width() > gray.width()
            || tpl.height() > gray.height()
        {
            return Ok(None);
        }

        let scores = match_template(&gray, tpl, MatchTemplateMethod::CrossCorrelationNormalized);
        let extremes = find_extremes(&scores);

        if extremes.max_value.is_nan() || extremes.max_value < threshold {
            return Ok(None);
        }

        let (mx, my) = extremes.max_value_location;
        Ok(Some(Match {
            x: (mx + tpl.width() / 2) as i32,
            y: (my + tpl.height() / 2) as i32,
            confidence: extremes.max_value,
        }))
    }

    fn find_text(&mut self, window: &WindowId, text: &str) -> Result<Option<Point>, VisionError> {
        let (Some(frame), Some(reader)) = (self.frames.get(window), self.text.as_mut()) else {
            return Ok(None);
        };
        let needle = text.to_lowercase();
        Ok(reader
            .read_words(frame)
            .into_iter()
            .find(|(word, _)| word.to_lowercase().contains(&needle))
            .map(|(_, p)| p))
    }

    fn invalidate(&mut self, window: &WindowId) {
        self.frames.remove(window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgba};

    fn frame_with_cross(cx: u32, cy: u32) -> RgbaImage {
        RgbaImage::from_fn(40, 40, |x, y| {
            let on_cross = (x == cx && y.abs_diff(cy) <= 3) || (y == cy && x.abs_diff(cx) <= 3);
            if on_cross {
                Rgba([200, 200, 200, 255])
            } else {
                Rgba([10, 10, 10, 255])
            }
        })
    }

    fn cross_template() -> GrayImage {
        GrayImage::from_fn(8, 8, |x, y| {
            if (x == 4 && y >= 1 && y <= 7) || (y == 4 && x >= 1 && x <= 7) {
                Luma([200])
            } else {
                Luma([10])
            }
        })
    }

    #[test]
    fn test_frame_update() {
        let mut vision = FrameVision::new();
        let window = WindowId::new("emu");

        let frame_data = vec![255u8; 10 * 10 * 4];
        assert!(vision.update(&window, &frame_data, 10, 10).is_ok());
        assert!(vision.has_frame(&window));
        assert_eq!(vision.frame_count(), 1);
    }

    #[test]
    fn test_invalid_frame_data() {
        let mut vision = FrameVision::new();
        let result = vision.update(&WindowId::new("emu"), &[255u8; 100], 10, 10);
        assert!(matches!(result, Err(VisionError::InvalidFrameData)));
    }

    #[test]
    fn test_template_found_at_cross() {
        let mut vision = FrameVision::new();
        let window = WindowId::new("emu");
        vision.update_image(&window, frame_with_cross(20, 15));
        vision.insert_template("cross", cross_template());

        let found = vision.find_image(&window, "cross", 0.9).unwrap().unwrap();
        assert_eq!((found.x, found.y), (20, 15));
        assert!(found.confidence > 0.99);
    }

    #[test]
    fn test_template_below_threshold() {
        let mut vision = FrameVision::new();
        let window = WindowId::new("emu");
        vision.update_image(&window, RgbaImage::from_pixel(40, 40, Rgba([10, 10, 10, 255])));
        vision.insert_template("cross", cross_template());

        assert!(!vision.detect_image(&window, "cross", 0.8).unwrap());
    }

    #[test]
    fn test_missing_template_is_an_error() {
        let mut vision = FrameVision::new();
        let window = WindowId::new("emu");
        vision.update_image(&window, frame_with_cross(20, 15));
        assert!(matches!(
            vision.find_image(&window, "nope", 0.8),
            Err(VisionError::TemplateNotFound(_))
        ));
    }

    #[test]
    fn test_missing_template_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut vision = FrameVision::new().with_template_dir(dir.path().to_path_buf());
        let window = WindowId::new("emu");
        vision.update_image(&window, frame_with_cross(20, 15));
        assert!(matches!(
            vision.find_image(&window, "typo.png", 0.8),
            Err(VisionError::TemplateNotFound(_))
        ));
    }

    #[test]
    fn test_text_without_recognizer() {
        let mut vision = FrameVision::new();
        let window = WindowId::new("emu");
        vision.update_image(&window, frame_with_cross(20, 15));
        assert!(!vision.detect_text(&window, "OK").unwrap());
    }
}
