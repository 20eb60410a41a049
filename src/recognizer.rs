//! Text recognition for attached images
//!
//! Extracting event details from a flyer or screenshot starts with
//! pulling whatever text the image carries. Recognition is best
//! effort by contract: implementations return whatever they found,
//! possibly nothing, and never fail the turn.

use std::path::Path;

/// Recognition boundary consumed by the image intake flow
pub trait TextRecognizer: Send + Sync {
    /// Returns text recognized in the image, or an empty string
    ///
    /// Never errors: an unreadable or textless image yields `""` and
    /// the caller proceeds with empty context.
    fn recognize_text(&self, image: &Path) -> String;
}

/// Sidecar-file recognizer
///
/// Looks for recognized text in a `.txt` file next to the image
/// (`flyer.png` reads `flyer.txt`), after verifying the image itself
/// decodes. This keeps the recognition seam exercised end to end
/// without bundling an OCR engine.
pub struct SidecarRecognizer;

impl SidecarRecognizer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SidecarRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextRecognizer for SidecarRecognizer {
    fn recognize_text(&self, image: &Path) -> String {
        if let Err(e) = image::open(image) {
            tracing::warn!("Could not decode image {}: {}", image.display(), e);
            return String::new();
        }

        let sidecar = image.with_extension("txt");
        match std::fs::read_to_string(&sidecar) {
            Ok(text) => {
                tracing::debug!(
                    "Recognized {} bytes of text from {}",
                    text.len(),
                    sidecar.display()
                );
                text.trim().to_string()
            }
            Err(_) => {
                tracing::debug!("No recognized text sidecar at {}", sidecar.display());
                String::new()
            }
        }
    }
}

/// Recognizer returning a fixed string, for tests
pub struct StaticRecognizer {
    text: String,
}

impl StaticRecognizer {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

impl TextRecognizer for StaticRecognizer {
    fn recognize_text(&self, _image: &Path) -> String {
        self.text.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use tempfile::TempDir;

    fn write_test_image(dir: &TempDir, name: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let img = ImageBuffer::from_pixel(4, 4, Rgb::<u8>([255, 255, 255]));
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn test_sidecar_text_is_read() {
        let dir = TempDir::new().unwrap();
        let image_path = write_test_image(&dir, "flyer.png");
        std::fs::write(dir.path().join("flyer.txt"), "CONCERT\nJune 15 7pm\n").unwrap();

        let recognizer = SidecarRecognizer::new();
        assert_eq!(
            recognizer.recognize_text(&image_path),
            "CONCERT\nJune 15 7pm"
        );
    }

    #[test]
    fn test_missing_sidecar_yields_empty() {
        let dir = TempDir::new().unwrap();
        let image_path = write_test_image(&dir, "flyer.png");

        let recognizer = SidecarRecognizer::new();
        assert_eq!(recognizer.recognize_text(&image_path), "");
    }

    #[test]
    fn test_undecodable_image_yields_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("not_an_image.png");
        std::fs::write(&path, b"plain text, not pixels").unwrap();
        std::fs::write(dir.path().join("not_an_image.txt"), "should be ignored").unwrap();

        let recognizer = SidecarRecognizer::new();
        assert_eq!(recognizer.recognize_text(&path), "");
    }

    #[test]
    fn test_missing_image_yields_empty() {
        let recognizer = SidecarRecognizer::new();
        assert_eq!(
            recognizer.recognize_text(Path::new("/nonexistent/flyer.png")),
            ""
        );
    }

    #[test]
    fn test_static_recognizer() {
        let recognizer = StaticRecognizer::new("MEETING NOTES");
        assert_eq!(
            recognizer.recognize_text(Path::new("anything.png")),
            "MEETING NOTES"
        );
    }
}
