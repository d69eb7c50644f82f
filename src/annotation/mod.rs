pub mod voc;

use std::path::Path;

use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::models::{AnnotationDocument, DetectionRecord, Frame, ImageSize, ObjectEntry, FRAME_DEPTH};

pub use voc::{to_xml, write_document};

/// Turns normalized sidecars into pixel-space VOC documents
#[derive(Debug, Clone)]
pub struct AnnotationFormatter {
    /// Label written for every object, whatever the sidecar's class id
    pub label: String,
    /// Emit `<folder>` and `<path>`; these tie the document to the output location
    pub include_location: bool,
}

impl AnnotationFormatter {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            include_location: false,
        }
    }

    pub fn with_location(mut self, include_location: bool) -> Self {
        self.include_location = include_location;
        self
    }

    /// Build the document for `frame_image` from its sidecar.
    /// Dimensions are read from the image file itself.
    pub fn format(&self, sidecar: &Path, frame_image: &Path) -> Result<AnnotationDocument> {
        let text = std::fs::read_to_string(sidecar)?;
        let (width, height) =
            image::image_dimensions(frame_image).map_err(|source| PipelineError::ImageRead {
                path: frame_image.to_path_buf(),
                source,
            })?;

        let size = ImageSize {
            width,
            height,
            depth: FRAME_DEPTH,
        };
        let filename = frame_image
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut doc = self.format_text(&text, &filename, size);
        if self.include_location {
            doc.folder = frame_image
                .parent()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned());
            doc.path = Some(frame_image.to_string_lossy().into_owned());
        }

        Ok(doc)
    }

    /// Pure conversion from sidecar text and known frame size
    pub fn format_text(&self, sidecar_text: &str, filename: &str, size: ImageSize) -> AnnotationDocument {
        let mut doc = AnnotationDocument::new(filename, size);

        for (line_no, line) in sidecar_text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match DetectionRecord::parse_line(line) {
                Some(record) => {
                    let bndbox = record.to_pixel_box(size.width, size.height);
                    doc.objects.push(ObjectEntry::new(self.label.clone(), bndbox));
                }
                None => {
                    debug!("{}: skipping malformed line {}: {:?}", filename, line_no + 1, line);
                }
            }
        }

        doc
    }

    /// Format the frame's sidecar and write `frame_NNNN.xml` next to it
    pub fn process_frame(&self, frame: &Frame) -> Result<AnnotationDocument> {
        let doc = self.format(&frame.sidecar_path(), &frame.path)?;
        write_document(&doc, &frame.annotation_path())?;
        Ok(doc)
    }
}

impl Default for AnnotationFormatter {
    fn default() -> Self {
        Self::new(crate::detection::PERSON_LABEL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn size(width: u32, height: u32) -> ImageSize {
        ImageSize { width, height, depth: 3 }
    }

    #[test]
    fn test_label_ignores_class_id() {
        let formatter = AnnotationFormatter::default();
        let doc = formatter.format_text("7 0.5 0.5 0.25 0.25\n", "f.jpg", size(200, 200));
        assert_eq!(doc.objects.len(), 1);
        assert_eq!(doc.objects[0].name, "person");
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let formatter = AnnotationFormatter::default();
        let text = "0 0.5 0.5 0.25 0.25\n0 0.1 0.1\n\nnot a record at all\n0 0.2 0.2 0.1 0.1\n";
        let doc = formatter.format_text(text, "f.jpg", size(100, 100));
        assert_eq!(doc.objects.len(), 2);
        assert_eq!(doc.objects[1].bndbox.x_min, 15);
        assert_eq!(doc.objects[1].bndbox.x_max, 25);
    }

    #[test]
    fn test_format_reads_dimensions_from_image() {
        let dir = tempfile::TempDir::new().unwrap();
        let image_path = dir.path().join("frame_0000.jpg");
        RgbImage::from_pixel(320, 240, Rgb([1, 2, 3])).save(&image_path).unwrap();
        let sidecar = dir.path().join("frame_0000.txt");
        std::fs::write(&sidecar, "0 0.5 0.5 0.5 0.5\n").unwrap();

        let doc = AnnotationFormatter::default().format(&sidecar, &image_path).unwrap();
        assert_eq!(doc.size, size(320, 240));
        assert_eq!(doc.filename, "frame_0000.jpg");
        assert_eq!(doc.objects[0].bndbox.x_min, 80);
        assert_eq!(doc.objects[0].bndbox.y_max, 180);
        assert_eq!(doc.folder, None);
        assert_eq!(doc.path, None);

        let located = AnnotationFormatter::default()
            .with_location(true)
            .format(&sidecar, &image_path)
            .unwrap();
        assert_eq!(located.path, Some(image_path.to_string_lossy().into_owned()));
        assert!(located.folder.is_some());
    }

    #[test]
    fn test_format_unreadable_image() {
        let dir = tempfile::TempDir::new().unwrap();
        let image_path = dir.path().join("frame_0000.jpg");
        std::fs::write(&image_path, b"not a jpeg").unwrap();
        let sidecar = dir.path().join("frame_0000.txt");
        std::fs::write(&sidecar, "").unwrap();

        let err = AnnotationFormatter::default().format(&sidecar, &image_path).unwrap_err();
        assert!(matches!(err, PipelineError::ImageRead { .. }));
        assert!(err.is_per_frame());
    }
}
