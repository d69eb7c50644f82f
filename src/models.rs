use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Channel depth written for every frame (frames are saved as RGB JPEG).
pub const FRAME_DEPTH: u32 = 3;

/// File stem for the frame at `ordinal`, e.g. `frame_0030`
pub fn frame_stem(ordinal: u64) -> String {
    format!("frame_{:04}", ordinal)
}

/// A sampled frame written to disk by the sampler
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub ordinal: u64,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub timestamp: Option<Duration>,
}

impl Frame {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Path of the normalized detection sidecar (`.txt`)
    pub fn sidecar_path(&self) -> PathBuf {
        self.path.with_extension("txt")
    }

    /// Path of the annotation document (`.xml`)
    pub fn annotation_path(&self) -> PathBuf {
        self.path.with_extension("xml")
    }
}

/// Ordered list of frames produced by one sampling pass
#[derive(Debug, Clone, Default)]
pub struct FrameManifest {
    pub output_dir: PathBuf,
    pub interval: u64,
    /// Number of frames decoded from the source, written or not
    pub decoded: u64,
    pub frames: Vec<Frame>,
}

impl FrameManifest {
    pub fn new(output_dir: impl AsRef<Path>, interval: u64) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            interval,
            decoded: 0,
            frames: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn ordinals(&self) -> Vec<u64> {
        self.frames.iter().map(|f| f.ordinal).collect()
    }
}

/// Detection as returned by the detector, in absolute pixel units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawDetection {
    pub class_id: u32,
    pub center_x: f32,
    pub center_y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

impl RawDetection {
    pub fn new(class_id: u32, center_x: f32, center_y: f32, width: f32, height: f32) -> Self {
        Self {
            class_id,
            center_x,
            center_y,
            width,
            height,
            confidence: 1.0,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Intersection over union with another center/size box
    pub fn iou(&self, other: &RawDetection) -> f32 {
        let (ax0, ay0) = (self.center_x - self.width / 2.0, self.center_y - self.height / 2.0);
        let (ax1, ay1) = (self.center_x + self.width / 2.0, self.center_y + self.height / 2.0);
        let (bx0, by0) = (other.center_x - other.width / 2.0, other.center_y - other.height / 2.0);
        let (bx1, by1) = (other.center_x + other.width / 2.0, other.center_y + other.height / 2.0);

        let iw = (ax1.min(bx1) - ax0.max(bx0)).max(0.0);
        let ih = (ay1.min(by1) - ay0.max(by0)).max(0.0);
        let inter = iw * ih;
        let union = self.area() + other.area() - inter;

        if union <= 0.0 {
            return 0.0;
        }
        inter / union
    }
}

/// Normalized bounding box, spatial values relative to the frame size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionRecord {
    pub class_id: u32,
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
}

impl DetectionRecord {
    /// Normalize an absolute detection by the frame's pixel size
    pub fn from_raw(raw: &RawDetection, class_id: u32, frame_width: u32, frame_height: u32) -> Self {
        let w = frame_width as f64;
        let h = frame_height as f64;
        Self {
            class_id,
            x_center: raw.center_x as f64 / w,
            y_center: raw.center_y as f64 / h,
            width: raw.width as f64 / w,
            height: raw.height as f64 / h,
        }
    }

    /// Parse one sidecar line; `None` unless it holds exactly five numeric fields
    pub fn parse_line(line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() != 5 {
            return None;
        }

        // Class ids may have been written as floats by other tools
        let class_id = parts[0].parse::<f64>().ok()?;
        let x_center = parts[1].parse::<f64>().ok()?;
        let y_center = parts[2].parse::<f64>().ok()?;
        let width = parts[3].parse::<f64>().ok()?;
        let height = parts[4].parse::<f64>().ok()?;

        let fields = [class_id, x_center, y_center, width, height];
        if !fields.iter().all(|v| v.is_finite()) {
            return None;
        }

        Some(Self {
            class_id: class_id as u32,
            x_center,
            y_center,
            width,
            height,
        })
    }

    /// Pixel-corner box for an image of the given size.
    /// Corners are truncated toward zero, like an integer cast.
    pub fn to_pixel_box(&self, image_width: u32, image_height: u32) -> PixelBox {
        let w = image_width as f64;
        let h = image_height as f64;
        PixelBox {
            x_min: ((self.x_center - self.width / 2.0) * w) as i64,
            y_min: ((self.y_center - self.height / 2.0) * h) as i64,
            x_max: ((self.x_center + self.width / 2.0) * w) as i64,
            y_max: ((self.y_center + self.height / 2.0) * h) as i64,
        }
    }
}

/// Sidecar line format: `<class_id> <x_center> <y_center> <width> <height>`
impl fmt::Display for DetectionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.class_id, self.x_center, self.y_center, self.width, self.height
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBox {
    pub x_min: i64,
    pub y_min: i64,
    pub x_max: i64,
    pub y_max: i64,
}

impl PixelBox {
    pub fn width(&self) -> i64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> i64 {
        self.y_max - self.y_min
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectEntry {
    pub name: String,
    pub pose: String,
    pub truncated: u8,
    pub difficult: u8,
    pub bndbox: PixelBox,
}

impl ObjectEntry {
    pub fn new(name: impl Into<String>, bndbox: PixelBox) -> Self {
        Self {
            name: name.into(),
            pose: "Unspecified".to_string(),
            truncated: 0,
            difficult: 0,
            bndbox,
        }
    }
}

/// One Pascal VOC annotation per frame
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationDocument {
    pub folder: Option<String>,
    pub filename: String,
    pub path: Option<String>,
    pub size: ImageSize,
    pub objects: Vec<ObjectEntry>,
}

impl AnnotationDocument {
    pub fn new(filename: impl Into<String>, size: ImageSize) -> Self {
        Self {
            folder: None,
            filename: filename.into(),
            path: None,
            size,
            objects: Vec::new(),
        }
    }
}
