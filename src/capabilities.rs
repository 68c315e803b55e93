//! What the pipeline needs to know about its surroundings.
//!
//! [`SubjectImage`] is the minimal read-only view of an input image that
//! validation consumes. [`CapabilityProbe`] reports which subject-detection
//! features are available, and [`SubjectDetector`] is the seam through which
//! execution asks for subject locations. The pipeline never implements
//! detection itself.

use crate::imaging::Rect;
use crate::options::CropMode;
use serde::{Deserialize, Serialize};

/// Image properties relevant to validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectImage {
    pub width: u32,
    pub height: u32,
    /// MIME-like type, e.g. `image/png`.
    pub format: String,
    pub has_transparency: bool,
}

impl SubjectImage {
    pub fn new(width: u32, height: u32, format: impl Into<String>, has_transparency: bool) -> Self {
        Self {
            width,
            height,
            format: format.into(),
            has_transparency,
        }
    }

    pub fn longest_edge(&self) -> u32 {
        self.width.max(self.height)
    }

    pub fn shortest_edge(&self) -> u32 {
        self.width.min(self.height)
    }

    /// `width / height`, or `None` for a zero height.
    pub fn aspect_ratio(&self) -> Option<f64> {
        (self.height > 0).then(|| self.width as f64 / self.height as f64)
    }
}

/// Detection features available to AI crop modes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub face_detection: bool,
    pub object_detection: bool,
    pub saliency_detection: bool,
    pub entropy_detection: bool,
    pub canvas_available: bool,
}

impl Capabilities {
    /// Everything on.
    pub fn full() -> Self {
        Self {
            face_detection: true,
            object_detection: true,
            saliency_detection: true,
            entropy_detection: true,
            canvas_available: true,
        }
    }

    /// Pixel access only; entropy can be computed without a model.
    pub fn pixels_only() -> Self {
        Self {
            entropy_detection: true,
            canvas_available: true,
            ..Self::default()
        }
    }

    pub fn has_any_ai(&self) -> bool {
        self.face_detection || self.object_detection || self.saliency_detection
    }

    /// Whether a crop mode can run as intended. Non-AI modes always can;
    /// `smart` needs at least one detector.
    pub fn supports(&self, mode: CropMode) -> bool {
        match mode {
            CropMode::Face => self.face_detection,
            CropMode::Object => self.object_detection,
            CropMode::Saliency => self.saliency_detection,
            CropMode::Entropy => self.entropy_detection,
            CropMode::Smart => self.has_any_ai() || self.entropy_detection,
            _ => true,
        }
    }
}

/// Source of [`Capabilities`]. Polled at most once per validation pass.
pub trait CapabilityProbe {
    fn detect_capabilities(&self) -> Capabilities;
}

/// A probe with a fixed answer.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticProbe(pub Capabilities);

impl CapabilityProbe for StaticProbe {
    fn detect_capabilities(&self) -> Capabilities {
        self.0
    }
}

/// A region a detector believes contains something worth keeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedSubject {
    pub label: String,
    /// 0-100.
    pub confidence: f64,
    pub rect: Rect,
}

/// Locates subjects for AI crop modes.
pub trait SubjectDetector: Sync {
    fn detect(&self, image: &[u8], mode: CropMode, objects: &[String]) -> Vec<DetectedSubject>;
}

/// Finds nothing; AI crops fall back to centre.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDetector;

impl SubjectDetector for NoDetector {
    fn detect(&self, _image: &[u8], _mode: CropMode, _objects: &[String]) -> Vec<DetectedSubject> {
        Vec::new()
    }
}

/// Keep subjects at or above `threshold` confidence.
pub fn confident_subjects(subjects: &[DetectedSubject], threshold: f64) -> Vec<Rect> {
    subjects
        .iter()
        .filter(|s| s.confidence >= threshold)
        .map(|s| s.rect)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_edges_and_aspect() {
        let img = SubjectImage::new(1920, 1080, "image/jpeg", false);
        assert_eq!(img.longest_edge(), 1920);
        assert_eq!(img.shortest_edge(), 1080);
        let ar = img.aspect_ratio().unwrap();
        assert!((ar - 16.0 / 9.0).abs() < 1e-9);
        assert_eq!(SubjectImage::new(10, 0, "image/png", true).aspect_ratio(), None);
    }

    #[test]
    fn default_capabilities_support_only_geometric_modes() {
        let caps = Capabilities::default();
        assert!(caps.supports(CropMode::Center));
        assert!(caps.supports(CropMode::TopLeft));
        assert!(!caps.supports(CropMode::Face));
        assert!(!caps.supports(CropMode::Smart));
        assert!(!caps.has_any_ai());
    }

    #[test]
    fn pixels_only_allows_entropy_and_smart() {
        let caps = Capabilities::pixels_only();
        assert!(caps.supports(CropMode::Entropy));
        assert!(caps.supports(CropMode::Smart));
        assert!(!caps.supports(CropMode::Object));
        assert!(!caps.has_any_ai());
    }

    #[test]
    fn static_probe_reports_its_value() {
        let probe = StaticProbe(Capabilities::full());
        assert!(probe.detect_capabilities().has_any_ai());
    }

    #[test]
    fn subject_image_json_shape() {
        let img: SubjectImage = serde_json::from_str(
            r#"{"width": 64, "height": 32, "format": "image/png", "hasTransparency": true}"#,
        )
        .unwrap();
        assert!(img.has_transparency);
        assert_eq!(img.width, 64);
    }

    #[test]
    fn confidence_filter() {
        let subjects = vec![
            DetectedSubject {
                label: "face".into(),
                confidence: 91.0,
                rect: Rect::new(0, 0, 10, 10),
            },
            DetectedSubject {
                label: "person".into(),
                confidence: 40.0,
                rect: Rect::new(50, 50, 10, 10),
            },
        ];
        assert_eq!(confident_subjects(&subjects, 70.0), vec![Rect::new(0, 0, 10, 10)]);
        assert!(NoDetector.detect(&[], CropMode::Face, &[]).is_empty());
    }
}
