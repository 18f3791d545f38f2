use serde::{Deserialize, Serialize};

/// Format used for [`Identity::created`].
pub const CREATED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A coordinate in image or preview space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f32,
    pub y: f32,
}

impl Point2D {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Width and height of an image or of the on-screen preview.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size2D {
    pub width: f32,
    pub height: f32,
}

impl Size2D {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// True when either side is zero or negative.
    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// Axis-aligned box given by its edges.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl BoundingBox {
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }
}

/// Raw detector output for one face.
///
/// The box is in image pixels; keypoints are normalized to `0..1` of the
/// image size, in detector order: left eye, right eye, nose, mouth, left ear,
/// right ear.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub bounding_box: BoundingBox,
    pub keypoints: Vec<Point2D>,
    pub confidence: f32,
}

/// The six landmarks used for pose guidance, by name.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceKeypoints {
    pub left_eye: Point2D,
    pub right_eye: Point2D,
    pub nose: Point2D,
    pub mouth: Point2D,
    pub left_ear: Point2D,
    pub right_ear: Point2D,
}

impl FaceKeypoints {
    pub const COUNT: usize = 6;

    /// Build from points in detector order. Returns `None` if fewer than six
    /// points are given; extra points are ignored.
    pub fn from_ordered(points: &[Point2D]) -> Option<Self> {
        match points {
            [left_eye, right_eye, nose, mouth, left_ear, right_ear, ..] => Some(Self {
                left_eye: *left_eye,
                right_eye: *right_eye,
                nose: *nose,
                mouth: *mouth,
                left_ear: *left_ear,
                right_ear: *right_ear,
            }),
            _ => None,
        }
    }

    pub fn to_array(&self) -> [Point2D; Self::COUNT] {
        [
            self.left_eye,
            self.right_eye,
            self.nose,
            self.mouth,
            self.left_ear,
            self.right_ear,
        ]
    }

    pub fn map(&self, mut f: impl FnMut(Point2D) -> Point2D) -> Self {
        Self {
            left_eye: f(self.left_eye),
            right_eye: f(self.right_eye),
            nose: f(self.nose),
            mouth: f(self.mouth),
            left_ear: f(self.left_ear),
            right_ear: f(self.right_ear),
        }
    }
}

/// One detected face in preview space, rebuilt every frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceGeometry {
    pub keypoints: FaceKeypoints,
    pub bounding_box: BoundingBox,
}

/// Where a face is pointing, or that it left the target region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    Forward,
    OutsideTargetRegion,
}

impl Direction {
    pub fn is_in_region(self) -> bool {
        self != Direction::OutsideTargetRegion
    }

    /// Instruction shown to the user while this direction is requested.
    pub fn prompt(self) -> &'static str {
        match self {
            Direction::Up => "Please tilt your face up",
            Direction::Down => "Please tilt your face down",
            Direction::Left => "Please turn your face to the left",
            Direction::Right => "Please turn your face to the right",
            Direction::Forward => "Please look straight ahead",
            Direction::OutsideTargetRegion => "Move your face into the circle",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
            Direction::Forward => "forward",
            Direction::OutsideTargetRegion => "outside",
        };
        f.write_str(name)
    }
}

/// Face embedding vector produced by the external embedder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model that produced this embedding (e.g., "mobilenet_v3_large").
    pub model_version: Option<String>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            values,
            model_version: None,
        }
    }

    /// Build from a quantized embedder output, reading each byte as `i8`.
    pub fn from_quantized(bytes: &[u8]) -> Self {
        Self::new(bytes.iter().map(|&b| b as i8 as f32).collect())
    }

    /// Compute cosine similarity between two embeddings.
    ///
    /// Returns a value in [-1, 1]. Higher = more similar. Zero-norm inputs
    /// score 0.0. Vectors of different length compare over the common prefix.
    pub fn similarity(&self, other: &Embedding) -> f32 {
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 { dot / denom } else { 0.0 }
    }
}

/// An enrolled person: one capture sequence worth of embeddings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub name: String,
    /// Local creation time, formatted with [`CREATED_FORMAT`].
    pub created: String,
    pub embeddings: Vec<Embedding>,
}

impl Identity {
    /// Create a new identity with a fresh id, stamped with the local time.
    pub fn new(name: impl Into<String>, embeddings: Vec<Embedding>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            created: chrono::Local::now().format(CREATED_FORMAT).to_string(),
            embeddings,
        }
    }
}

/// An identity whose best embedding cleared the similarity threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub identity_id: String,
    pub identity_name: String,
    /// Best cosine similarity over the identity's embeddings.
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_identical() {
        let a = Embedding::new(vec![1.0, 0.0, 0.0]);
        let b = Embedding::new(vec![1.0, 0.0, 0.0]);
        assert!((a.similarity(&b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![0.0, 1.0]);
        assert!(a.similarity(&b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![-1.0, 0.0]);
        assert!((a.similarity(&b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        let a = Embedding::new(vec![0.0, 0.0]);
        let b = Embedding::new(vec![1.0, 0.0]);
        assert_eq!(a.similarity(&b), 0.0);
    }

    #[test]
    fn test_from_quantized_reads_signed_bytes() {
        let e = Embedding::from_quantized(&[0x01, 0xFF, 0x80, 0x7F]);
        assert_eq!(e.values, vec![1.0, -1.0, -128.0, 127.0]);
        assert!(e.model_version.is_none());
    }

    #[test]
    fn test_quantized_similarity_matches_float() {
        let q = Embedding::from_quantized(&[10, 0xF6, 20]);
        let f = Embedding::new(vec![10.0, -10.0, 20.0]);
        assert!((q.similarity(&f) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_keypoints_require_six_points() {
        let five = vec![Point2D::default(); 5];
        assert!(FaceKeypoints::from_ordered(&five).is_none());

        let seven: Vec<Point2D> = (0..7).map(|i| Point2D::new(i as f32, 0.0)).collect();
        let kps = FaceKeypoints::from_ordered(&seven).unwrap();
        assert_eq!(kps.left_eye.x, 0.0);
        assert_eq!(kps.mouth.x, 3.0);
        assert_eq!(kps.right_ear.x, 5.0);
    }

    #[test]
    fn test_direction_serde_names() {
        let json = serde_json::to_string(&Direction::OutsideTargetRegion).unwrap();
        assert_eq!(json, "\"outside_target_region\"");
        let d: Direction = serde_json::from_str("\"left\"").unwrap();
        assert_eq!(d, Direction::Left);
    }

    #[test]
    fn test_new_identity_has_id_and_timestamp() {
        let identity = Identity::new("alice", vec![Embedding::new(vec![1.0])]);
        assert_eq!(identity.id.len(), 36);
        assert_eq!(identity.created.len(), "2024-01-01 00:00:00".len());
        assert!(chrono::NaiveDateTime::parse_from_str(&identity.created, CREATED_FORMAT).is_ok());
    }
}
