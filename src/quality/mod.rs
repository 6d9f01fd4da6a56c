/// Capture quality scoring
///
/// Turns a frame and its detection into lighting, sharpness and positioning
/// scores plus the face, eyes-open and frontal-pose gates. The gated overall
/// score drives auto-capture.
pub mod region;
pub mod scorer;
pub mod signals;

pub use region::{luminance, skin_centroid_x, LumaPlane, Region};
pub use scorer::QualityScorer;
