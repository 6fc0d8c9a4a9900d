pub mod config;
pub mod letterbox;

use ndarray::{Array, IxDyn};

pub use config::DEFAULT_INPUT_SIZE;
pub use letterbox::LetterboxPreProcessor;

/// Parameters needed to map detector coordinates back onto the source image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxTransform {
    pub orig_width: u32,
    pub orig_height: u32,
    /// Scale factor applied during letterboxing
    pub scale: f32,
    /// X offset from letterboxing (in pixels)
    pub offset_x: f32,
    /// Y offset from letterboxing (in pixels)
    pub offset_y: f32,
}

impl LetterboxTransform {
    /// Invert the letterbox for one point, clamped to the original image bounds.
    #[inline]
    pub fn to_original(&self, x: f32, y: f32) -> (f32, f32) {
        let ox = ((x - self.offset_x) / self.scale).clamp(0.0, self.orig_width as f32);
        let oy = ((y - self.offset_y) / self.scale).clamp(0.0, self.orig_height as f32);
        (ox, oy)
    }
}

/// Result of preprocessing including transformation parameters
#[derive(Debug)]
pub struct PreprocessResult {
    /// `[1, 3, H, W]` tensor, channel-planar, values in `[0, 1]`
    pub tensor: Array<f32, IxDyn>,
    pub transform: LetterboxTransform,
}
