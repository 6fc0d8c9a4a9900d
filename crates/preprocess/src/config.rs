/// Square input edge used by Ultralytics YOLOv8 exports.
pub const DEFAULT_INPUT_SIZE: (u32, u32) = (640, 640);

/// Padding value Ultralytics uses when letterboxing.
pub const LETTERBOX_COLOR: u8 = 114;
