pub mod metadata;
pub mod post;

pub use metadata::parse_class_names;
pub use post::YoloPostProcessor;
