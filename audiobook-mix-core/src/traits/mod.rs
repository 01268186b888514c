pub mod clip_generator;
pub mod pipeline_delegate;
