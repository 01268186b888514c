pub mod background_mixer;
pub mod clip_loader;
pub mod conform;
pub mod decoder;
pub mod effect_inserter;
pub mod envelope;
pub mod speed;
pub mod timeline_assembler;
pub mod wav_format;
