pub mod episode_writer;
pub mod metadata;
pub mod timing_migration;
