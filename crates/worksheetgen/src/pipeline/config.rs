use std::path::PathBuf;

use crate::config::Config;

pub struct PipelineConfig {
    pub work_directory: PathBuf,
    pub keep_intermediate_images: bool,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            work_directory: config.resolved_work_directory(),
            keep_intermediate_images: config.keep_intermediate_images,
        }
    }
}
