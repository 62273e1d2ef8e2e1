use std::sync::Arc;

use crate::config::GlueConfig;
use crate::services::decoder::SymphoniaDecoder;
use crate::services::pipeline::{Pipeline, PipelineOptions};

pub struct AppState {
    pub config: GlueConfig,
    pub pipeline: Pipeline,
}

impl AppState {
    pub fn new(config: GlueConfig) -> Self {
        let options = PipelineOptions {
            max_clips: config.max_clips,
            reject_sample_rate_mismatch: config.reject_sample_rate_mismatch,
        };
        Self {
            pipeline: Pipeline::new(Arc::new(SymphoniaDecoder), options),
            config,
        }
    }
}
