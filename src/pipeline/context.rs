//! Shared context threaded through every stage: resolved config, the
//! cancellation token, and CPU-count-derived worker sizing. Grounded on the
//! teacher's `pipeline::context::PipelineContext`, generalized from a
//! single walk root to the whole hash-cascade pipeline.

use std::sync::Arc;

use crate::cancel::CancellationToken;
use crate::config::Config;

#[derive(Clone)]
pub struct PipelineContext {
    pub config: Arc<Config>,
    pub cancel: CancellationToken,
    /// Worker count for stages sized `cpu_count`, capped by file-descriptor
    /// headroom the way the teacher's `fd_limit::max_workers_by_fd_limit`
    /// caps the metadata worker pool.
    pub cpu_count: usize,
}

impl PipelineContext {
    pub fn new(config: Arc<Config>, cancel: CancellationToken) -> Self {
        let cpu_count = rayon::current_num_threads();
        let cpu_count = match crate::utils::fd_limit::max_workers_by_fd_limit() {
            Some(ceiling) => cpu_count.min(ceiling).max(1),
            None => cpu_count,
        };
        PipelineContext {
            config,
            cancel,
            cpu_count,
        }
    }
}
