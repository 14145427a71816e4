use std::sync::Arc;

use crate::modules::job::driver::JobDriver;
use crate::modules::job::repository::JobStore;

#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<dyn JobStore>,
    pub driver: Arc<JobDriver>,
}

impl AppState {
    pub fn new(jobs: Arc<dyn JobStore>, driver: Arc<JobDriver>) -> Self {
        Self { jobs, driver }
    }
}
