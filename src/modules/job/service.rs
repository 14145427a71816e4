use uuid::Uuid;

use super::dto::{AdvanceResponse, JobStatusResponse};
use super::error::JobError;
use crate::state::AppState;

pub struct JobService;

impl JobService {
    pub async fn advance(state: AppState, id: Uuid) -> Result<AdvanceResponse, JobError> {
        let outcome = state.driver.advance(id).await?;
        Ok(outcome.into())
    }

    pub async fn status(state: AppState, id: Uuid) -> Result<JobStatusResponse, JobError> {
        let job = state.jobs.find(id).await?.ok_or(JobError::NotFound(id))?;
        Ok(JobStatusResponse::from(&job))
    }
}
