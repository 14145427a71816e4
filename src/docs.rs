use utoipa::OpenApi;
use crate::modules::job::dto::{AdvanceResponse, JobStatusResponse};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::job::handler::advance_job,
        crate::modules::job::handler::get_job_status,
    ),
    components(
        schemas(AdvanceResponse, JobStatusResponse)
    ),
    tags(
        (name = "Jobs", description = "Video composition jobs")
    )
)]
pub struct ApiDoc;
