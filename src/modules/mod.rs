pub mod composition;
pub mod job;
