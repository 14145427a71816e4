pub mod response;
pub mod retry;
