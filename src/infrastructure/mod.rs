pub mod db;
pub mod render;
pub mod speech;
pub mod storage;
