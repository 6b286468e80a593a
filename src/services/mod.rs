pub mod block_map;
pub mod dashboard;
pub mod import;
pub mod predictions;
