pub mod classifier;
pub mod collector;
pub mod process_source;
