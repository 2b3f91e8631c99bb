pub mod app_config;
pub mod collection;
pub mod errors;
pub mod event_types;
pub mod internal_logger;
pub mod network;
pub mod services;
