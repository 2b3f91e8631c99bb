use crate::errors::AppError;
use config::{Config, Environment, File as ConfigFile}; // Renamed File to avoid conflict
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;

// The main Settings struct used throughout the application
#[derive(Debug, Clone)]
pub struct Settings {
    pub server_url: String,
    pub username: String,
    pub password: String,
    // Fallback identity when the login response carries no user id
    pub user_id: Option<i64>,

    pub collection_interval_secs: u64,
    pub max_batch_size: usize,
    pub token_refresh_interval_secs: u64,
    pub max_retries: u32,

    pub login_timeout_secs: u64,
    pub batch_timeout_secs: u64,
    pub probe_timeout_secs: u64,

    pub internal_log_level: String,
    pub internal_log_file_dir: PathBuf, // Path for diagnostic logs
    pub internal_log_file_name: String,
}

// Struct to directly deserialize from client_settings.toml
#[derive(Debug, Deserialize)]
struct RawSettings {
    server_url: String,
    username: String,
    password: String,
    user_id: Option<i64>,

    collection_interval_secs: Option<u64>,
    max_batch_size: Option<usize>,
    token_refresh_interval_secs: Option<u64>,
    max_retries: Option<u32>,

    login_timeout_secs: Option<u64>,
    batch_timeout_secs: Option<u64>,
    probe_timeout_secs: Option<u64>,

    internal_log_level: Option<String>,
    internal_log_file_dir: Option<String>,
    internal_log_file_name: Option<String>,
}

impl Settings {
    pub fn new() -> Result<Arc<Self>, AppError> {
        // Determine config path:
        // 1. Try executable_dir/config/client_settings.toml
        // 2. Try executable_dir/client_settings.toml
        // 3. Try current_dir/config/client_settings.toml (for dev)
        // 4. Try current_dir/client_settings.toml (for dev)

        let exe_path = std::env::current_exe()
            .map_err(|e| AppError::Config(format!("Failed to get current exe path: {}", e)))?;
        let exe_dir = exe_path.parent().ok_or_else(|| {
            AppError::Config("Failed to get parent directory of executable.".to_string())
        })?;

        let config_paths_to_try = [
            exe_dir.join("config").join("client_settings.toml"),
            exe_dir.join("client_settings.toml"),
            PathBuf::from("config").join("client_settings.toml"), // Relative to CWD
            PathBuf::from("client_settings.toml"),                // Relative to CWD
        ];

        let mut config_builder = Config::builder();
        let mut loaded_from_file = false;

        for path_to_try in &config_paths_to_try {
            if path_to_try.exists() {
                config_builder =
                    config_builder.add_source(ConfigFile::from(path_to_try.clone()).required(true));
                loaded_from_file = true;
                println!("[INFO] Loading configuration from: {:?}", path_to_try);
                break;
            }
        }

        if !loaded_from_file {
            return Err(AppError::Config(
                "client_settings.toml not found in standard locations.".to_string(),
            ));
        }

        // Add environment variable overrides
        config_builder = config_builder.add_source(
            Environment::with_prefix("PAC_CLIENT") // Process Activity Client
                .separator("__")
                .try_parsing(true),
        );

        let raw_settings: RawSettings = config_builder
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build configuration: {}", e)))?
            .try_deserialize()
            .map_err(|e| AppError::Config(format!("Failed to deserialize configuration: {}", e)))?;

        if raw_settings.server_url.trim().is_empty() {
            return Err(AppError::Config("server_url must not be empty.".to_string()));
        }

        let max_batch_size = raw_settings.max_batch_size.unwrap_or(3);
        if max_batch_size == 0 {
            return Err(AppError::Config(
                "max_batch_size must be at least 1.".to_string(),
            ));
        }

        let internal_log_file_dir = raw_settings
            .internal_log_file_dir
            .unwrap_or_else(|| "logs".to_string());

        // Construct the final Settings struct
        Ok(Arc::new(Settings {
            server_url: raw_settings.server_url.trim_end_matches('/').to_string(),
            username: raw_settings.username,
            password: raw_settings.password,
            user_id: raw_settings.user_id,
            collection_interval_secs: raw_settings.collection_interval_secs.unwrap_or(60),
            max_batch_size,
            token_refresh_interval_secs: raw_settings.token_refresh_interval_secs.unwrap_or(300),
            max_retries: raw_settings.max_retries.unwrap_or(3),
            login_timeout_secs: raw_settings.login_timeout_secs.unwrap_or(10),
            batch_timeout_secs: raw_settings.batch_timeout_secs.unwrap_or(15),
            probe_timeout_secs: raw_settings.probe_timeout_secs.unwrap_or(5),
            internal_log_level: raw_settings
                .internal_log_level
                .unwrap_or_else(|| "info".to_string()),
            internal_log_file_dir: exe_dir.join(internal_log_file_dir), // Make relative to exe dir
            internal_log_file_name: raw_settings
                .internal_log_file_name
                .unwrap_or_else(|| "process_activity_client.log".to_string()),
        }))
    }
}
