pub mod config;
pub mod document;
pub mod files;

pub use config::{load_config, save_config, AppConfig};
pub use document::{load_tasks, parse_tasks, save_tasks, serialize_tasks};
pub use files::{
    atomic_write, config_file, ensure_data_dir, get_data_dir, init_local_dir, read_file, tasks_file, DIR_ENV_VAR,
    LOCAL_DIR_NAME,
};
