pub mod app_state;

pub use app_state::{default_data_dir, load_settings_from_disk, AppState, LauncherSettings};
