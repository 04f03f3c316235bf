pub mod commands;
pub mod core;

use tracing_subscriber::EnvFilter;

pub use crate::commands::{
    install_version, list_versions, prepare_launch, InstallOutcome, InstallRequest, LaunchPlan,
    LaunchRequest,
};
pub use crate::core::error::{LauncherError, LauncherResult};
pub use crate::core::state::AppState;

/// Install the structured logging subscriber.
///
/// `RUST_LOG` overrides the default filter. Calling it twice is harmless.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,mclaunch_lib=debug")),
        )
        .try_init();
}
