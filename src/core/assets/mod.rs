pub mod asset_index;

pub use asset_index::{AssetIndex, AssetObject};

/// Public object store for asset downloads.
pub const RESOURCES_URL: &str = "https://resources.download.minecraft.net";
