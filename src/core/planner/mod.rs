pub mod item;
pub mod plan;

pub use item::{ContentItem, ContentKind};
pub use plan::{join_relative, ArtifactPlanner, Phase, SyncPlan};
