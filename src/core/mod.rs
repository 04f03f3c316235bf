// ─── MCLaunch Core ───
// Content synchronization engine for a Minecraft-style game distribution.
//
// Architecture:
//   core/
//     version/    - Version manifest, descriptors, platform rules
//     assets/     - Asset index fetch + verification
//     planner/    - Descriptor → content items
//     downloader/ - Concurrent download/verify/place pipeline
//     progress/   - Item and byte progress counters
//     launch/     - Natives extraction + classpath
//     auth/       - Caller-supplied account profile
//     http/       - Transport seam over reqwest
//     state/      - Install root and settings

pub mod assets;
pub mod auth;
pub mod downloader;
pub mod error;
pub mod http;
pub mod launch;
pub mod planner;
pub mod progress;
pub mod state;
pub mod version;
