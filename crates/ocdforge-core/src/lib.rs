pub mod artifact;
pub mod build_plan;
pub mod component;
pub mod config;
pub mod platform;
pub mod provenance;
pub mod release;
pub mod state;

pub use build_plan::{ArtifactTree, BuildEnvVar, BuildOptions};
pub use component::{BuildSystem, BuildTarget, ComponentRole, ComponentSpec, SourceLocation};
pub use config::{ConfigError, ConfigInputs, PipelineConfig};
pub use platform::{PlatformProfile, TargetBits, TargetPlatform};
pub use release::{release, Release, ReleaseError, APP_NAME};
pub use state::{StateTracker, TargetState, TransitionError};
