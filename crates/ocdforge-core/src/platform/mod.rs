pub mod features;
pub mod key;
pub mod profile;

pub use features::{
    FeatureError, FeatureRow, FeatureState, FeatureTable, ResolvedFeature, OPENOCD_FEATURE_TABLE,
};
pub use key::{PerPlatform, PlatformDescriptor, PlatformError, TargetBits, TargetPlatform};
pub use profile::{profile, PlatformProfile, ToolchainEnv, ToolchainOverrides};
