use std::path::PathBuf;

use anyhow::{bail, Context};
use ocdforge_build::postprocess::verify_package;
use ocdforge_build::{inspector_for, SystemRunner};
use ocdforge_core::config::host_platform;
use ocdforge_core::platform::{profile, TargetBits, TargetPlatform, ToolchainOverrides};
use ocdforge_core::APP_NAME;
use ocdforge_pack::validate_package;

pub struct CheckArgs {
    pub package: PathBuf,
    pub platform: Option<String>,
    pub bits: Option<String>,
}

pub struct CheckOutcome {
    pub platform: TargetPlatform,
    pub binaries: Vec<PathBuf>,
}

/// Re-runs the layout and shared library checks on an existing package
/// tree.
pub fn run(args: CheckArgs) -> anyhow::Result<CheckOutcome> {
    let platform = match args.platform.as_deref() {
        Some(value) => value.parse::<TargetPlatform>()?,
        None => host_platform()?,
    };
    let bits = match args.bits.as_deref() {
        Some(value) => value.parse::<TargetBits>()?,
        None => TargetBits::B64,
    };
    if !args.package.is_dir() {
        bail!("package folder '{}' does not exist", args.package.display());
    }
    let profile = profile(platform, bits, &ToolchainOverrides::default(), false)?;

    validate_package(&args.package, platform, &[APP_NAME])
        .with_context(|| format!("package layout of '{}'", args.package.display()))?;
    let runner = SystemRunner::new(false);
    let inspector = inspector_for(&profile, &runner);
    let report = verify_package(inspector.as_ref(), platform, &args.package)?;
    Ok(CheckOutcome {
        platform,
        binaries: report.binaries,
    })
}
