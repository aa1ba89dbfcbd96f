use std::fmt::Write;

use ocdforge_core::platform::{
    profile, TargetBits, TargetPlatform, ToolchainOverrides, OPENOCD_FEATURE_TABLE,
};
use ocdforge_core::APP_NAME;

/// Supported platform/bits combinations followed by the feature matrix.
pub fn render() -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<8} {:<6} {:<8} {:<12} library",
        "platform", "bits", "archive", "executable"
    );
    for platform in TargetPlatform::ALL {
        let bits: Vec<&str> = [TargetBits::B32, TargetBits::B64]
            .into_iter()
            .filter(|bits| profile(platform, *bits, &ToolchainOverrides::default(), false).is_ok())
            .map(TargetBits::as_str)
            .collect();
        let _ = writeln!(
            out,
            "{:<8} {:<6} {:<8} {:<12} .{}",
            platform.as_str(),
            bits.join(","),
            platform.archive_kind().extension(),
            platform.executable_name(APP_NAME),
            platform.shared_library_extension()
        );
    }

    out.push('\n');
    let width = OPENOCD_FEATURE_TABLE
        .rows()
        .iter()
        .map(|row| row.name.len())
        .max()
        .unwrap_or(0);
    let _ = write!(out, "{:<width$}", "feature");
    for platform in TargetPlatform::ALL {
        let _ = write!(out, "  {:<9}", platform.as_str());
    }
    out.push('\n');
    for row in OPENOCD_FEATURE_TABLE.rows() {
        let _ = write!(out, "{:<width$}", row.name);
        for platform in TargetPlatform::ALL {
            let _ = write!(out, "  {:<9}", row.states.get(platform).as_str());
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_every_platform_and_feature() {
        let text = render();
        assert!(text.contains("win32    32,64  zip      openocd.exe  .dll"));
        assert!(text.contains("darwin   64     tar.gz"));
        let parport = text
            .lines()
            .find(|line| line.starts_with("parport-giveio"))
            .expect("parport-giveio row");
        assert_eq!(parport.split_whitespace().count(), 4);
    }
}
