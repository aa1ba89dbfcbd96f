use std::fs;

use ocdforge_core::{
    artifact::{checksum_name, package_layout, ArchiveKind},
    config::{ConfigInputs, PipelineConfig, CONFIG_FILE_NAME},
    platform::{FeatureState, TargetPlatform},
    provenance::BuildInfo,
};

fn inputs(work_dir: &std::path::Path, platform: &str, bits: &str) -> ConfigInputs {
    let mut inputs = ConfigInputs {
        platform: Some(platform.to_string()),
        bits: Some(bits.to_string()),
        work_dir: work_dir.to_path_buf(),
        ..ConfigInputs::default()
    };
    inputs.options.jobs = 4;
    inputs
}

#[test]
fn integration_flow_from_config_to_package_identity() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(
        dir.path().join(CONFIG_FILE_NAME),
        "distro: xpack\nrelease: 0.11.0-1\n",
    )
    .expect("write config");

    let config = PipelineConfig::resolve(inputs(dir.path(), "win32", "32")).expect("config");
    assert_eq!(config.profile.archive_kind, ArchiveKind::Zip);
    assert_eq!(config.archive_name, "xpack-openocd-0.11.0-1-win32-x32.zip");
    assert_eq!(
        checksum_name(&config.archive_name),
        "xpack-openocd-0.11.0-1-win32-x32.zip.sha"
    );
    assert!(config
        .tree
        .package_root
        .ends_with("win32-32/package/openocd-0.11.0-1"));

    let names: Vec<&str> = config
        .release
        .components_for(TargetPlatform::Win32)
        .iter()
        .map(|component| component.name)
        .collect();
    assert_eq!(names, ["libiconv", "libusb", "libftdi", "hidapi", "openocd"]);

    let info = BuildInfo::from_config(&config).expect("build info");
    let parport = info
        .features
        .iter()
        .find(|feature| feature.name == "parport-giveio")
        .expect("parport-giveio");
    assert_eq!(parport.state, FeatureState::Enabled);

    let layout = package_layout(TargetPlatform::Win32);
    assert_eq!(layout.library_dir, layout.executable_dir);
}

#[test]
fn every_platform_yields_explicit_switches_for_openocd() {
    let dir = tempfile::tempdir().expect("tempdir");
    for platform in ["linux", "darwin", "win32"] {
        let config = PipelineConfig::resolve(inputs(dir.path(), platform, "64")).expect("config");
        let app = config.release.application().expect("application");
        let args = app.configure_args_for(config.platform());
        let features = app.features.expect("features");
        for row in features.rows() {
            let enable = format!("--enable-{}", row.name);
            let disable = format!("--disable-{}", row.name);
            let hits = args
                .iter()
                .filter(|arg| **arg == enable || **arg == disable)
                .count();
            assert_eq!(hits, 1, "{} on {}", row.name, platform);
        }
    }
}
