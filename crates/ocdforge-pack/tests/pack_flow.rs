use std::fs;
use std::io::Read;
use std::path::Path;

use ocdforge_core::artifact::checksum::{parse_checksum_file, sha256_file};
use ocdforge_core::artifact::ArchiveKind;
use ocdforge_core::platform::TargetPlatform;
use ocdforge_pack::{copy_licenses, create_archive, validate_package, PackRequest};

fn stage_package(root: &Path) {
    let package = root.join("package");
    fs::create_dir_all(package.join("bin")).expect("mkdir bin");
    fs::create_dir_all(package.join("libexec")).expect("mkdir libexec");
    fs::write(package.join("bin/openocd"), b"\x7fELF openocd").expect("write exe");
    fs::write(package.join("libexec/libusb-1.0.so.0"), b"\x7fELF libusb").expect("write lib");
    fs::write(package.join("build-info.json"), b"{}\n").expect("write info");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(
            package.join("bin/openocd"),
            fs::Permissions::from_mode(0o755),
        )
        .expect("chmod");
    }

    let source = root.join("sources/openocd-0.11.0");
    fs::create_dir_all(&source).expect("mkdir source");
    fs::write(source.join("COPYING"), b"GPL-2.0").expect("write license");
    copy_licenses(&source, "openocd", "0.11.0", &["COPYING"], &package).expect("licenses");
}

fn request(root: &Path, kind: ArchiveKind, name: &str) -> PackRequest {
    PackRequest {
        kind,
        source_dir: root.join("package"),
        archive_root: "openocd-0.11.0-1".to_string(),
        output_dir: root.join("deploy"),
        archive_name: name.to_string(),
    }
}

#[test]
fn tar_gz_package_is_deterministic_and_sorted() {
    let dir = tempfile::tempdir().expect("tempdir");
    stage_package(dir.path());
    validate_package(&dir.path().join("package"), TargetPlatform::Linux, &["openocd"])
        .expect("valid package");

    let name = "xpack-openocd-0.11.0-1-linux-x64.tar.gz";
    let first = create_archive(&request(dir.path(), ArchiveKind::TarGz, name)).expect("first");
    let first_digest = first.digest.clone();
    let second = create_archive(&request(dir.path(), ArchiveKind::TarGz, name)).expect("second");
    assert_eq!(first_digest, second.digest);
    assert_eq!(
        sha256_file(&second.archive_path).expect("hash"),
        second.digest
    );

    let sidecar = fs::read_to_string(&second.checksum_path).expect("sidecar");
    let entries = parse_checksum_file(&sidecar).expect("parse sidecar");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].file_name, name);

    let file = fs::File::open(&second.archive_path).expect("open archive");
    let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(file));
    let mut paths = Vec::new();
    for entry in archive.entries().expect("entries") {
        let entry = entry.expect("entry");
        let header = entry.header();
        assert_eq!(header.mtime().expect("mtime"), 0);
        assert_eq!(header.uid().expect("uid"), 0);
        let path = entry.path().expect("path").to_string_lossy().into_owned();
        if cfg!(unix) && path.ends_with("bin/openocd") {
            assert_eq!(header.mode().expect("mode") & 0o777, 0o755);
        }
        paths.push(path);
    }
    assert_eq!(
        paths,
        [
            "openocd-0.11.0-1/bin/openocd",
            "openocd-0.11.0-1/build-info.json",
            "openocd-0.11.0-1/libexec/libusb-1.0.so.0",
            "openocd-0.11.0-1/licenses/openocd-0.11.0/COPYING",
        ]
    );
}

#[test]
fn zip_package_keeps_contents() {
    let dir = tempfile::tempdir().expect("tempdir");
    stage_package(dir.path());

    let result = create_archive(&request(
        dir.path(),
        ArchiveKind::Zip,
        "xpack-openocd-0.11.0-1-win32-x64.zip",
    ))
    .expect("zip");
    let file = fs::File::open(&result.archive_path).expect("open zip");
    let mut archive = zip::ZipArchive::new(file).expect("read zip");
    assert_eq!(archive.len(), 4);
    let mut info = archive
        .by_name("openocd-0.11.0-1/build-info.json")
        .expect("build-info entry");
    let mut contents = String::new();
    info.read_to_string(&mut contents).expect("read entry");
    assert_eq!(contents, "{}\n");
}
