pub mod checksum;
pub mod layout;
pub mod naming;

pub use layout::{package_layout, PackageLayout, BUILD_INFO_FILE_NAME, LICENSES_DIR_NAME};
pub use naming::{archive_name, checksum_name, package_folder_name, ArchiveKind, ArtifactNameError};
