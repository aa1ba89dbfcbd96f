use std::fs;
use std::path::{Path, PathBuf};

use ocdforge_core::build_plan::{ArtifactTree, BuildEnvVar, BuildOptions};
use ocdforge_core::component::{BuildSystem, ComponentRole, ComponentSpec};
use ocdforge_core::platform::PlatformProfile;
use tracing::info;

use crate::runner::{CommandRunner, Invocation};
use crate::stage::{run_stage, BuildError, BuildStageResult, StageKind, StageSpec};

/// Written into the build folder once configure has succeeded.
pub const CONFIGURE_MARKER: &str = ".ocdforge-configured";

/// Everything a build executor needs to know about one component run.
#[derive(Clone, Debug)]
pub struct ComponentBuild<'a> {
    pub spec: &'a ComponentSpec,
    pub profile: &'a PlatformProfile,
    pub options: &'a BuildOptions,
    pub source_dir: PathBuf,
    pub build_dir: PathBuf,
    pub logs_dir: PathBuf,
    /// Install prefix: the shared dependency prefix, or the package tree for
    /// the application.
    pub prefix: PathBuf,
    pub env: Vec<BuildEnvVar>,
}

impl<'a> ComponentBuild<'a> {
    pub fn new(
        spec: &'a ComponentSpec,
        profile: &'a PlatformProfile,
        options: &'a BuildOptions,
        tree: &ArtifactTree,
    ) -> Self {
        let folder = spec.folder_name();
        let prefix = match spec.role {
            ComponentRole::Dependency => tree.install_prefix.clone(),
            ComponentRole::Application => tree.package_root.clone(),
        };
        Self {
            spec,
            profile,
            options,
            source_dir: tree.source_dir(&folder),
            build_dir: tree.build_dir(&folder),
            logs_dir: tree.logs_dir(spec.name),
            prefix,
            env: stage_env(profile, tree),
        }
    }

    pub fn configure_marker(&self) -> PathBuf {
        self.build_dir.join(CONFIGURE_MARKER)
    }

    fn stage(&self, kind: StageKind, invocation: Invocation) -> StageSpec {
        StageSpec::new(self.spec.name, kind, invocation.envs(&self.env), &self.logs_dir)
    }

    fn make(&self, target: Option<&str>) -> Invocation {
        let invocation = Invocation::new("make", &self.build_dir);
        match target {
            Some(target) => invocation.arg(target),
            None => invocation.arg(format!("-j{}", self.options.jobs)),
        }
    }
}

/// Toolchain variables plus the dependency prefix, layered onto the ambient
/// environment of every stage.
pub fn stage_env(profile: &PlatformProfile, tree: &ArtifactTree) -> Vec<BuildEnvVar> {
    let lib_dir = tree.install_lib_dir();
    let include_dir = tree.install_include_dir();
    let mut env: Vec<BuildEnvVar> = profile
        .toolchain
        .env()
        .into_iter()
        .map(|var| {
            if var.key == "LDFLAGS" {
                BuildEnvVar::new("LDFLAGS", format!("{} -L{}", var.value, lib_dir.display()))
            } else {
                var
            }
        })
        .collect();
    env.push(BuildEnvVar::new(
        "CPPFLAGS",
        format!("-I{}", include_dir.display()),
    ));
    env.push(BuildEnvVar::new(
        "PKG_CONFIG_PATH",
        tree.pkg_config_dir().display().to_string(),
    ));
    if profile.toolchain.cross_prefix.is_some() {
        // Keep the build machine's .pc files out of cross builds.
        env.push(BuildEnvVar::new(
            "PKG_CONFIG_LIBDIR",
            tree.pkg_config_dir().display().to_string(),
        ));
    }
    env
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigureOutcome {
    Skipped,
    Ran(Vec<BuildStageResult>),
}

pub trait BuildExecutor {
    /// Runs configure unless the marker shows a previous run succeeded.
    fn configure(&self, build: &ComponentBuild<'_>) -> Result<ConfigureOutcome, BuildError>;

    /// Builds and installs into the component's prefix.
    fn build(&self, build: &ComponentBuild<'_>) -> Result<Vec<BuildStageResult>, BuildError>;
}

pub fn executor_for<'r>(
    build_system: BuildSystem,
    runner: &'r dyn CommandRunner,
) -> Box<dyn BuildExecutor + 'r> {
    match build_system {
        BuildSystem::Autotools { bootstrap } => Box::new(AutotoolsExecutor { runner, bootstrap }),
        BuildSystem::Cmake => Box::new(CmakeExecutor { runner }),
    }
}

pub struct AutotoolsExecutor<'r> {
    runner: &'r dyn CommandRunner,
    bootstrap: Option<&'static str>,
}

impl BuildExecutor for AutotoolsExecutor<'_> {
    fn configure(&self, build: &ComponentBuild<'_>) -> Result<ConfigureOutcome, BuildError> {
        if build.configure_marker().exists() {
            info!(component = build.spec.name, "already configured, skipping configure");
            return Ok(ConfigureOutcome::Skipped);
        }
        create_dir(&build.build_dir)?;
        let mut results = Vec::new();
        let configure_script = build.source_dir.join("configure");
        if let Some(script) = self.bootstrap {
            if !configure_script.exists() {
                let invocation = Invocation::new("sh", &build.source_dir).arg(script);
                results.push(run_stage(
                    self.runner,
                    &build.stage(StageKind::Bootstrap, invocation),
                )?);
            }
        }

        let mut invocation = Invocation::new(
            configure_script.display().to_string(),
            &build.build_dir,
        )
        .arg(format!("--prefix={}", build.prefix.display()));
        if let Some(host) = &build.profile.toolchain.cross_prefix {
            invocation = invocation.arg(format!("--host={}", host));
        }
        let invocation = invocation.args(build.spec.configure_args_for(build.profile.platform));
        results.push(run_stage(
            self.runner,
            &build.stage(StageKind::Configure, invocation),
        )?);
        write_marker(build)?;
        Ok(ConfigureOutcome::Ran(results))
    }

    fn build(&self, build: &ComponentBuild<'_>) -> Result<Vec<BuildStageResult>, BuildError> {
        let install = if build.spec.role == ComponentRole::Application
            && build.options.should_strip()
        {
            StageKind::MakeInstallStrip
        } else {
            StageKind::MakeInstall
        };
        let mut stages = vec![(StageKind::Make, None), (install, Some(install_target(install)))];
        if build.spec.has_docs {
            if build.options.with_pdf {
                stages.push((StageKind::MakePdf, Some("pdf")));
                stages.push((StageKind::MakeInstallPdf, Some("install-pdf")));
            }
            if build.options.with_html {
                stages.push((StageKind::MakeHtml, Some("html")));
                stages.push((StageKind::MakeInstallHtml, Some("install-html")));
            }
        }
        run_make_stages(self.runner, build, &stages)
    }
}

pub struct CmakeExecutor<'r> {
    runner: &'r dyn CommandRunner,
}

impl BuildExecutor for CmakeExecutor<'_> {
    fn configure(&self, build: &ComponentBuild<'_>) -> Result<ConfigureOutcome, BuildError> {
        if build.configure_marker().exists() {
            info!(component = build.spec.name, "already configured, skipping configure");
            return Ok(ConfigureOutcome::Skipped);
        }
        create_dir(&build.build_dir)?;
        let build_type = if build.profile.debug { "Debug" } else { "Release" };
        let invocation = Invocation::new("cmake", &build.build_dir)
            .arg("-G")
            .arg("Unix Makefiles")
            .arg(format!("-DCMAKE_INSTALL_PREFIX={}", build.prefix.display()))
            .arg(format!("-DCMAKE_BUILD_TYPE={}", build_type))
            .arg(format!("-DCMAKE_PREFIX_PATH={}", build.prefix.display()))
            .args(build.spec.configure_args_for(build.profile.platform))
            .arg(build.source_dir.display().to_string());
        let result = run_stage(self.runner, &build.stage(StageKind::Configure, invocation))?;
        write_marker(build)?;
        Ok(ConfigureOutcome::Ran(vec![result]))
    }

    fn build(&self, build: &ComponentBuild<'_>) -> Result<Vec<BuildStageResult>, BuildError> {
        run_make_stages(
            self.runner,
            build,
            &[
                (StageKind::Make, None),
                (StageKind::MakeInstall, Some("install")),
            ],
        )
    }
}

fn install_target(kind: StageKind) -> &'static str {
    match kind {
        StageKind::MakeInstallStrip => "install-strip",
        _ => "install",
    }
}

fn run_make_stages(
    runner: &dyn CommandRunner,
    build: &ComponentBuild<'_>,
    stages: &[(StageKind, Option<&str>)],
) -> Result<Vec<BuildStageResult>, BuildError> {
    let mut results = Vec::with_capacity(stages.len());
    for (kind, target) in stages {
        let invocation = build.make(*target);
        results.push(run_stage(runner, &build.stage(*kind, invocation))?);
    }
    Ok(results)
}

fn create_dir(path: &Path) -> Result<(), BuildError> {
    fs::create_dir_all(path).map_err(|source| BuildError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_marker(build: &ComponentBuild<'_>) -> Result<(), BuildError> {
    let marker = build.configure_marker();
    fs::write(&marker, format!("{}\n", build.spec.folder_name())).map_err(|source| {
        BuildError::Io {
            path: marker.clone(),
            source,
        }
    })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::io::{self, Write};

    use ocdforge_core::platform::{profile, TargetBits, TargetPlatform, ToolchainOverrides};
    use ocdforge_core::release::release;

    use super::*;
    use crate::runner::{CapturedOutput, StageStatus};

    #[derive(Default)]
    struct RecordingRunner {
        calls: RefCell<Vec<Invocation>>,
    }

    impl CommandRunner for RecordingRunner {
        fn run(&self, invocation: &Invocation, sink: &mut dyn Write) -> io::Result<StageStatus> {
            self.calls.borrow_mut().push(invocation.clone());
            writeln!(sink, "ok")?;
            Ok(StageStatus::success())
        }

        fn capture(&self, invocation: &Invocation) -> io::Result<CapturedOutput> {
            self.calls.borrow_mut().push(invocation.clone());
            Ok(CapturedOutput {
                status: StageStatus::success(),
                stdout: String::new(),
                stderr: String::new(),
            })
        }
    }

    fn tree(root: &Path, platform: TargetPlatform) -> ArtifactTree {
        ArtifactTree::new(root, None, platform, TargetBits::B64, "openocd-0.11.0-1")
    }

    #[test]
    fn cross_env_points_pkg_config_at_prefix() {
        let profile = profile(
            TargetPlatform::Win32,
            TargetBits::B64,
            &ToolchainOverrides::default(),
            false,
        )
        .expect("profile");
        let env = stage_env(&profile, &tree(Path::new("/w"), TargetPlatform::Win32));
        let get = |key: &str| {
            env.iter()
                .find(|var| var.key == key)
                .map(|var| var.value.clone())
                .expect("var")
        };
        assert_eq!(get("PKG_CONFIG_LIBDIR"), "/w/win32-64/install/lib/pkgconfig");
        assert_eq!(get("CPPFLAGS"), "-I/w/win32-64/install/include");
        assert!(get("LDFLAGS").ends_with("-L/w/win32-64/install/lib"));
        assert_eq!(get("CC"), "x86_64-w64-mingw32-gcc");
    }

    #[test]
    fn application_configure_passes_every_feature_and_host() {
        let dir = tempfile::tempdir().expect("tempdir");
        let release = release("0.11.0-1").expect("release");
        let app = release.application().expect("app");
        let profile = profile(
            TargetPlatform::Win32,
            TargetBits::B32,
            &ToolchainOverrides::default(),
            false,
        )
        .expect("profile");
        let options = BuildOptions::default();
        let tree = tree(dir.path(), TargetPlatform::Win32);
        let build = ComponentBuild::new(app, &profile, &options, &tree);
        let runner = RecordingRunner::default();
        let executor = executor_for(app.build_system, &runner);

        let outcome = executor.configure(&build).expect("configure");
        let calls = runner.calls.borrow();
        assert!(matches!(outcome, ConfigureOutcome::Ran(ref stages) if stages.len() == 2));
        assert_eq!(calls[0].program, "sh");
        assert_eq!(calls[0].args, ["./bootstrap"]);
        let configure = &calls[1];
        assert!(configure.program.ends_with("configure"));
        assert!(configure
            .args
            .contains(&format!("--prefix={}", tree.package_root.display())));
        assert!(configure.args.contains(&"--host=i686-w64-mingw32".to_string()));
        assert!(configure.args.contains(&"--enable-parport-giveio".to_string()));
        assert!(build.configure_marker().exists());
    }

    #[test]
    fn marker_skips_configure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let release = release("0.11.0-1").expect("release");
        let libusb = release
            .components
            .iter()
            .find(|component| component.name == "libusb")
            .expect("libusb");
        let profile = profile(
            TargetPlatform::Linux,
            TargetBits::B64,
            &ToolchainOverrides::default(),
            false,
        )
        .expect("profile");
        let options = BuildOptions::default();
        let tree = tree(dir.path(), TargetPlatform::Linux);
        let build = ComponentBuild::new(libusb, &profile, &options, &tree);
        fs::create_dir_all(&build.build_dir).expect("mkdir");
        fs::write(build.configure_marker(), "libusb-1.0.24\n").expect("marker");

        let runner = RecordingRunner::default();
        let outcome = executor_for(libusb.build_system, &runner)
            .configure(&build)
            .expect("configure");
        assert_eq!(outcome, ConfigureOutcome::Skipped);
        assert!(runner.calls.borrow().is_empty());
    }

    #[test]
    fn application_build_runs_docs_and_strip_install() {
        let dir = tempfile::tempdir().expect("tempdir");
        let release = release("0.11.0-1").expect("release");
        let app = release.application().expect("app");
        let profile = profile(
            TargetPlatform::Linux,
            TargetBits::B64,
            &ToolchainOverrides::default(),
            false,
        )
        .expect("profile");
        let options = BuildOptions {
            jobs: 8,
            with_pdf: true,
            ..BuildOptions::default()
        };
        let tree = tree(dir.path(), TargetPlatform::Linux);
        let build = ComponentBuild::new(app, &profile, &options, &tree);
        let runner = RecordingRunner::default();

        let results = executor_for(app.build_system, &runner)
            .build(&build)
            .expect("build");
        let stages: Vec<StageKind> = results.iter().map(|result| result.stage).collect();
        assert_eq!(
            stages,
            [
                StageKind::Make,
                StageKind::MakeInstallStrip,
                StageKind::MakePdf,
                StageKind::MakeInstallPdf
            ]
        );
        assert_eq!(runner.calls.borrow()[0].args, ["-j8"]);
        assert!(results
            .iter()
            .all(|result| result.log_path.ends_with("make-openocd-output.txt")));
    }

    #[test]
    fn cmake_configure_targets_prefix() {
        let dir = tempfile::tempdir().expect("tempdir");
        let release = release("0.11.0-1").expect("release");
        let libftdi = release
            .components
            .iter()
            .find(|component| component.name == "libftdi")
            .expect("libftdi");
        let profile = profile(
            TargetPlatform::Darwin,
            TargetBits::B64,
            &ToolchainOverrides::default(),
            true,
        )
        .expect("profile");
        let options = BuildOptions::default();
        let tree = tree(dir.path(), TargetPlatform::Darwin);
        let build = ComponentBuild::new(libftdi, &profile, &options, &tree);
        let runner = RecordingRunner::default();

        executor_for(libftdi.build_system, &runner)
            .configure(&build)
            .expect("configure");
        let calls = runner.calls.borrow();
        assert_eq!(calls[0].program, "cmake");
        assert!(calls[0].args.contains(&format!(
            "-DCMAKE_INSTALL_PREFIX={}",
            tree.install_prefix.display()
        )));
        assert!(calls[0].args.contains(&"-DCMAKE_BUILD_TYPE=Debug".to_string()));
        assert_eq!(
            calls[0].args.last(),
            Some(&build.source_dir.display().to_string())
        );
    }
}
