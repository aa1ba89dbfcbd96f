//! Drives one release through fetch, build, post-processing and packaging.

use std::path::PathBuf;

use ocdforge_core::artifact::package_layout;
use ocdforge_core::build_plan::ArtifactTree;
use ocdforge_core::component::{ComponentRole, ComponentSpec};
use ocdforge_core::config::PipelineConfig;
use ocdforge_core::provenance::BuildInfo;
use ocdforge_core::state::{StateTracker, TargetState, TransitionError};
use ocdforge_pack::{
    copy_licenses, create_archive, prepare_package_root, validate_package, write_build_info,
    PackError, PackRequest, PackResult,
};
use thiserror::Error;
use tracing::{error, info};

use crate::executor::{executor_for, ComponentBuild, ConfigureOutcome};
use crate::fetch::{Downloader, FetchError, FetchOutcome, Fetcher};
use crate::inspect::{inspector_for, BinaryInspector};
use crate::postprocess::{
    verify_package, FinishReport, LibraryResolver, PostProcessError, PostProcessor,
};
use crate::runner::CommandRunner;
use crate::stage::{BuildError, BuildStageResult};
use crate::workspace::{prepare_platform_tree, HostStamp};

#[derive(Debug, Error)]
pub enum ComponentError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    PostProcess(#[from] PostProcessError),
    #[error(transparent)]
    Pack(#[from] PackError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{component} failed during {stage}: {source}")]
    Component {
        component: String,
        stage: String,
        #[source]
        source: ComponentError,
    },
    #[error("cannot prepare work tree: {0}")]
    Workspace(#[source] BuildError),
    #[error("packaging failed: {0}")]
    Pack(#[from] PackError),
    #[error("package verification failed: {0}")]
    Verify(#[from] PostProcessError),
    #[error("cannot assemble build-info.json: {0}")]
    Provenance(#[from] serde_json::Error),
    #[error("release {0} has no application component")]
    NoApplication(String),
}

/// What happened to one component.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetRun {
    pub name: String,
    pub history: Vec<TargetState>,
    pub fetch: FetchOutcome,
    pub configure_skipped: bool,
    pub stages: Vec<BuildStageResult>,
    pub finished: Vec<FinishReport>,
}

#[derive(Clone, Debug)]
pub struct ReleaseReport {
    pub targets: Vec<TargetRun>,
    pub build_info: PathBuf,
    /// `None` in develop mode.
    pub archive: Option<PackResult>,
}

pub struct ReleasePipeline<'a> {
    config: &'a PipelineConfig,
    runner: &'a dyn CommandRunner,
    downloader: &'a dyn Downloader,
    inspector: Box<dyn BinaryInspector + 'a>,
}

impl<'a> ReleasePipeline<'a> {
    pub fn new(
        config: &'a PipelineConfig,
        runner: &'a dyn CommandRunner,
        downloader: &'a dyn Downloader,
    ) -> Self {
        Self {
            config,
            runner,
            downloader,
            inspector: inspector_for(&config.profile, runner),
        }
    }

    pub fn with_inspector(mut self, inspector: Box<dyn BinaryInspector + 'a>) -> Self {
        self.inspector = inspector;
        self
    }

    pub fn run(&self) -> Result<ReleaseReport, PipelineError> {
        let config = self.config;
        let tree = &config.tree;
        let platform = config.platform();
        let application = config
            .release
            .application()
            .ok_or_else(|| PipelineError::NoApplication(config.release.version.to_string()))?;
        info!(
            release = config.release.version,
            %platform,
            bits = %config.bits(),
            "starting release build"
        );

        let stamp = HostStamp::current(&config.profile);
        prepare_platform_tree(&tree.platform_root, &stamp).map_err(PipelineError::Workspace)?;
        // An install root outside the platform tree is guarded on its own.
        if !tree.install_prefix.starts_with(&tree.platform_root) {
            prepare_platform_tree(&tree.install_prefix, &stamp)
                .map_err(PipelineError::Workspace)?;
        }
        prepare_package_root(&tree.package_root, config.options.develop)?;

        let mut targets = Vec::new();
        for spec in config.release.components_for(platform) {
            targets.push(self.run_component(spec)?);
        }

        let info = BuildInfo::from_config(config)?;
        let build_info = write_build_info(&tree.package_root, &info)?;
        validate_package(&tree.package_root, platform, application.executables)?;
        verify_package(self.inspector.as_ref(), platform, &tree.package_root)?;

        let archive = if config.options.develop {
            info!("develop mode, leaving the package tree unarchived");
            None
        } else {
            Some(create_archive(&PackRequest {
                kind: config.profile.archive_kind,
                source_dir: tree.package_root.clone(),
                archive_root: application_folder(tree),
                output_dir: tree.deploy_dir.clone(),
                archive_name: config.archive_name.clone(),
            })?)
        };
        info!(release = config.release.version, "release build finished");
        Ok(ReleaseReport {
            targets,
            build_info,
            archive,
        })
    }

    fn run_component(&self, spec: &ComponentSpec) -> Result<TargetRun, PipelineError> {
        let mut tracker = StateTracker::new(spec.name);
        let mut run = TargetRun {
            name: spec.name.to_string(),
            history: Vec::new(),
            fetch: FetchOutcome::AlreadyPresent,
            configure_skipped: false,
            stages: Vec::new(),
            finished: Vec::new(),
        };
        match self.advance_component(spec, &mut tracker, &mut run) {
            Ok(()) => {
                run.history = tracker.history().to_vec();
                Ok(run)
            }
            Err(source) => {
                let stage = failed_stage(tracker.current(), &source);
                tracker.fail();
                error!(component = spec.name, %stage, error = %source, "component failed");
                Err(PipelineError::Component {
                    component: spec.name.to_string(),
                    stage,
                    source,
                })
            }
        }
    }

    fn advance_component(
        &self,
        spec: &ComponentSpec,
        tracker: &mut StateTracker,
        run: &mut TargetRun,
    ) -> Result<(), ComponentError> {
        let config = self.config;
        let tree = &config.tree;
        let build = ComponentBuild::new(spec, &config.profile, &config.options, tree);
        info!(component = spec.name, version = spec.version, "building component");

        let fetcher = Fetcher::new(
            self.runner,
            self.downloader,
            &tree.cache_dir(),
            &build.logs_dir,
        );
        run.fetch = fetcher.ensure_source(&spec.target(&build.build_dir), &build.source_dir)?;
        tracker.advance(TargetState::Fetched)?;

        let executor = executor_for(spec.build_system, self.runner);
        match executor.configure(&build)? {
            ConfigureOutcome::Skipped => run.configure_skipped = true,
            ConfigureOutcome::Ran(results) => run.stages.extend(results),
        }
        tracker.advance(TargetState::Configured)?;

        run.stages.extend(executor.build(&build)?);
        tracker.advance(TargetState::Built)?;

        if spec.role == ComponentRole::Application {
            let processor = PostProcessor::new(
                self.inspector.as_ref(),
                config.platform(),
                &tree.package_root,
                self.resolver(),
                config.options.should_strip(),
            );
            let bin_dir = tree
                .package_root
                .join(package_layout(config.platform()).executable_dir);
            for executable in spec.executables {
                let path = bin_dir.join(config.profile.executable_name(executable));
                run.finished.push(processor.finish_binary(&path)?);
            }
        }
        tracker.advance(TargetState::PostProcessed)?;

        copy_licenses(
            &build.source_dir,
            spec.name,
            spec.version,
            spec.license_files,
            &tree.package_root,
        )?;
        tracker.advance(TargetState::Packaged)?;
        tracker.advance(TargetState::Done)?;
        Ok(())
    }

    /// Dependency prefix first, then the package itself, then extra
    /// directories from the config file.
    fn resolver(&self) -> LibraryResolver {
        let tree = &self.config.tree;
        let mut dirs = vec![
            tree.install_lib_dir(),
            tree.install_prefix.join("bin"),
            tree.package_root.join("lib"),
        ];
        dirs.extend(self.config.library_search_dirs.iter().cloned());
        LibraryResolver::new(dirs)
    }
}

fn application_folder(tree: &ArtifactTree) -> String {
    tree.package_root
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Names the step that was running: the failing build stage when known,
/// otherwise the state the component was trying to reach.
fn failed_stage(reached: TargetState, error: &ComponentError) -> String {
    if let ComponentError::Build(build) = error {
        if let Some(stage) = build.stage() {
            return stage.to_string();
        }
    }
    match error {
        ComponentError::Fetch(_) => "fetch".to_string(),
        _ => reached
            .next()
            .map(|state| state.to_string())
            .unwrap_or_else(|| reached.to_string()),
    }
}
