use std::path::PathBuf;

use anyhow::Context;
use ocdforge_build::{HttpDownloader, ReleasePipeline, SystemRunner};
use ocdforge_core::build_plan::BuildOptions;
use ocdforge_core::config::{ConfigInputs, PipelineConfig};
use ocdforge_pack::PackResult;

pub struct BuildArgs {
    pub platform: Option<String>,
    pub bits: Option<String>,
    pub release: Option<String>,
    pub work_dir: PathBuf,
    pub install_root: Option<PathBuf>,
    pub cc: Option<String>,
    pub cxx: Option<String>,
    pub options: BuildOptions,
}

pub struct BuildOutcome {
    pub package_root: PathBuf,
    pub build_info: PathBuf,
    pub archive: Option<PackResult>,
}

pub fn run(args: BuildArgs) -> anyhow::Result<BuildOutcome> {
    // Resolved before anything is spawned, so a bad platform or release
    // fails without side effects.
    let config = PipelineConfig::resolve(ConfigInputs {
        platform: args.platform,
        bits: args.bits,
        release: args.release,
        work_dir: args.work_dir,
        install_root: args.install_root,
        cc: args.cc,
        cxx: args.cxx,
        options: args.options,
    })
    .context("invalid build configuration")?;

    let runner = SystemRunner::default();
    let downloader = HttpDownloader::new()?;
    let report = ReleasePipeline::new(&config, &runner, &downloader).run()?;
    Ok(BuildOutcome {
        package_root: config.tree.package_root.clone(),
        build_info: report.build_info,
        archive: report.archive,
    })
}

pub fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|count| count.get())
        .unwrap_or(1)
}

/// `$HOME/Work/ocdforge`, or `./work` when there is no home directory.
pub fn default_work_dir() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join("Work").join("ocdforge"),
        None => PathBuf::from("work"),
    }
}
