use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{error, info};

use crate::runner::{CommandRunner, Invocation};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageKind {
    Fetch,
    Bootstrap,
    Configure,
    Make,
    MakeInstall,
    MakeInstallStrip,
    MakePdf,
    MakeInstallPdf,
    MakeHtml,
    MakeInstallHtml,
}

impl StageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StageKind::Fetch => "fetch",
            StageKind::Bootstrap => "bootstrap",
            StageKind::Configure => "configure",
            StageKind::Make => "make",
            StageKind::MakeInstall => "make install",
            StageKind::MakeInstallStrip => "make install-strip",
            StageKind::MakePdf => "make pdf",
            StageKind::MakeInstallPdf => "make install-pdf",
            StageKind::MakeHtml => "make html",
            StageKind::MakeInstallHtml => "make install-html",
        }
    }

    /// Stages sharing a prefix share a log file.
    pub fn log_prefix(self) -> &'static str {
        match self {
            StageKind::Fetch => "fetch",
            StageKind::Bootstrap => "bootstrap",
            StageKind::Configure => "configure",
            StageKind::Make
            | StageKind::MakeInstall
            | StageKind::MakeInstallStrip
            | StageKind::MakePdf
            | StageKind::MakeInstallPdf
            | StageKind::MakeHtml
            | StageKind::MakeInstallHtml => "make",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `<logs>/<prefix>-<component>-output.txt`
pub fn log_path(logs_dir: &Path, kind: StageKind, component: &str) -> PathBuf {
    logs_dir.join(format!("{}-{}-output.txt", kind.log_prefix(), component))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogMode {
    Truncate,
    Append,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageSpec {
    pub component: String,
    pub kind: StageKind,
    pub invocation: Invocation,
    pub log_path: PathBuf,
    pub log_mode: LogMode,
}

impl StageSpec {
    pub fn new(component: &str, kind: StageKind, invocation: Invocation, logs_dir: &Path) -> Self {
        let log_mode = match kind {
            StageKind::Fetch | StageKind::Bootstrap | StageKind::Configure | StageKind::Make => {
                LogMode::Truncate
            }
            _ => LogMode::Append,
        };
        Self {
            component: component.to_string(),
            kind,
            log_path: log_path(logs_dir, kind, component),
            invocation,
            log_mode,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildStageResult {
    pub component: String,
    pub stage: StageKind,
    pub exit_code: Option<i32>,
    pub log_path: PathBuf,
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(
        "{stage} of {component} failed ({}); see {}",
        describe_exit(*code),
        log.display()
    )]
    StageFailed {
        component: String,
        stage: StageKind,
        code: Option<i32>,
        log: PathBuf,
    },
    #[error("{stage} of {component}: cannot run '{program}': {source}")]
    Spawn {
        component: String,
        stage: StageKind,
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("cannot write log '{}': {source}", path.display())]
    Log {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("i/o error at '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl BuildError {
    pub fn stage(&self) -> Option<StageKind> {
        match self {
            BuildError::StageFailed { stage, .. } | BuildError::Spawn { stage, .. } => Some(*stage),
            BuildError::Log { .. } | BuildError::Io { .. } => None,
        }
    }
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit status {}", code),
        None => "terminated by signal".to_string(),
    }
}

/// Runs one stage, persisting its merged output. The log starts with the
/// command line and ends with the exit status, so it is never empty even
/// when the command prints nothing.
pub fn run_stage(
    runner: &dyn CommandRunner,
    spec: &StageSpec,
) -> Result<BuildStageResult, BuildError> {
    let log_error = |source: io::Error| BuildError::Log {
        path: spec.log_path.clone(),
        source,
    };
    if let Some(parent) = spec.log_path.parent() {
        fs::create_dir_all(parent).map_err(log_error)?;
    }
    let mut log = OpenOptions::new()
        .create(true)
        .write(true)
        .append(spec.log_mode == LogMode::Append)
        .truncate(spec.log_mode == LogMode::Truncate)
        .open(&spec.log_path)
        .map_err(log_error)?;
    writeln!(
        log,
        "# {} ({}) in {}",
        spec.kind,
        spec.component,
        spec.invocation.working_dir.display()
    )
    .and_then(|_| writeln!(log, "$ {}", spec.invocation.command_line()))
    .map_err(log_error)?;

    info!(
        component = %spec.component,
        stage = %spec.kind,
        log = %spec.log_path.display(),
        "running stage"
    );
    let status = match runner.run(&spec.invocation, &mut log) {
        Ok(status) => status,
        Err(source) => {
            let _ = writeln!(log, "# failed to start: {}", source);
            let _ = log.flush();
            return Err(BuildError::Spawn {
                component: spec.component.clone(),
                stage: spec.kind,
                program: spec.invocation.program.clone(),
                source,
            });
        }
    };
    writeln!(log, "# {}", describe_exit(status.code))
        .and_then(|_| log.flush())
        .map_err(log_error)?;

    if !status.is_success() {
        error!(
            component = %spec.component,
            stage = %spec.kind,
            code = ?status.code,
            "stage failed"
        );
        return Err(BuildError::StageFailed {
            component: spec.component.clone(),
            stage: spec.kind,
            code: status.code,
            log: spec.log_path.clone(),
        });
    }
    Ok(BuildStageResult {
        component: spec.component.clone(),
        stage: spec.kind,
        exit_code: status.code,
        log_path: spec.log_path.clone(),
    })
}
