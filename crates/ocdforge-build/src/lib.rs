pub mod executor;
pub mod fetch;
pub mod inspect;
pub mod pipeline;
pub mod postprocess;
pub mod runner;
pub mod stage;
pub mod workspace;

pub use executor::{executor_for, BuildExecutor, ConfigureOutcome};
pub use fetch::{Downloader, FetchError, FetchOutcome, Fetcher, HttpDownloader};
pub use inspect::{inspector_for, BinaryInspector, InspectError};
pub use pipeline::{PipelineError, ReleasePipeline, ReleaseReport, TargetRun};
pub use postprocess::{
    discover_closure, verify_package, DependencyClosure, FinishReport, LibraryResolver,
    PostProcessError, PostProcessor,
};
pub use runner::{CapturedOutput, CommandRunner, Invocation, StageStatus, SystemRunner};
pub use stage::{run_stage, BuildError, BuildStageResult, LogMode, StageKind, StageSpec};
