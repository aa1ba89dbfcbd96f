use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use ocdforge_cli::commands::{build, check, platforms};
use ocdforge_cli::logging;
use ocdforge_core::build_plan::BuildOptions;

#[derive(Parser)]
#[command(name = "ocdforge", version, about = "Cross-platform OpenOCD release builder")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch, build, post-process and package one platform release.
    Build {
        /// Target platform (linux | darwin | win32); defaults to the host.
        #[arg(long, env = "TARGET_PLATFORM")]
        platform: Option<String>,
        /// Target word size (32 | 64).
        #[arg(long, env = "TARGET_BITS")]
        bits: Option<String>,
        /// Release version (overrides ocdforge.yaml).
        #[arg(long, env = "RELEASE_VERSION")]
        release: Option<String>,
        /// Work folder holding sources, build trees and archives.
        #[arg(long, env = "WORK_FOLDER_PATH")]
        work_dir: Option<PathBuf>,
        /// Dependency install prefix (default: <work>/<platform>-<bits>/install).
        #[arg(long, env = "INSTALL_FOLDER_PATH")]
        install_root: Option<PathBuf>,
        /// C compiler override.
        #[arg(long, env = "CC")]
        cc: Option<String>,
        /// C++ compiler override.
        #[arg(long, env = "CXX")]
        cxx: Option<String>,
        /// Keep debug symbols in the packaged binaries.
        #[arg(long)]
        disable_strip: bool,
        /// Build and install the PDF manual.
        #[arg(long, overrides_with = "without_pdf")]
        with_pdf: bool,
        /// Skip the PDF manual (default).
        #[arg(long, overrides_with = "with_pdf")]
        without_pdf: bool,
        /// Build and install the HTML manual.
        #[arg(long, overrides_with = "without_html")]
        with_html: bool,
        /// Skip the HTML manual (default).
        #[arg(long, overrides_with = "with_html")]
        without_html: bool,
        /// Parallel make jobs (default: available cores).
        #[arg(long)]
        jobs: Option<usize>,
        /// Keep the package tree between runs and skip the archive.
        #[arg(long)]
        develop: bool,
        /// Unoptimised build with symbols and verbose logging.
        #[arg(long)]
        debug: bool,
    },
    /// Re-verify an existing package tree.
    Check {
        /// Package folder (the one holding bin/ and build-info.json).
        #[arg(long)]
        package: PathBuf,
        /// Platform the package was built for; defaults to the host.
        #[arg(long)]
        platform: Option<String>,
        #[arg(long)]
        bits: Option<String>,
    },
    /// Print the platform matrix and feature states.
    Platforms,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let debug = matches!(cli.command, Command::Build { debug: true, .. });
    logging::init(debug);
    match run_cli(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {:#}", error);
            ExitCode::FAILURE
        }
    }
}

fn run_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Build {
            platform,
            bits,
            release,
            work_dir,
            install_root,
            cc,
            cxx,
            disable_strip,
            with_pdf,
            without_pdf: _,
            with_html,
            without_html: _,
            jobs,
            develop,
            debug,
        } => {
            let outcome = build::run(build::BuildArgs {
                platform,
                bits,
                release,
                work_dir: work_dir.unwrap_or_else(build::default_work_dir),
                install_root,
                cc,
                cxx,
                options: BuildOptions {
                    jobs: jobs.unwrap_or_else(build::default_jobs),
                    strip: !disable_strip,
                    with_pdf,
                    with_html,
                    develop,
                    debug,
                },
            })?;
            println!("package={}", outcome.package_root.display());
            println!("build_info={}", outcome.build_info.display());
            if let Some(archive) = outcome.archive {
                println!("archive={}", archive.archive_path.display());
                println!("checksum={}", archive.checksum_path.display());
                println!("sha256={}", archive.digest);
            }
            Ok(())
        }
        Command::Check {
            package,
            platform,
            bits,
        } => {
            let outcome = check::run(check::CheckArgs {
                package,
                platform,
                bits,
            })?;
            for binary in &outcome.binaries {
                println!("ok {}", binary.display());
            }
            println!(
                "{} package verified ({} binaries)",
                outcome.platform,
                outcome.binaries.len()
            );
            Ok(())
        }
        Command::Platforms => {
            print!("{}", platforms::render());
            Ok(())
        }
    }
}
