use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use ocdforge_core::build_plan::BuildEnvVar;

/// A fully described external command. The ambient environment is inherited;
/// `env` entries are layered on top of it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub env: Vec<BuildEnvVar>,
}

impl Invocation {
    pub fn new(program: impl Into<String>, working_dir: &Path) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: working_dir.to_path_buf(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn envs(mut self, env: &[BuildEnvVar]) -> Self {
        self.env.extend_from_slice(env);
        self
    }

    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                line.push('\'');
                line.push_str(arg);
                line.push('\'');
            } else {
                line.push_str(arg);
            }
        }
        line
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StageStatus {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
}

impl StageStatus {
    pub fn success() -> Self {
        Self { code: Some(0) }
    }

    pub fn exit(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapturedOutput {
    pub status: StageStatus,
    pub stdout: String,
    pub stderr: String,
}

pub trait CommandRunner {
    /// Runs to completion, writing stdout and stderr, merged in arrival
    /// order, to `sink`.
    fn run(&self, invocation: &Invocation, sink: &mut dyn Write) -> io::Result<StageStatus>;

    /// Runs to completion and returns both streams separately.
    fn capture(&self, invocation: &Invocation) -> io::Result<CapturedOutput>;
}

/// Spawns real processes.
#[derive(Clone, Debug)]
pub struct SystemRunner {
    echo: bool,
}

impl SystemRunner {
    /// `echo` also copies every output line to this process's stdout.
    pub fn new(echo: bool) -> Self {
        Self { echo }
    }

    fn command(invocation: &Invocation) -> Command {
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .current_dir(&invocation.working_dir)
            .stdin(Stdio::null());
        for var in &invocation.env {
            command.env(&var.key, &var.value);
        }
        command
    }

    fn tee(&self, mut reader: impl BufRead, sink: &mut dyn Write) -> io::Result<()> {
        let mut line = Vec::new();
        let stdout = io::stdout();
        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line)? == 0 {
                break;
            }
            sink.write_all(&line)?;
            if self.echo {
                let mut out = stdout.lock();
                out.write_all(&line)?;
                out.flush()?;
            }
        }
        sink.flush()
    }
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new(true)
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation, sink: &mut dyn Write) -> io::Result<StageStatus> {
        let (reader, writer) = io::pipe()?;
        let mut command = Self::command(invocation);
        command.stdout(writer.try_clone()?).stderr(writer);
        let mut child = command.spawn()?;
        // The command still owns the write ends; EOF only arrives once they close.
        drop(command);

        if let Err(error) = self.tee(BufReader::new(reader), sink) {
            // Do not leave the child running behind a dead sink.
            let _ = child.kill();
            let _ = child.wait();
            return Err(error);
        }

        let status = child.wait()?;
        Ok(StageStatus {
            code: status.code(),
        })
    }

    fn capture(&self, invocation: &Invocation) -> io::Result<CapturedOutput> {
        let output = Self::command(invocation).output()?;
        Ok(CapturedOutput {
            status: StageStatus {
                code: output.status.code(),
            },
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
