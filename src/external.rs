//! Invocation of the external `dd` byte-copy utility.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::{BenchError, Result};
use crate::report_parser::{self, ParsedReport};

#[derive(Clone, Debug)]
pub struct DdInvocation {
    program: OsString,
    input: PathBuf,
    output: PathBuf,
    block_size: u64,
    count: u64,
}

impl DdInvocation {
    /// Copy `file_size / block_size` whole blocks from `input` to `output`.
    /// Remainder bytes are not transferred.
    pub fn new(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        block_size: u64,
        file_size: u64,
    ) -> Result<Self> {
        if block_size == 0 {
            return Err(BenchError::invalid("block size must be non-zero"));
        }
        if file_size < block_size {
            return Err(BenchError::invalid(format!(
                "file size {file_size} is smaller than block size {block_size}"
            )));
        }
        Ok(Self {
            program: OsString::from("dd"),
            input: input.into(),
            output: output.into(),
            block_size,
            count: file_size / block_size,
        })
    }

    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Bytes that will actually be moved.
    pub fn bytes(&self) -> u64 {
        self.count * self.block_size
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn args(&self) -> Vec<OsString> {
        let mut input = OsString::from("if=");
        input.push(&self.input);
        let mut output = OsString::from("of=");
        output.push(&self.output);

        // Every call carries `oflag=dsync`, reads to /dev/null included.
        vec![
            input,
            output,
            OsString::from(format!("bs={}", self.block_size)),
            OsString::from(format!("count={}", self.count)),
            OsString::from("oflag=dsync"),
        ]
    }

    /// Run the utility and parse the rate it reports on stderr.
    ///
    /// A non-zero exit is returned as [`BenchError::ToolInvocationFailure`] and the report is
    /// not parsed.
    pub fn run(&self) -> Result<ParsedReport> {
        debug!(program = ?self.program, args = ?self.args(), "running external copy");
        let output = Command::new(&self.program).args(self.args()).output()?;
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            return Err(BenchError::ToolInvocationFailure {
                tool: self.program.to_string_lossy().into_owned(),
                status: output.status,
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(report_parser::parse(&stderr))
    }
}
