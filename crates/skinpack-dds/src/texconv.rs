//! External mip chain generation.
//!
//! Missing mip levels are not computed here. The largest level is written to a
//! scratch file and handed to a command-line texture tool (texconv), whose
//! output is then merged back into the [`MipmapManager`](crate::MipmapManager).

use std::ffi::OsString;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use crate::format::FourCC;
use crate::header::Header;
use crate::log::DebugLog;
use crate::{Error, Result};

/// Output format argument for the mip tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolFormat {
    /// Format name as the tool spells it, e.g. `BC5_UNORM`.
    pub name: String,
    /// Request a DX10 extended header on output.
    pub dx10: bool,
}

impl ToolFormat {
    /// Derive the tool's format argument from a header.
    ///
    /// The tool does not accept the legacy `...U` / `ATI*` aliases, so those
    /// are spelled out in full.
    pub fn for_header(header: &Header) -> Result<Self> {
        if let Some(format) = header.dxgi_format() {
            let name = format.short_name().ok_or(Error::UnknownDxgiFormat(format.0))?;
            return Ok(Self {
                name: name.to_owned(),
                dx10: true,
            });
        }

        let name = match header.four_cc() {
            FourCC::BC4U | FourCC::ATI1 => "BC4_UNORM".to_owned(),
            FourCC::BC5U | FourCC::ATI2 => "BC5_UNORM".to_owned(),
            other => other.to_string(),
        };
        Ok(Self { name, dx10: false })
    }

    /// The `-f` argument pair, plus `-dx10` when requested.
    pub fn args(&self) -> Vec<OsString> {
        let mut args = vec![OsString::from("-f"), OsString::from(&self.name)];
        if self.dx10 {
            args.push(OsString::from("-dx10"));
        }
        args
    }
}

/// Something that turns a single-level DDS into one with a full mip chain.
pub trait MipTool {
    /// Generate a full chain for `input`, writing a same-named file into
    /// `out_dir`. Returns the path of the generated file.
    fn generate(
        &self,
        format: &ToolFormat,
        input: &Path,
        out_dir: &Path,
        log: &dyn DebugLog,
    ) -> Result<PathBuf>;
}

/// Runs texconv as a blocking child process.
#[derive(Debug, Clone)]
pub struct TexConv {
    path: PathBuf,
}

impl TexConv {
    /// Use the texconv executable at `path`.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Arguments for one invocation.
    pub fn args(format: &ToolFormat, input: &Path, out_dir: &Path) -> Vec<OsString> {
        let mut args = format.args();
        args.extend(["-nologo", "-m", "0", "-bc", "d", "-o"].map(OsString::from));
        args.push(out_dir.as_os_str().to_owned());
        args.push(OsString::from("-y"));
        args.push(input.as_os_str().to_owned());
        args
    }
}

impl MipTool for TexConv {
    fn generate(
        &self,
        format: &ToolFormat,
        input: &Path,
        out_dir: &Path,
        log: &dyn DebugLog,
    ) -> Result<PathBuf> {
        let file_name = input
            .file_name()
            .ok_or_else(|| Error::MissingToolOutput(input.to_path_buf()))?;
        let output = out_dir.join(file_name);

        let mut child = Command::new(&self.path)
            .args(Self::args(format, input, out_dir))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| Error::ToolSpawn {
                path: self.path.clone(),
                source,
            })?;

        // stderr is drained on its own thread so neither pipe can fill up and
        // stall the child.
        let stderr = child.stderr.take().map(|stderr| {
            thread::spawn(move || {
                BufReader::new(stderr)
                    .lines()
                    .map_while(std::io::Result::ok)
                    .collect::<Vec<_>>()
            })
        });

        if let Some(stdout) = child.stdout.take() {
            for line in BufReader::new(stdout).lines().map_while(std::io::Result::ok) {
                log.debug(&line);
            }
        }
        if let Some(handle) = stderr {
            for line in handle.join().unwrap_or_default() {
                log.debug(&line);
            }
        }

        let status = child.wait()?;
        if !status.success() {
            return Err(Error::ToolFailed(status));
        }
        if !output.is_file() {
            return Err(Error::MissingToolOutput(output));
        }
        Ok(output)
    }
}

/// Scratch directories for one conversion run.
///
/// Only one conversion may use a root at a time: preparing it deletes
/// whatever a previous run left behind.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    before: PathBuf,
    after: PathBuf,
}

impl ScratchDir {
    /// Reset `<root>/TexConv` and create its `Before` and `After` folders.
    pub fn prepare<P: AsRef<Path>>(root: P) -> Result<Self> {
        let base = root.as_ref().join("TexConv");
        if base.exists() {
            fs::remove_dir_all(&base)?;
        }

        let before = base.join("Before");
        let after = base.join("After");
        fs::create_dir_all(&before)?;
        fs::create_dir_all(&after)?;

        Ok(Self { before, after })
    }

    /// Where single-level inputs for the tool are written.
    pub fn before(&self) -> &Path {
        &self.before
    }

    /// Where the tool writes its output.
    pub fn after(&self) -> &Path {
        &self.after
    }
}
