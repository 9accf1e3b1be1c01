//! External-tool backend: ImageMagick or GraphicsMagick.
//!
//! Each operation is one blocking subprocess call:
//!
//! | Operation | ImageMagick | GraphicsMagick |
//! |---|---|---|
//! | identify | `identify -format "%w %h %A %[EXIF:Orientation]" src[0]` | `gm identify -format ...` |
//! | metadata | `identify -format "%w %h\n%[EXIF:*]" src[0]` | `gm identify -format ...` |
//! | resize | `convert src[0] -auto-orient -resize WxH> ... out` | `gm convert ...` |
//!
//! Argument construction is kept in pure functions ([`convert_args`],
//! [`parse_identify`], [`parse_exif`]) so it can be tested without the tools
//! installed.

use super::backend::{BackendError, ImageBackend, ImageInfo, ImageMetadata};
use super::params::ResizeParams;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

const IDENTIFY_FORMAT: &str = "%w %h %A %[EXIF:Orientation]";
const METADATA_FORMAT: &str = "%w %h\n%[EXIF:*]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MagickFlavor {
    ImageMagick,
    GraphicsMagick,
}

/// Backend driving `convert`/`identify` (or `gm convert`/`gm identify`).
#[derive(Debug, Clone)]
pub struct MagickBackend {
    flavor: MagickFlavor,
    /// Directory holding the binaries; `None` searches `$PATH`.
    bin_dir: Option<PathBuf>,
}

impl MagickBackend {
    pub fn new(flavor: MagickFlavor, bin_dir: Option<PathBuf>) -> Self {
        Self { flavor, bin_dir }
    }

    pub fn flavor(&self) -> MagickFlavor {
        self.flavor
    }

    fn program(&self, name: &str) -> PathBuf {
        match &self.bin_dir {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        }
    }

    /// Build a command for `tool` ("convert" or "identify").
    fn command(&self, tool: &str) -> (Command, PathBuf) {
        match self.flavor {
            MagickFlavor::ImageMagick => {
                let program = self.program(tool);
                (Command::new(&program), program)
            }
            MagickFlavor::GraphicsMagick => {
                let program = self.program("gm");
                let mut cmd = Command::new(&program);
                cmd.arg(tool);
                (cmd, program)
            }
        }
    }

    /// Run a tool and return its stdout.
    fn run(&self, tool: &str, args: Vec<OsString>) -> Result<String, BackendError> {
        let (mut cmd, program) = self.command(tool);
        cmd.args(args);
        tracing::debug!(command = ?cmd, "running image tool");

        let output = cmd.output().map_err(|e| match e.kind() {
            ErrorKind::NotFound => BackendError::ToolNotFound(program.display().to_string()),
            _ => BackendError::Io(e),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BackendError::ProcessingFailed(format!(
                "{} {} exited with {}: {}",
                program.display(),
                tool,
                output.status,
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// First frame of a (possibly multi-frame) source.
fn first_frame(path: &Path) -> OsString {
    let mut arg = path.as_os_str().to_os_string();
    arg.push("[0]");
    arg
}

fn output_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Arguments for the `convert` call that writes `params.output`.
pub fn convert_args(params: &ResizeParams) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![first_frame(&params.source)];
    if params.auto_orient {
        args.push("-auto-orient".into());
    }
    // `>` only ever shrinks
    args.push("-resize".into());
    args.push(format!("{}x{}>", params.max_width, params.max_height).into());
    if !params.keep_metadata {
        args.push("-strip".into());
    }
    args.push("-quality".into());
    args.push(params.quality.value().to_string().into());
    if matches!(output_extension(&params.output).as_str(), "jpg" | "jpeg") {
        // Transparent areas would otherwise turn black
        args.extend(["-background", "white", "-flatten"].map(OsString::from));
    }
    args.push(params.output.as_os_str().to_os_string());
    args
}

/// Parse `"%w %h %A %[EXIF:Orientation]"` output, e.g. `"800 600 True 6"`.
///
/// `%A` is `True`/`False` on older releases and `Blend`/`Undefined` on
/// newer ImageMagick. The orientation is empty when the image has no EXIF
/// data; only values 2 to 8 need a transform.
pub fn parse_identify(output: &str) -> Result<ImageInfo, BackendError> {
    let malformed = || BackendError::ProcessingFailed(format!("Unexpected identify output: {output:?}"));
    let mut parts = output.split_whitespace();
    let width = parts.next().and_then(|w| w.parse().ok()).ok_or_else(malformed)?;
    let height = parts.next().and_then(|h| h.parse().ok()).ok_or_else(malformed)?;
    let has_alpha = parts.next().is_some_and(|a| {
        !matches!(
            a.to_ascii_lowercase().as_str(),
            "false" | "undefined" | "off"
        )
    });
    let rotated = parts
        .next()
        .and_then(|o| o.parse::<u16>().ok())
        .is_some_and(|o| (2..=8).contains(&o));
    Ok(ImageInfo {
        width,
        height,
        has_alpha,
        rotated,
    })
}

/// Parse `"%w %h\n%[EXIF:*]"` output into dimensions and EXIF tags.
pub fn parse_exif(output: &str) -> Result<ImageMetadata, BackendError> {
    let mut lines = output.lines();
    let info = parse_identify(lines.next().unwrap_or(""))?;
    let raw: BTreeMap<String, String> = lines
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let key = key.trim();
            let key = key
                .strip_prefix("exif:")
                .or_else(|| key.strip_prefix("EXIF:"))
                .unwrap_or(key);
            (key.to_string(), value.trim().to_string())
        })
        .filter(|(key, _)| !key.is_empty())
        .collect();
    Ok(ImageMetadata {
        width: info.width,
        height: info.height,
        raw,
    })
}

impl ImageBackend for MagickBackend {
    fn identify(&self, path: &Path) -> Result<ImageInfo, BackendError> {
        let stdout = self.run(
            "identify",
            vec!["-format".into(), IDENTIFY_FORMAT.into(), first_frame(path)],
        )?;
        parse_identify(&stdout)
    }

    fn read_metadata(&self, path: &Path) -> Result<ImageMetadata, BackendError> {
        let stdout = self.run(
            "identify",
            vec!["-format".into(), METADATA_FORMAT.into(), first_frame(path)],
        )?;
        parse_exif(&stdout)
    }

    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError> {
        self.run("convert", convert_args(params))?;
        if !params.output.exists() {
            return Err(BackendError::ProcessingFailed(format!(
                "convert produced no output at {}",
                params.output.display()
            )));
        }
        Ok(())
    }
}
