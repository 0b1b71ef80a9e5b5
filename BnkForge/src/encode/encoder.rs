//! The external encoder boundary
//!
//! Everything above this module only sees the [`Encoder`] trait:
//! one input file and one quality value in, one artifact out. The real
//! implementation shells out to the Wwise console; tests substitute
//! deterministic stubs.

use std::ffi::OsString;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use walkdir::WalkDir;

use crate::config::EncoderConfig;
use crate::error::{Error, Result};

use super::progress::CancelToken;

/// How often a running encoder is polled for exit, timeout and cancellation
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Maximum stderr excerpt carried in an error
const STDERR_EXCERPT_LEN: usize = 2048;

/// Descriptor file written next to each probe's output
const DESCRIPTOR_NAME: &str = "sources.wsources";

/// An artifact written by one encoder invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedArtifact {
    pub path: PathBuf,
    pub size: u64,
}

impl EncodedArtifact {
    /// Describe an artifact already on disk
    pub fn from_path(path: PathBuf) -> Result<Self> {
        let size = std::fs::metadata(&path)?.len();
        Ok(Self { path, size })
    }
}

/// Something that turns an audio file into an encoded artifact
pub trait Encoder {
    /// Encode `input` at `quality`, writing the artifact under `out_dir`
    ///
    /// The artifact name must depend only on `input`, so repeated calls with
    /// the same input overwrite each other. Implementations should give up
    /// with [`Error::Cancelled`] once `cancel` is set.
    fn encode(
        &self,
        input: &Path,
        quality: i32,
        out_dir: &Path,
        cancel: &CancelToken,
    ) -> Result<EncodedArtifact>;
}

impl<E: Encoder + ?Sized> Encoder for &E {
    fn encode(
        &self,
        input: &Path,
        quality: i32,
        out_dir: &Path,
        cancel: &CancelToken,
    ) -> Result<EncodedArtifact> {
        (**self).encode(input, quality, out_dir, cancel)
    }
}

impl<E: Encoder + ?Sized> Encoder for Box<E> {
    fn encode(
        &self,
        input: &Path,
        quality: i32,
        out_dir: &Path,
        cancel: &CancelToken,
    ) -> Result<EncodedArtifact> {
        (**self).encode(input, quality, out_dir, cancel)
    }
}

/// Runs an external encoder executable (the Wwise console by default)
#[derive(Debug, Clone)]
pub struct ExternalEncoder {
    config: EncoderConfig,
    program: PathBuf,
}

impl ExternalEncoder {
    /// Resolve the configured program and build an encoder
    pub fn new(config: EncoderConfig) -> Result<Self> {
        let program = find_program(&config.program)?;
        tracing::debug!("Using encoder at {}", program.display());
        Ok(Self { config, program })
    }

    /// Resolved encoder executable
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    #[must_use]
    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Conversion name for a quality value
    #[must_use]
    pub fn conversion_name(&self, quality: i32) -> String {
        self.config
            .conversion
            .replace("{quality}", &quality.to_string())
    }

    /// Expand the argument template for one invocation
    #[must_use]
    pub fn build_args(
        &self,
        input: &Path,
        quality: i32,
        descriptor: &Path,
        out_dir: &Path,
    ) -> Vec<OsString> {
        let project = self
            .config
            .project
            .as_ref()
            .map(|p| shellexpand::tilde(&p.to_string_lossy()).into_owned())
            .unwrap_or_default();

        self.config
            .args
            .iter()
            .map(|arg| match arg.as_str() {
                // Whole-argument placeholders keep non-UTF-8 paths intact
                "{input}" => input.as_os_str().to_os_string(),
                "{descriptor}" => descriptor.as_os_str().to_os_string(),
                "{output_dir}" => out_dir.as_os_str().to_os_string(),
                "{project}" => OsString::from(&project),
                _ => OsString::from(
                    arg.replace("{input}", &input.to_string_lossy())
                        .replace("{descriptor}", &descriptor.to_string_lossy())
                        .replace("{output_dir}", &out_dir.to_string_lossy())
                        .replace("{project}", &project)
                        .replace("{quality}", &quality.to_string()),
                ),
            })
            .collect()
    }

    /// Find the artifact produced for `input` anywhere under `out_dir`
    fn find_artifact(&self, input: &Path, out_dir: &Path) -> Option<PathBuf> {
        let wanted = artifact_file_name(input, &self.config.artifact_extension)?;
        WalkDir::new(out_dir)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_file() && e.file_name() == wanted.as_os_str())
            .map(walkdir::DirEntry::into_path)
            .next()
    }

    /// Remove artifacts left by a previous probe so they cannot be mistaken for new output
    fn clear_stale_artifacts(&self, input: &Path, out_dir: &Path) -> Result<()> {
        while let Some(stale) = self.find_artifact(input, out_dir) {
            std::fs::remove_file(&stale)?;
        }
        Ok(())
    }
}

impl Encoder for ExternalEncoder {
    fn encode(
        &self,
        input: &Path,
        quality: i32,
        out_dir: &Path,
        cancel: &CancelToken,
    ) -> Result<EncodedArtifact> {
        cancel.check()?;
        std::fs::create_dir_all(out_dir)?;
        self.clear_stale_artifacts(input, out_dir)?;

        let descriptor = out_dir.join(DESCRIPTOR_NAME);
        write_descriptor(&descriptor, input, &self.conversion_name(quality))?;

        let log_path = out_dir.join("encoder.log");
        let log = File::create(&log_path)?;

        let args = self.build_args(input, quality, &descriptor, out_dir);
        tracing::debug!("Running {} {:?}", self.program.display(), args);

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(log))
            .spawn()
            .map_err(|e| Error::ExternalTool {
                message: format!("failed to start {}: {e}", self.program.display()),
            })?;

        let timeout = self.config.timeout();
        let started = Instant::now();

        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if cancel.is_cancelled() {
                let _ = child.kill();
                let _ = child.wait();
                tracing::info!("Encoder killed on cancellation");
                return Err(Error::Cancelled);
            }
            if started.elapsed() >= timeout {
                let _ = child.kill();
                let _ = child.wait();
                tracing::warn!(
                    "Encoder exceeded {}s on {}",
                    timeout.as_secs(),
                    input.display()
                );
                return Err(Error::EncoderTimeout {
                    secs: timeout.as_secs(),
                });
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        if !status.success() {
            return Err(Error::ExternalTool {
                message: format!("exited with {status}: {}", read_log_excerpt(&log_path)),
            });
        }

        let path = self
            .find_artifact(input, out_dir)
            .ok_or_else(|| Error::ExternalTool {
                message: format!(
                    "no .{} artifact for {} under {}",
                    self.config.artifact_extension,
                    input.display(),
                    out_dir.display()
                ),
            })?;

        tracing::debug!(
            "Encoded {} at q={} in {:.2}s",
            input.display(),
            quality,
            started.elapsed().as_secs_f64()
        );

        EncodedArtifact::from_path(path)
    }
}

/// `<input stem>.<extension>`
#[must_use]
pub fn artifact_file_name(input: &Path, extension: &str) -> Option<PathBuf> {
    let stem = input.file_stem()?;
    Some(PathBuf::from(stem).with_extension(extension))
}

/// Write an external-sources list naming one input and its conversion
pub fn write_descriptor(path: &Path, input: &Path, conversion: &str) -> Result<()> {
    let root = input
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = input
        .file_name()
        .ok_or_else(|| Error::InvalidPath(input.display().to_string()))?
        .to_string_lossy()
        .into_owned();

    let mut output = Vec::new();
    let mut writer = Writer::new_with_indent(&mut output, b'\t', 1);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let mut list = BytesStart::new("ExternalSourcesList");
    list.push_attribute(("SchemaVersion", "1"));
    list.push_attribute(("Root", root.as_str()));
    writer.write_event(Event::Start(list))?;

    let mut source = BytesStart::new("Source");
    source.push_attribute(("Path", file_name.as_str()));
    source.push_attribute(("Conversion", conversion));
    writer.write_event(Event::Empty(source))?;

    writer.write_event(Event::End(BytesEnd::new("ExternalSourcesList")))?;

    output.push(b'\n');
    std::fs::write(path, output)?;
    Ok(())
}

/// Resolve an executable from an explicit path or from PATH
fn find_program(program: &str) -> Result<PathBuf> {
    let expanded = PathBuf::from(shellexpand::tilde(program).into_owned());
    if expanded.components().count() > 1 || expanded.is_absolute() {
        if expanded.is_file() {
            return Ok(expanded);
        }
        return Err(Error::EncoderNotFound {
            program: program.to_string(),
        });
    }

    which::which(program).map_err(|_| Error::EncoderNotFound {
        program: program.to_string(),
    })
}

fn read_log_excerpt(path: &Path) -> String {
    let text = std::fs::read_to_string(path).unwrap_or_default();
    let text = text.trim();
    if text.is_empty() {
        return "no output".to_string();
    }
    let start = text
        .char_indices()
        .rev()
        .nth(STDERR_EXCERPT_LEN)
        .map_or(0, |(i, _)| i);
    text[start..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoder_with(config: EncoderConfig) -> ExternalEncoder {
        ExternalEncoder {
            program: PathBuf::from(&config.program),
            config,
        }
    }

    #[test]
    fn test_build_args_default_template() {
        let mut config = EncoderConfig::default();
        config.project = Some(PathBuf::from("/projects/Mod.wproj"));
        let encoder = encoder_with(config);

        let args = encoder.build_args(
            Path::new("/audio/1234.wav"),
            3,
            Path::new("/tmp/job/sources.wsources"),
            Path::new("/tmp/job/out"),
        );
        let args: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(
            args,
            vec![
                "convert-external-source",
                "/projects/Mod.wproj",
                "--source-file",
                "/tmp/job/sources.wsources",
                "--output",
                "/tmp/job/out",
            ]
        );
    }

    #[test]
    fn test_build_args_embedded_placeholders() {
        let config = EncoderConfig {
            args: vec!["-q{quality}".to_string(), "--in={input}".to_string()],
            ..EncoderConfig::default()
        };
        let encoder = encoder_with(config);
        let args = encoder.build_args(Path::new("a.wav"), -2, Path::new("d"), Path::new("o"));
        assert_eq!(args, vec![OsString::from("-q-2"), OsString::from("--in=a.wav")]);
    }

    #[test]
    fn test_conversion_name() {
        let encoder = encoder_with(EncoderConfig::default());
        assert_eq!(encoder.conversion_name(7), "Vorbis Quality 7");
    }

    #[test]
    fn test_write_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sources.wsources");
        write_descriptor(&path, Path::new("/audio/in/1234.wav"), "Vorbis Quality 4").unwrap();

        let xml = std::fs::read_to_string(&path).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
        assert!(xml.contains("<ExternalSourcesList SchemaVersion=\"1\" Root=\"/audio/in\">"));
        assert!(xml.contains("<Source Path=\"1234.wav\" Conversion=\"Vorbis Quality 4\"/>"));
        assert!(xml.contains("</ExternalSourcesList>"));
    }

    #[test]
    fn test_artifact_file_name() {
        assert_eq!(
            artifact_file_name(Path::new("/x/voice_01.wav"), "wem"),
            Some(PathBuf::from("voice_01.wem"))
        );
    }

    #[test]
    fn test_missing_program() {
        assert!(matches!(
            find_program("/definitely/not/an/encoder"),
            Err(Error::EncoderNotFound { .. })
        ));
    }

    #[cfg(unix)]
    fn shell_encoder(program: &str, args: &[&str], timeout_secs: u64) -> ExternalEncoder {
        encoder_with(EncoderConfig {
            program: program.to_string(),
            args: args.iter().map(ToString::to_string).collect(),
            timeout_secs,
            ..EncoderConfig::default()
        })
    }

    #[test]
    #[cfg(unix)]
    fn test_encode_collects_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let encoder = shell_encoder("sh", &["-c", "printf abcd > {output_dir}/1234.wem"], 10);

        let artifact = encoder
            .encode(&dir.path().join("1234.wav"), 4, &out, &CancelToken::new())
            .unwrap();
        assert_eq!(artifact.path, out.join("1234.wem"));
        assert_eq!(artifact.size, 4);
        assert!(out.join(DESCRIPTOR_NAME).is_file());
    }

    #[test]
    #[cfg(unix)]
    fn test_encode_timeout_kills_process() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = shell_encoder("sleep", &["30"], 1);

        let started = Instant::now();
        let err = encoder
            .encode(&dir.path().join("a.wav"), 0, dir.path(), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, Error::EncoderTimeout { secs: 1 }));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    #[cfg(unix)]
    fn test_encode_cancel_kills_process() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = shell_encoder("sleep", &["30"], 60);

        let cancel = CancelToken::new();
        let remote = cancel.clone();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(200));
            remote.cancel();
        });

        let started = Instant::now();
        let err = encoder
            .encode(&dir.path().join("a.wav"), 0, dir.path(), &cancel)
            .unwrap_err();
        canceller.join().unwrap();

        assert!(matches!(err, Error::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    #[cfg(unix)]
    fn test_encode_failure_carries_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = shell_encoder("sh", &["-c", "echo boom >&2; exit 3"], 10);

        let err = encoder
            .encode(&dir.path().join("a.wav"), 0, dir.path(), &CancelToken::new())
            .unwrap_err();
        match err {
            Error::ExternalTool { message } => assert!(message.contains("boom"), "{message}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    #[cfg(unix)]
    fn test_encode_success_without_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = shell_encoder("true", &[], 10);

        let err = encoder
            .encode(&dir.path().join("a.wav"), 0, dir.path(), &CancelToken::new())
            .unwrap_err();
        match err {
            Error::ExternalTool { message } => assert!(message.contains("no .wem artifact")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
