use camino::{Utf8Path, Utf8PathBuf};
use std::process::Command;
use std::time::Instant;
use thiserror::Error;

/// Errors from the external extraction tool
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Failed to start extraction tool '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Extraction of {archive} failed ({status}): {stderr}")]
    Failed {
        archive: Utf8PathBuf,
        status: String,
        stderr: String,
    },
}

/// Unpacks an archive into a destination folder.
///
/// Implementations block until extraction finishes.
#[cfg_attr(test, mockall::automock)]
pub trait Extractor: Send + Sync {
    fn extract(&self, archive: &Utf8Path, destination: &Utf8Path) -> Result<(), ExtractError>;
}

/// 7-Zip command-line extractor (`7z x <archive> -o<dest> -y`).
#[derive(Debug, Clone)]
pub struct SevenZip {
    program: String,
}

impl SevenZip {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments passed to the extraction tool.
    pub fn build_args(archive: &Utf8Path, destination: &Utf8Path) -> Vec<String> {
        vec![
            "x".to_string(),
            archive.to_string(),
            format!("-o{}", destination),
            "-y".to_string(),
        ]
    }
}

impl Default for SevenZip {
    fn default() -> Self {
        Self::new(crate::models::config::DEFAULT_EXTRACTOR)
    }
}

impl Extractor for SevenZip {
    fn extract(&self, archive: &Utf8Path, destination: &Utf8Path) -> Result<(), ExtractError> {
        let args = Self::build_args(archive, destination);
        tracing::info!("Executing: {} {}", self.program, args.join(" "));

        let start = Instant::now();
        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|source| ExtractError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        tracing::info!(
            "Extraction finished in {:.2}s with {}",
            start.elapsed().as_secs_f32(),
            output.status
        );

        if output.status.success() {
            return Ok(());
        }

        let status = match output.status.code() {
            Some(code) => format!("exit code {}", code),
            None => "terminated abnormally".to_string(),
        };
        Err(ExtractError::Failed {
            archive: archive.to_path_buf(),
            status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_args() {
        let args = SevenZip::build_args(
            Utf8Path::new("/dl/SkyUI 5.2.7z"),
            Utf8Path::new("/ws/Mods/SkyUI_5.2"),
        );
        assert_eq!(args, vec!["x", "/dl/SkyUI 5.2.7z", "-o/ws/Mods/SkyUI_5.2", "-y"]);
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let extractor = SevenZip::new("reliquary-no-such-extractor");
        let result = extractor.extract(Utf8Path::new("a.7z"), Utf8Path::new("out"));
        assert!(matches!(result, Err(ExtractError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_captures_stderr() {
        // `sh x <archive> ...` fails because the script "x" does not exist
        let extractor = SevenZip::new("sh");
        let result = extractor.extract(Utf8Path::new("a.7z"), Utf8Path::new("out"));
        match result {
            Err(ExtractError::Failed { status, stderr, .. }) => {
                assert!(status.starts_with("exit code"));
                assert!(!stderr.is_empty());
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
