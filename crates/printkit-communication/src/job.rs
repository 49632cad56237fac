//! Streaming print job
//!
//! A lazy reader over a G-code file that feeds the command queue
//! incrementally. Progress is tracked in raw bytes consumed, including line
//! terminators, so it advances monotonically even across skipped blank and
//! comment lines.

use printkit_core::JobError;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// A print job streaming lines from a G-code file
#[derive(Debug)]
pub struct PrintJob {
    reader: BufReader<File>,
    path: PathBuf,
    total_bytes: u64,
    bytes_consumed: u64,
    active: bool,
    paused: bool,
    resume_position_line: Option<String>,
}

impl PrintJob {
    /// Open `path` and record its byte length
    pub fn start(path: impl AsRef<Path>) -> Result<Self, JobError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|_| JobError::FileNotFound {
            path: path.display().to_string(),
        })?;
        let total_bytes = file
            .metadata()
            .map_err(|e| JobError::Read {
                reason: e.to_string(),
            })?
            .len();

        Ok(Self {
            reader: BufReader::new(file),
            path,
            total_bytes,
            bytes_consumed: 0,
            active: true,
            paused: false,
            resume_position_line: None,
        })
    }

    /// Path of the file being printed
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the next printable line
    ///
    /// Skips blank lines and comment-only lines, strips trailing `;`
    /// comments, and advances the byte cursor by the raw length of every
    /// line read including its terminator. Returns `Ok(None)` at end of
    /// file, after which the job is no longer active.
    pub fn next_line(&mut self) -> Result<Option<String>, JobError> {
        loop {
            let mut raw = String::new();
            let n = self.reader.read_line(&mut raw).map_err(|e| JobError::Read {
                reason: e.to_string(),
            })?;

            if n == 0 {
                self.active = false;
                return Ok(None);
            }
            self.bytes_consumed += n as u64;

            let line = match raw.split(';').next() {
                Some(code) => code.trim(),
                None => "",
            };
            if !line.is_empty() {
                return Ok(Some(line.to_string()));
            }
        }
    }

    /// Percentage of the file consumed, 0.0 to 100.0
    pub fn progress(&self) -> f32 {
        if self.total_bytes == 0 {
            return 100.0;
        }
        (self.bytes_consumed as f64 / self.total_bytes as f64 * 100.0) as f32
    }

    /// True until the file is exhausted or the job is stopped
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Deactivate the job without reading further
    pub fn stop(&mut self) {
        self.active = false;
    }

    /// True while the job is paused
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Set or clear the paused flag
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// The move command that returns the head to the pause position
    pub fn resume_position_line(&self) -> Option<&str> {
        self.resume_position_line.as_deref()
    }

    /// Store the move command captured from the pause-time position report
    pub fn set_resume_position_line(&mut self, line: String) {
        self.resume_position_line = Some(line);
    }

    /// Clear the stored resume position
    pub fn take_resume_position_line(&mut self) -> Option<String> {
        self.resume_position_line.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn job_from(content: &str) -> (TempGcode, PrintJob) {
        let mut file = TempGcode::new();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        let job = PrintJob::start(file.path()).unwrap();
        (file, job)
    }

    struct TempGcode {
        path: PathBuf,
        file: File,
    }

    impl TempGcode {
        fn new() -> Self {
            let path = std::env::temp_dir().join(format!(
                "printkit-job-{}-{:?}.gcode",
                std::process::id(),
                std::thread::current().id()
            ));
            let file = File::create(&path).unwrap();
            Self { path, file }
        }

        fn path(&self) -> &Path {
            &self.path
        }
    }

    impl Write for TempGcode {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.file.write(buf)
        }
        fn flush(&mut self) -> std::io::Result<()> {
            self.file.flush()
        }
    }

    impl Drop for TempGcode {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    #[test]
    fn streams_lines_skipping_comments_and_blanks() {
        let (_file, mut job) = job_from("G28\n; full comment\n\nG1 X10 ; trailing\nG1 Y10\n");
        assert_eq!(job.next_line().unwrap(), Some("G28".to_string()));
        assert_eq!(job.next_line().unwrap(), Some("G1 X10".to_string()));
        assert_eq!(job.next_line().unwrap(), Some("G1 Y10".to_string()));
        assert_eq!(job.next_line().unwrap(), None);
        assert!(!job.is_active());
    }

    #[test]
    fn progress_counts_raw_bytes() {
        let content = "G28\nG1 X10\n";
        let (_file, mut job) = job_from(content);
        assert_eq!(job.progress(), 0.0);

        job.next_line().unwrap();
        let after_first = job.progress();
        assert!(after_first > 0.0);

        job.next_line().unwrap();
        assert_eq!(job.progress(), 100.0);
        assert!(job.progress() >= after_first);
    }

    #[test]
    fn comment_lines_still_advance_progress() {
        let (_file, mut job) = job_from("; header comment\nG28\n");
        assert_eq!(job.next_line().unwrap(), Some("G28".to_string()));
        assert_eq!(job.progress(), 100.0);
    }

    #[test]
    fn missing_file_is_not_found() {
        let result = PrintJob::start("/nonexistent/printkit-test.gcode");
        assert!(matches!(result, Err(JobError::FileNotFound { .. })));
    }

    #[test]
    fn pause_bookkeeping() {
        let (_file, mut job) = job_from("G28\n");
        assert!(!job.is_paused());
        job.set_paused(true);
        job.set_resume_position_line("G1 X12.00 Y34.00 Z0.20".to_string());
        assert!(job.is_paused());
        assert_eq!(
            job.take_resume_position_line(),
            Some("G1 X12.00 Y34.00 Z0.20".to_string())
        );
        assert_eq!(job.resume_position_line(), None);
    }
}
