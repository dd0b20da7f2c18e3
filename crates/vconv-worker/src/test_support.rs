//! Test doubles shared by the pipeline and batch tests.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use vconv_media::{FfmpegCommand, MediaError, MediaResult, Transcoder};
use vconv_storage::{MockObjectStore, StorageError};

/// Records every command and writes a placeholder output file.
#[derive(Debug, Default)]
pub struct FakeTranscoder {
    calls: Mutex<Vec<Vec<String>>>,
    failing_inputs: Vec<String>,
}

impl FakeTranscoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exit non-zero for inputs with this file name.
    pub fn failing_on(mut self, file_name: &str) -> Self {
        self.failing_inputs.push(file_name.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        self.calls.lock().unwrap().push(cmd.build_args());

        let name = cmd
            .input()
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if self.failing_inputs.contains(&name) {
            return Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with exit status: 1",
                Some("Invalid data found when processing input".to_string()),
                Some(1),
            ));
        }

        tokio::fs::write(cmd.output(), b"mp4").await?;
        Ok(())
    }
}

/// A store whose downloads write a placeholder file and whose uploads
/// fail for `failing_upload_key`.
pub fn fake_store(failing_upload_key: Option<&str>) -> MockObjectStore {
    let failing = failing_upload_key.map(str::to_string);
    let mut store = MockObjectStore::new();

    store.expect_download_to().returning(|_, _, path: &Path| {
        std::fs::write(path, b"mov").map_err(StorageError::from)
    });
    store
        .expect_upload_from()
        .returning(move |_, key, _, _| match &failing {
            Some(k) if k == key => Err(StorageError::upload_failed("simulated outage")),
            _ => Ok(()),
        });

    store
}
