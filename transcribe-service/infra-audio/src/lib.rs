use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use transcribe_domain::{AudioNormalizerPort, DomainError, InputItem, NormalizedAudio, TempAudioFile};

pub mod fetch;
pub mod ffmpeg;

use fetch::SourceLocation;

#[derive(Debug, Clone)]
pub struct FfmpegNormalizerConfig {
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    pub sample_rate_hz: u32,
    pub temp_dir: Option<PathBuf>,
    pub download_timeout: Duration,
}

impl Default for FfmpegNormalizerConfig {
    fn default() -> Self {
        Self {
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
            sample_rate_hz: 16_000,
            temp_dir: None,
            download_timeout: Duration::from_secs(120),
        }
    }
}

/// Turns a local path or URL into a mono PCM WAV scratch file and measures it.
pub struct FfmpegAudioNormalizer {
    config: FfmpegNormalizerConfig,
    client: reqwest::Client,
}

impl FfmpegAudioNormalizer {
    pub fn new(config: FfmpegNormalizerConfig) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(config.download_timeout)
            .build()
            .map_err(|err| {
                DomainError::internal_error(&format!("cannot build download client: {err}"))
            })?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl AudioNormalizerPort for FfmpegAudioNormalizer {
    async fn normalize(&self, item: InputItem) -> Result<NormalizedAudio, DomainError> {
        let temp_dir = self.config.temp_dir.as_deref();
        tracing::debug!(
            original_index = item.original_index,
            source = %item.source,
            "normalizing input"
        );

        // The downloaded original lives only until conversion is done.
        let (input, _download) = match fetch::locate(&item.source) {
            SourceLocation::Remote(url) => {
                let downloaded = fetch::download(&self.client, &url, temp_dir).await?;
                (downloaded.to_path_buf(), Some(downloaded))
            }
            SourceLocation::Local(path) => {
                fetch::ensure_local(&path).await?;
                (path, None)
            }
        };

        let output = fetch::scratch_file(temp_dir, ".wav")
            .map_err(|err| DomainError::internal_error(&format!("cannot create temp file: {err}")))?
            .into_temp_path();
        ffmpeg::convert(
            &self.config.ffmpeg_bin,
            &input,
            &output,
            self.config.sample_rate_hz,
        )
        .await?;
        let duration_seconds = ffmpeg::probe_duration(&self.config.ffprobe_bin, &output).await?;

        tracing::debug!(
            original_index = item.original_index,
            duration_seconds,
            "input normalized"
        );
        Ok(NormalizedAudio::new(
            item,
            TempAudioFile::new(output),
            duration_seconds,
            self.config.sample_rate_hz,
        ))
    }
}
