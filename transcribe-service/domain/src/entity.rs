use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::TempPath;

pub const CANONICAL_CHANNELS: u16 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputItem {
    pub original_index: usize,
    pub source: String,
    pub want_timestamps: bool,
}

impl InputItem {
    pub fn new(original_index: usize, source: impl Into<String>, want_timestamps: bool) -> Self {
        Self {
            original_index,
            source: source.into(),
            want_timestamps,
        }
    }
}

/// Scratch file owned by exactly one pipeline item. The file is removed when the
/// guard is released or dropped, whichever comes first.
#[derive(Debug)]
pub struct TempAudioFile {
    path: TempPath,
}

impl TempAudioFile {
    pub fn new(path: TempPath) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn release(self) -> std::io::Result<()> {
        self.path.close()
    }
}

/// Canonical mono waveform produced by the normalizer for one input item.
#[derive(Debug)]
pub struct NormalizedAudio {
    pub item: InputItem,
    pub duration_seconds: f64,
    pub sample_rate_hz: u32,
    pub channels: u16,
    file: TempAudioFile,
}

impl NormalizedAudio {
    pub fn new(
        item: InputItem,
        file: TempAudioFile,
        duration_seconds: f64,
        sample_rate_hz: u32,
    ) -> Self {
        Self {
            item,
            duration_seconds,
            sample_rate_hz,
            channels: CANONICAL_CHANNELS,
            file,
        }
    }

    pub fn original_index(&self) -> usize {
        self.item.original_index
    }

    pub fn local_path(&self) -> &Path {
        self.file.path()
    }

    pub fn engine_input(&self) -> EngineInput {
        EngineInput {
            original_index: self.item.original_index,
            source: self.item.source.clone(),
            path: self.local_path().to_path_buf(),
            duration_seconds: self.duration_seconds,
        }
    }

    /// Deletes the backing file. Failures are logged, never propagated: the item
    /// result is already final at this point.
    pub fn release(self) {
        let index = self.item.original_index;
        let path = self.local_path().display().to_string();
        if let Err(err) = self.file.release() {
            tracing::warn!(
                original_index = index,
                path = %path,
                error = %err,
                "failed to remove normalized audio file"
            );
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Short,
    Long,
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bucket::Short => f.write_str("short"),
            Bucket::Long => f.write_str("long"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttentionMode {
    Global,
    Local,
}

impl AttentionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttentionMode::Global => "global",
            AttentionMode::Local => "local",
        }
    }

    /// Self-attention model name understood by the inference engine.
    pub fn self_attention_model(&self) -> &'static str {
        match self {
            AttentionMode::Global => "rel_pos",
            AttentionMode::Local => "rel_pos_local_attn",
        }
    }

    /// Left/right attention context in frames, only meaningful for local attention.
    pub fn context_size(&self) -> Option<[u32; 2]> {
        match self {
            AttentionMode::Global => None,
            AttentionMode::Local => Some([256, 256]),
        }
    }
}

impl fmt::Display for AttentionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anything the packer can size by duration.
pub trait Timed {
    fn duration_seconds(&self) -> f64;
}

impl Timed for NormalizedAudio {
    fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }
}

impl Timed for f64 {
    fn duration_seconds(&self) -> f64 {
        *self
    }
}

impl<T> Timed for (usize, T)
where
    T: Timed,
{
    fn duration_seconds(&self) -> f64 {
        self.1.duration_seconds()
    }
}

#[derive(Debug)]
pub struct Batch<T = NormalizedAudio> {
    pub members: Vec<T>,
    pub total_duration_seconds: f64,
    pub attention_mode: AttentionMode,
}

impl<T: Timed> Batch<T> {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn max_member_duration_seconds(&self) -> f64 {
        self.members
            .iter()
            .map(Timed::duration_seconds)
            .fold(0.0, f64::max)
    }
}

/// What the engine receives for one member of a call.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineInput {
    pub original_index: usize,
    pub source: String,
    pub path: PathBuf,
    pub duration_seconds: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscribeOptions {
    pub attention_mode: AttentionMode,
    pub timestamps: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTimestamp {
    pub word: String,
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentTimestamp {
    pub segment: String,
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Timestamps {
    #[serde(default)]
    pub word: Vec<WordTimestamp>,
    #[serde(default)]
    pub segment: Vec<SegmentTimestamp>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineTranscript {
    pub text: String,
    pub timestamps: Option<Timestamps>,
}

/// Per-member outcome of a successful engine call. A `Failed` entry is a content
/// error for that member only; the call itself went through.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineItemOutput {
    Transcribed(EngineTranscript),
    Failed { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    FetchError,
    DecodeError,
    InferenceError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::FetchError => "FetchError",
            ErrorKind::DecodeError => "DecodeError",
            ErrorKind::InferenceError => "InferenceError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ItemError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn inference(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InferenceError, message)
    }
}

impl fmt::Display for ItemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl Serialize for ItemError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemResult {
    pub original_index: usize,
    pub text: Option<String>,
    pub duration_seconds: f64,
    pub timestamps: Option<Timestamps>,
    pub error: Option<ItemError>,
}

impl ItemResult {
    pub fn success(
        original_index: usize,
        duration_seconds: f64,
        transcript: EngineTranscript,
        want_timestamps: bool,
    ) -> Self {
        Self {
            original_index,
            text: Some(transcript.text),
            duration_seconds,
            timestamps: if want_timestamps {
                transcript.timestamps
            } else {
                None
            },
            error: None,
        }
    }

    pub fn failure(original_index: usize, duration_seconds: f64, error: ItemError) -> Self {
        Self {
            original_index,
            text: None,
            duration_seconds,
            timestamps: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn scratch_file() -> TempAudioFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(b"RIFF").expect("write temp file");
        TempAudioFile::new(file.into_temp_path())
    }

    #[test]
    fn release_removes_backing_file() {
        let file = scratch_file();
        let audio = NormalizedAudio::new(InputItem::new(0, "a.wav", false), file, 1.5, 16_000);
        let path = audio.local_path().to_path_buf();
        assert!(path.exists());

        audio.release();

        assert!(!path.exists());
    }

    #[test]
    fn dropping_normalized_audio_removes_backing_file() {
        let file = scratch_file();
        let path = file.path().to_path_buf();
        {
            let _audio = NormalizedAudio::new(InputItem::new(3, "b.wav", false), file, 2.0, 16_000);
        }
        assert!(!path.exists());
    }

    #[test]
    fn normalized_audio_is_mono() {
        let audio = NormalizedAudio::new(InputItem::new(0, "a", false), scratch_file(), 1.0, 16_000);
        assert_eq!(audio.channels, 1);
    }

    #[test]
    fn item_error_serializes_as_kind_prefixed_string() {
        let error = ItemError::new(ErrorKind::FetchError, "404 from origin");
        let value = serde_json::to_value(&error).expect("serializable");
        assert_eq!(value, serde_json::json!("FetchError: 404 from origin"));
    }

    #[test]
    fn success_drops_timestamps_unless_requested() {
        let transcript = EngineTranscript {
            text: "hello".to_string(),
            timestamps: Some(Timestamps::default()),
        };
        let without = ItemResult::success(0, 1.0, transcript.clone(), false);
        let with = ItemResult::success(0, 1.0, transcript, true);
        assert!(without.timestamps.is_none());
        assert!(with.timestamps.is_some());
    }

    #[test]
    fn local_attention_carries_context_size() {
        assert_eq!(AttentionMode::Local.self_attention_model(), "rel_pos_local_attn");
        assert_eq!(AttentionMode::Local.context_size(), Some([256, 256]));
        assert_eq!(AttentionMode::Global.self_attention_model(), "rel_pos");
        assert_eq!(AttentionMode::Global.context_size(), None);
    }
}
