use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use transcribe_domain::{DomainError, CANONICAL_CHANNELS};

const STDERR_TAIL_CHARS: usize = 400;

/// Arguments that decode `input` and write 16-bit PCM mono WAV at `sample_rate_hz`.
pub fn convert_args(input: &Path, output: &Path, sample_rate_hz: u32) -> Vec<OsString> {
    let channels = CANONICAL_CHANNELS.to_string();
    let rate = sample_rate_hz.to_string();
    let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-nostdin", "-y", "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(input.as_os_str().to_owned());
    args.extend(
        [
            "-vn",
            "-ac",
            channels.as_str(),
            "-ar",
            rate.as_str(),
            "-c:a",
            "pcm_s16le",
        ]
        .into_iter()
        .map(OsString::from),
    );
    args.push(output.as_os_str().to_owned());
    args
}

pub fn probe_args(input: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "-v",
        "error",
        "-show_entries",
        "format=duration",
        "-of",
        "default=noprint_wrappers=1:nokey=1",
    ]
    .into_iter()
    .map(OsString::from)
    .collect();
    args.push(input.as_os_str().to_owned());
    args
}

/// Parses ffprobe's duration line. Rejects values that are not finite and non-negative.
pub fn parse_duration(stdout: &str) -> Result<f64, DomainError> {
    let line = stdout.lines().map(str::trim).find(|line| !line.is_empty());
    let Some(line) = line else {
        return Err(DomainError::decode("ffprobe reported no duration"));
    };
    match line.parse::<f64>() {
        Ok(seconds) if seconds.is_finite() && seconds >= 0.0 => Ok(seconds),
        _ => Err(DomainError::decode(format!(
            "ffprobe reported an invalid duration: {line}"
        ))),
    }
}

pub async fn convert(
    ffmpeg_bin: &str,
    input: &Path,
    output: &Path,
    sample_rate_hz: u32,
) -> Result<(), DomainError> {
    run(ffmpeg_bin, convert_args(input, output, sample_rate_hz)).await?;
    Ok(())
}

pub async fn probe_duration(ffprobe_bin: &str, input: &Path) -> Result<f64, DomainError> {
    let stdout = run(ffprobe_bin, probe_args(input)).await?;
    parse_duration(&stdout)
}

/// Runs a tool to completion. A non-zero exit means the input could not be decoded;
/// failing to spawn the tool is a service error.
async fn run(program: &str, args: Vec<OsString>) -> Result<String, DomainError> {
    let output = Command::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|err| {
            DomainError::external_service_error(program, &format!("failed to execute: {err}"))
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DomainError::decode(format!(
            "{program} exited with {}: {}",
            output.status,
            stderr_tail(&stderr)
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn stderr_tail(stderr: &str) -> &str {
    let trimmed = stderr.trim();
    if trimmed.len() <= STDERR_TAIL_CHARS {
        return trimmed;
    }
    let mut start = trimmed.len() - STDERR_TAIL_CHARS;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    &trimmed[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convert_args_request_mono_pcm_at_target_rate() {
        let args = convert_args(Path::new("in.mp3"), Path::new("out.wav"), 16_000);
        let args: Vec<String> = args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();

        let position = |flag: &str| args.iter().position(|arg| arg == flag).expect(flag);
        assert_eq!(args[position("-i") + 1], "in.mp3");
        assert_eq!(args[position("-ac") + 1], "1");
        assert_eq!(args[position("-ar") + 1], "16000");
        assert_eq!(args[position("-c:a") + 1], "pcm_s16le");
        assert_eq!(args.last().map(String::as_str), Some("out.wav"));
    }

    #[test]
    fn probe_args_end_with_input() {
        let args = probe_args(Path::new("clip.wav"));
        assert!(args.iter().any(|arg| arg == "format=duration"));
        assert_eq!(args.last(), Some(&OsString::from("clip.wav")));
    }

    #[test]
    fn parse_duration_reads_first_value() {
        assert_eq!(parse_duration("12.345000\n").expect("parses"), 12.345);
        assert_eq!(parse_duration("\n  3\n").expect("parses"), 3.0);
    }

    #[test]
    fn parse_duration_rejects_garbage() {
        for stdout in ["", "N/A", "-1.0", "inf"] {
            let error = parse_duration(stdout).expect_err(stdout);
            assert!(matches!(error, DomainError::Decode { .. }), "{stdout}");
        }
    }

    #[test]
    fn stderr_tail_keeps_the_end() {
        let long = format!("{}end of log", "x".repeat(1_000));
        let tail = stderr_tail(&long);
        assert_eq!(tail.len(), STDERR_TAIL_CHARS);
        assert!(tail.ends_with("end of log"));
    }

    #[tokio::test]
    async fn missing_binary_is_a_service_error() {
        let error = probe_duration("transcribe-no-such-ffprobe", Path::new("x.wav"))
            .await
            .expect_err("binary is missing");
        assert!(matches!(error, DomainError::ExternalService { .. }));
    }
}
