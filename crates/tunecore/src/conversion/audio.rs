//! Audio conversion: fingerprint normalization and MP3 extraction.

use std::path::{Path, PathBuf};

use super::{run_ffmpeg, temp_output_path, ConversionError, ConversionResult};
use crate::core::config;

/// Produce the normalized clip fingerprinting expects: mono, fixed sample
/// rate, capped duration, uncompressed WAV.
///
/// Never fails; on any error the original path is returned unchanged and
/// the fingerprinter gets to try the raw file. Normalization is an
/// optimization, not a gate.
pub async fn normalize_for_fingerprint<P: AsRef<Path>>(input_path: P) -> PathBuf {
    let input = input_path.as_ref();
    let output = temp_output_path("fp_norm", "wav");

    let clip_secs = config::identify::FINGERPRINT_CLIP_SECS.to_string();
    let sample_rate = config::identify::FINGERPRINT_SAMPLE_RATE.to_string();
    let input_str = input.to_string_lossy().to_string();
    let output_str = output.to_string_lossy().to_string();

    let args = [
        "-i",
        input_str.as_str(),
        "-t",
        clip_secs.as_str(),
        "-ac",
        "1",
        "-ar",
        sample_rate.as_str(),
        "-vn",
        "-f",
        "wav",
        output_str.as_str(),
    ];

    match run_ffmpeg(&args, config::transcode::ffmpeg_timeout()).await {
        Ok(()) if output.exists() => output,
        Ok(()) => {
            log::warn!("⚠️ normalization produced no output, using original file");
            input.to_path_buf()
        }
        Err(e) => {
            log::warn!("⚠️ normalization failed ({}), using original file", e);
            input.to_path_buf()
        }
    }
}

/// Extract a compressed MP3 track from any media file.
///
/// `quality` is a bitrate in kbit/s ("128", "192", "256", "320") or "0" for
/// variable-bitrate best. Fails loudly; a failed extraction changes what
/// can be delivered and the caller must know.
pub async fn extract_audio<P: AsRef<Path>>(input_path: P, quality: &str) -> ConversionResult<PathBuf> {
    let input = input_path.as_ref();
    if !input.exists() {
        return Err(ConversionError::InputNotFound(input.display().to_string()));
    }

    let output = temp_output_path("audio", "mp3");
    let input_str = input.to_string_lossy().to_string();
    let output_str = output.to_string_lossy().to_string();

    let mut args = vec!["-i", input_str.as_str(), "-vn", "-acodec", "libmp3lame"];
    let bitrate;
    if quality == "0" {
        // VBR best
        args.extend_from_slice(&["-q:a", "2"]);
    } else {
        bitrate = format!("{}k", quality);
        args.extend_from_slice(&["-b:a", bitrate.as_str()]);
    }
    args.push(output_str.as_str());

    run_ffmpeg(&args, config::transcode::ffmpeg_timeout()).await?;

    if !output.exists() {
        return Err(ConversionError::FfmpegError(
            "extraction reported success but produced no file".to_string(),
        ));
    }

    log::info!("✅ extracted audio to {}", output.display());
    Ok(output)
}
