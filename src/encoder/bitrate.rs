use crate::error::AppError;

/// Compute the constant video bitrate (kbps) that fills the target size
/// once the audio streams are accounted for.
///
/// The result may be negative when the audio alone exceeds the size budget.
/// That is returned as-is: callers must treat a negative value as "target
/// size too small for this audio configuration", never clamp it.
pub fn compute_video_bitrate_kbps(
    duration_secs: f64,
    target_size_mb: f64,
    total_audio_kbps: f64,
) -> Result<i64, AppError> {
    if !duration_secs.is_finite() || duration_secs <= 0.0 {
        return Err(AppError::InvalidInput(format!(
            "duration must be positive, got {}",
            duration_secs
        )));
    }
    if !target_size_mb.is_finite() || target_size_mb <= 0.0 {
        return Err(AppError::InvalidInput(format!(
            "target size must be a positive number of megabytes, got {}",
            target_size_mb
        )));
    }
    if !total_audio_kbps.is_finite() || total_audio_kbps < 0.0 {
        return Err(AppError::InvalidInput(format!(
            "audio bitrate total must be a non-negative number, got {}",
            total_audio_kbps
        )));
    }

    let target_size_bits = target_size_mb * 8.0 * 1024.0 * 1024.0;
    let total_bitrate_bps = target_size_bits / duration_secs;
    let video_bitrate_bps = total_bitrate_bps - total_audio_kbps * 1000.0;

    Ok((video_bitrate_bps / 1000.0).floor() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_closed_form() {
        // videoBitrate ~ targetSizeMB * 8192 / duration - totalAudioKbps,
        // modulo the 1024*1024 vs 1000 unit conversions and flooring
        let duration = 3600.0;
        let target_mb = 1000.0;
        let audio_kbps = 384.0;

        let result = compute_video_bitrate_kbps(duration, target_mb, audio_kbps).unwrap();
        let expected = (target_mb * 8.0 * 1024.0 * 1024.0 / duration - audio_kbps * 1000.0) / 1000.0;
        assert_eq!(result, expected.floor() as i64);
    }

    #[test]
    fn is_deterministic() {
        let a = compute_video_bitrate_kbps(5400.0, 700.0, 192.0).unwrap();
        let b = compute_video_bitrate_kbps(5400.0, 700.0, 192.0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn audio_exceeding_budget_goes_negative() {
        // totalAudioKbps * 1000 * duration > targetMB * 8 * 1024 * 1024
        let result = compute_video_bitrate_kbps(3600.0, 10.0, 640.0).unwrap();
        assert!(result < 0, "expected negative bitrate, got {}", result);
    }

    #[test]
    fn zero_audio_uses_full_budget() {
        let result = compute_video_bitrate_kbps(1000.0, 100.0, 0.0).unwrap();
        assert_eq!(result, (100.0 * 8.0 * 1024.0 * 1024.0 / 1000.0 / 1000.0) as i64);
    }

    #[test]
    fn rejects_invalid_inputs() {
        assert!(matches!(
            compute_video_bitrate_kbps(0.0, 100.0, 0.0),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            compute_video_bitrate_kbps(-10.0, 100.0, 0.0),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            compute_video_bitrate_kbps(100.0, 0.0, 0.0),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            compute_video_bitrate_kbps(100.0, f64::NAN, 0.0),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            compute_video_bitrate_kbps(100.0, f64::INFINITY, 0.0),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            compute_video_bitrate_kbps(100.0, 100.0, -1.0),
            Err(AppError::InvalidInput(_))
        ));
    }
}
