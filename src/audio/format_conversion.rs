// Format conversion - integer PCM ↔ internal f32, and CPAL output frames
//
// Decoders hand us integer PCM of arbitrary bit depth (hound, claxon);
// the mixer works in f32 and the output callback converts to whatever
// sample type the device wants.

use cpal::{FromSample, Sample};

/// Convert an integer PCM sample of `bits` depth to f32 in [-1.0, 1.0]
///
/// Works for 8, 16, 24 and 32-bit samples as returned by hound/claxon
/// (sign-extended into an i32).
#[inline]
pub fn int_to_f32(sample: i32, bits: u16) -> f32 {
    let bits = bits.clamp(1, 32) as u32;
    let full_scale = (1u64 << (bits - 1)) as f64;
    (sample as f64 / full_scale).clamp(-1.0, 1.0) as f32
}

/// Convert f32 sample to i16
///
/// Maps [-1.0, 1.0] to [i16::MIN, i16::MAX] and clamps values outside
#[inline]
pub fn f32_to_i16(sample: f32) -> i16 {
    let clamped = if sample.is_finite() { sample.clamp(-1.0, 1.0) } else { 0.0 };

    if clamped >= 0.0 {
        (clamped * i16::MAX as f32) as i16
    } else {
        (clamped * -(i16::MIN as f32)) as i16
    }
}

/// Write a stereo f32 frame into an interleaved output frame
///
/// Extra channels beyond L/R get silence; mono devices get the L/R average.
#[inline]
pub fn write_stereo_to_interleaved_frame<T>(
    (left_sample, right_sample): (f32, f32),
    output_frame: &mut [T],
) where
    T: Sample + FromSample<f32>,
{
    if output_frame.len() >= 2 {
        output_frame[0] = Sample::from_sample::<f32>(left_sample);
        output_frame[1] = Sample::from_sample::<f32>(right_sample);
        for channel_sample in output_frame.iter_mut().skip(2) {
            *channel_sample = Sample::from_sample::<f32>(0.0);
        }
    } else if let Some(channel_sample) = output_frame.first_mut() {
        let mono_sample = (left_sample + right_sample) * 0.5;
        *channel_sample = Sample::from_sample::<f32>(mono_sample);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_to_f32_bit_depths() {
        assert_eq!(int_to_f32(0, 16), 0.0);
        assert!((int_to_f32(i16::MAX as i32, 16) - 1.0).abs() < 1e-4);
        assert_eq!(int_to_f32(i16::MIN as i32, 16), -1.0);

        // 24-bit full scale
        assert!((int_to_f32(8_388_607, 24) - 1.0).abs() < 1e-6);
        assert_eq!(int_to_f32(-8_388_608, 24), -1.0);

        // 8-bit half scale
        assert!((int_to_f32(64, 8) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_f32_to_i16_conversion() {
        assert_eq!(f32_to_i16(0.0), 0);
        assert_eq!(f32_to_i16(1.0), i16::MAX);
        assert_eq!(f32_to_i16(-1.0), i16::MIN);
        assert_eq!(f32_to_i16(2.5), i16::MAX);
        assert_eq!(f32_to_i16(f32::NAN), 0);
    }

    #[test]
    fn test_roundtrip_i16() {
        for &original in &[-1.0f32, -0.5, -0.1, 0.0, 0.1, 0.5, 0.9, 1.0] {
            let back = int_to_f32(f32_to_i16(original) as i32, 16);
            assert!(
                (back - original).abs() < 0.001,
                "Roundtrip failed for {}: got {}",
                original,
                back
            );
        }
    }

    #[test]
    fn test_write_stereo_frame_variants() {
        let mut stereo = [0.0f32; 2];
        write_stereo_to_interleaved_frame((0.25, -0.25), &mut stereo);
        assert_eq!(stereo, [0.25, -0.25]);

        let mut surround = [1.0f32; 4];
        write_stereo_to_interleaved_frame((0.5, 0.5), &mut surround);
        assert_eq!(surround, [0.5, 0.5, 0.0, 0.0]);

        let mut mono = [0.0f32; 1];
        write_stereo_to_interleaved_frame((1.0, 0.0), &mut mono);
        assert_eq!(mono, [0.5]);
    }
}
