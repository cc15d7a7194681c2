// Audio Export - Offline rendering of f32 buffers to 16-bit WAV
//
// Used for rendered click tracks (CLI `--render-click`) and to build
// in-memory test fixtures that go through the real decode path.

use std::fs::File;
use std::io::{BufWriter, Cursor, Seek, Write};
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::audio::dsp_utils::flush_denormals_to_zero;
use crate::audio::format_conversion::f32_to_i16;

fn wav_spec(sample_rate: u32, channels: u16) -> WavSpec {
    WavSpec {
        channels: channels.max(1),
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

fn write_samples<W: Write + Seek>(
    mut writer: WavWriter<W>,
    samples: &[f32],
) -> Result<(), hound::Error> {
    for &sample in samples {
        writer.write_sample(f32_to_i16(flush_denormals_to_zero(sample)))?;
    }
    writer.finalize()
}

/// Encode interleaved f32 samples as an in-memory 16-bit PCM WAV file
pub fn encode_wav(samples: &[f32], sample_rate: u32, channels: u16) -> Result<Vec<u8>, hound::Error> {
    let mut cursor = Cursor::new(Vec::new());
    let writer = WavWriter::new(&mut cursor, wav_spec(sample_rate, channels))?;
    write_samples(writer, samples)?;
    Ok(cursor.into_inner())
}

/// Write interleaved f32 samples to a 16-bit PCM WAV file on disk
pub fn export_wav(
    path: &Path,
    samples: &[f32],
    sample_rate: u32,
    channels: u16,
) -> Result<(), hound::Error> {
    let writer: WavWriter<BufWriter<File>> =
        WavWriter::create(path, wav_spec(sample_rate, channels))?;
    write_samples(writer, samples)?;
    log::info!(
        "Exported {} samples at {} Hz to {}",
        samples.len(),
        sample_rate,
        path.display()
    );
    Ok(())
}
