// Decoder - Raw track bytes → interleaved f32 PCM
//
// WAV goes through hound and FLAC through claxon (fast, exact integer
// paths); everything else (MP3, OGG...) is handed to symphonia.
// Stems are resampled with rubato to the output rate at load time so the
// mixer never converts rates in the audio callback.

use std::io::Cursor;

use claxon::FlacReader;
use hound::{SampleFormat, WavReader};
use rubato::{FftFixedIn, Resampler};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

use crate::audio::format_conversion::int_to_f32;

/// Frames fed to the resampler per chunk
const RESAMPLE_CHUNK_FRAMES: usize = 1024;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("WAV decode error: {0}")]
    Wav(#[from] hound::Error),

    #[error("FLAC decode error: {0}")]
    Flac(#[from] claxon::Error),

    #[error("Decode error: {0}")]
    Symphonia(#[from] SymphoniaError),

    #[error("Resampling failed: {0}")]
    Resample(String),

    #[error("Audio contains no samples")]
    Empty,
}

/// Container format, sniffed from magic bytes or the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Flac,
    /// Anything symphonia may know how to probe (MP3, OGG, AAC...)
    Other,
}

impl AudioFormat {
    /// Detect the format of `bytes`, falling back to the extension hint
    pub fn detect(bytes: &[u8], hint: Option<&str>) -> Self {
        if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
            return AudioFormat::Wav;
        }
        if bytes.starts_with(b"fLaC") {
            return AudioFormat::Flac;
        }

        match hint.map(|h| h.trim_start_matches('.').to_ascii_lowercase()) {
            Some(ext) if ext == "wav" || ext == "wave" => AudioFormat::Wav,
            Some(ext) if ext == "flac" => AudioFormat::Flac,
            _ => AudioFormat::Other,
        }
    }
}

/// Decoded audio, interleaved f32 in [-1.0, 1.0]
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl DecodedAudio {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels: channels.max(1),
        }
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Stereo pair for a frame; mono sources are duplicated on both sides
    #[inline]
    pub fn frame(&self, index: usize) -> (f32, f32) {
        let channels = self.channels as usize;
        let base = index * channels;
        match channels {
            1 => {
                let s = self.samples[base];
                (s, s)
            }
            _ => (self.samples[base], self.samples[base + 1]),
        }
    }

    /// Downmix all channels to mono (average)
    pub fn to_mono(&self) -> Vec<f32> {
        let channels = self.channels as usize;
        if channels == 1 {
            return self.samples.clone();
        }
        self.samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    }

    /// Resample to `target_rate`; returns a clone when rates already match
    pub fn resample(&self, target_rate: u32) -> Result<DecodedAudio, DecodeError> {
        if target_rate == self.sample_rate || self.frames() == 0 {
            return Ok(DecodedAudio::new(
                self.samples.clone(),
                target_rate,
                self.channels,
            ));
        }
        if target_rate == 0 || self.sample_rate == 0 {
            return Err(DecodeError::Resample(format!(
                "invalid sample rates {} -> {}",
                self.sample_rate, target_rate
            )));
        }

        let channels = self.channels as usize;
        let frames = self.frames();

        // Deinterleave into planar buffers for rubato
        let mut planar = vec![Vec::with_capacity(frames); channels];
        for frame in self.samples.chunks_exact(channels) {
            for (channel, &sample) in planar.iter_mut().zip(frame) {
                channel.push(sample);
            }
        }

        let mut resampler = FftFixedIn::<f32>::new(
            self.sample_rate as usize,
            target_rate as usize,
            RESAMPLE_CHUNK_FRAMES,
            2,
            channels,
        )
        .map_err(|e| DecodeError::Resample(e.to_string()))?;

        let mut output: Vec<Vec<f32>> = vec![Vec::new(); channels];
        let mut position = 0;

        loop {
            let needed = resampler.input_frames_next();
            if position + needed > frames {
                break;
            }
            let chunk: Vec<&[f32]> = planar
                .iter()
                .map(|c| &c[position..position + needed])
                .collect();
            let processed = resampler
                .process(&chunk, None)
                .map_err(|e| DecodeError::Resample(e.to_string()))?;
            append_planar(&mut output, processed);
            position += needed;
        }

        if position < frames {
            let chunk: Vec<&[f32]> = planar.iter().map(|c| &c[position..]).collect();
            let processed = resampler
                .process_partial(Some(&chunk), None)
                .map_err(|e| DecodeError::Resample(e.to_string()))?;
            append_planar(&mut output, processed);
        }

        // Flush the resampler's internal delay line
        let flushed = resampler
            .process_partial::<&[f32]>(None, None)
            .map_err(|e| DecodeError::Resample(e.to_string()))?;
        append_planar(&mut output, flushed);

        let delay = resampler.output_delay();
        let expected =
            (frames as f64 * target_rate as f64 / self.sample_rate as f64).round() as usize;

        let mut samples = Vec::with_capacity(expected * channels);
        for i in 0..expected {
            for channel in &output {
                samples.push(channel.get(i + delay).copied().unwrap_or(0.0));
            }
        }

        Ok(DecodedAudio::new(samples, target_rate, self.channels))
    }
}

fn append_planar(output: &mut [Vec<f32>], processed: Vec<Vec<f32>>) {
    for (channel, block) in output.iter_mut().zip(processed) {
        channel.extend_from_slice(&block);
    }
}

/// Decode raw audio bytes. `hint` is a file extension ("wav", "mp3"...)
pub fn decode(bytes: &[u8], hint: Option<&str>) -> Result<DecodedAudio, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }

    let decoded = match AudioFormat::detect(bytes, hint) {
        AudioFormat::Wav => decode_wav(bytes)?,
        AudioFormat::Flac => decode_flac(bytes)?,
        AudioFormat::Other => decode_with_symphonia(bytes, hint)?,
    };

    if decoded.samples.is_empty() {
        return Err(DecodeError::Empty);
    }
    Ok(decoded)
}

fn decode_wav(bytes: &[u8]) -> Result<DecodedAudio, DecodeError> {
    let reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    let samples = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<f32>, _>>()?,
        SampleFormat::Int => {
            let bits = spec.bits_per_sample;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| int_to_f32(v, bits)))
                .collect::<Result<Vec<f32>, _>>()?
        }
    };

    Ok(DecodedAudio::new(samples, spec.sample_rate, spec.channels))
}

fn decode_flac(bytes: &[u8]) -> Result<DecodedAudio, DecodeError> {
    let mut reader = FlacReader::new(Cursor::new(bytes))?;
    let info = reader.streaminfo();
    let bits = info.bits_per_sample as u16;

    let samples = reader
        .samples()
        .map(|s| s.map(|v| int_to_f32(v, bits)))
        .collect::<Result<Vec<f32>, _>>()?;

    Ok(DecodedAudio::new(samples, info.sample_rate, info.channels as u16))
}

fn decode_with_symphonia(bytes: &[u8], hint: Option<&str>) -> Result<DecodedAudio, DecodeError> {
    let source = Cursor::new(bytes.to_vec());
    let stream = MediaSourceStream::new(Box::new(source), Default::default());

    let mut probe_hint = Hint::new();
    if let Some(ext) = hint {
        probe_hint.with_extension(ext.trim_start_matches('.'));
    }

    let probed = symphonia::default::get_probe().format(
        &probe_hint,
        stream,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| DecodeError::UnsupportedFormat("no decodable audio track".to_string()))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(1);

    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(buffer) => {
                let spec = *buffer.spec();
                sample_rate = spec.rate;
                channels = spec.channels.count() as u16;

                let mut interleaved = SampleBuffer::<f32>::new(buffer.capacity() as u64, spec);
                interleaved.copy_interleaved_ref(buffer);
                samples.extend_from_slice(interleaved.samples());
            }
            // Corrupt frame: skip it and keep going
            Err(SymphoniaError::DecodeError(msg)) => {
                log::debug!("Skipping undecodable packet: {}", msg);
            }
            Err(e) => return Err(e.into()),
        }
    }

    if sample_rate == 0 {
        return Err(DecodeError::UnsupportedFormat(
            "stream does not declare a sample rate".to_string(),
        ));
    }

    Ok(DecodedAudio::new(samples, sample_rate, channels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::export::encode_wav;

    #[test]
    fn test_detect_by_magic_and_hint() {
        let mut riff = b"RIFF\0\0\0\0WAVE".to_vec();
        riff.extend_from_slice(&[0; 8]);
        assert_eq!(AudioFormat::detect(&riff, None), AudioFormat::Wav);
        assert_eq!(AudioFormat::detect(b"fLaC\0\0\0\0", Some("mp3")), AudioFormat::Flac);
        assert_eq!(AudioFormat::detect(b"garbage", Some(".WAV")), AudioFormat::Wav);
        assert_eq!(AudioFormat::detect(b"ID3\x04", Some("mp3")), AudioFormat::Other);
    }

    #[test]
    fn test_decode_wav_roundtrip() {
        let samples: Vec<f32> = (0..4410).map(|i| (i as f32 * 0.05).sin() * 0.5).collect();
        let bytes = encode_wav(&samples, 44100, 1).unwrap();

        let decoded = decode(&bytes, None).unwrap();
        assert_eq!(decoded.sample_rate, 44100);
        assert_eq!(decoded.channels, 1);
        assert_eq!(decoded.frames(), 4410);
        assert!((decoded.duration_secs() - 0.1).abs() < 1e-9);
        for (a, b) in decoded.samples.iter().zip(&samples) {
            assert!((a - b).abs() < 1e-3);
        }
    }

    #[test]
    fn test_decode_empty_and_garbage() {
        assert!(matches!(decode(&[], None), Err(DecodeError::Empty)));
        assert!(decode(b"definitely not audio", Some("mp3")).is_err());
    }

    #[test]
    fn test_to_mono_averages_channels() {
        let audio = DecodedAudio::new(vec![1.0, 0.0, 0.5, 0.5], 8000, 2);
        assert_eq!(audio.frames(), 2);
        assert_eq!(audio.to_mono(), vec![0.5, 0.5]);
        assert_eq!(audio.frame(1), (0.5, 0.5));
    }

    #[test]
    fn test_resample_changes_length() {
        let samples: Vec<f32> = (0..22050).map(|i| (i as f32 * 0.01).sin()).collect();
        let audio = DecodedAudio::new(samples, 22050, 1);

        let resampled = audio.resample(44100).unwrap();
        assert_eq!(resampled.sample_rate, 44100);
        assert_eq!(resampled.frames(), 44100);
        assert!((resampled.duration_secs() - audio.duration_secs()).abs() < 1e-6);

        let same = audio.resample(22050).unwrap();
        assert_eq!(same.frames(), audio.frames());
    }
}
