// Audio engine - Real-time CPAL output callback
//
// # Format Support
//
// The engine opens the default output device in its preferred sample
// format (F32, I16 or U16). Stems are always mixed in f32 stereo by
// `StemBank::render`; the conversion to the device format happens while
// writing each output frame, without allocation.
//
// # Stream Limitations
//
// On macOS (CoreAudio) `Stream` is neither Send nor Sync, so the engine
// must stay on the thread that created it. Stream errors are reported
// through the notification channel; reconnection is left to the host.

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use thiserror::Error;

use crate::audio::dsp_utils::{OnePoleSmoother, flush_denormals_to_zero, soft_clip};
use crate::audio::format_conversion::write_stereo_to_interleaved_frame;
use crate::audio::parameters::AtomicF32;
use crate::audio::stems::StemBank;
use crate::messaging::channels::{NotificationProducer, push_notification};
use crate::messaging::notification::{Notification, NotificationCategory};

/// Scratch buffer size in frames; larger device buffers are rendered in chunks
const MAX_BLOCK_FRAMES: usize = 4096;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("No audio output device found")]
    NoDevice,

    #[error("Device configuration error: {0}")]
    Config(String),

    #[error("Unsupported sample format: {0:?}. Supported formats: F32, I16, U16")]
    UnsupportedFormat(SampleFormat),

    #[error("Stream error: {0}")]
    Stream(String),
}

pub struct AudioEngine {
    _device: Device,
    _stream: Stream,
    sample_rate: u32,
    pub volume: AtomicF32,
}

impl AudioEngine {
    /// Query the default output device's sample rate, so stems can be
    /// decoded at that rate before the stream opens.
    pub fn default_sample_rate() -> Result<u32, EngineError> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or(EngineError::NoDevice)?;
        let config = device
            .default_output_config()
            .map_err(|e| EngineError::Config(e.to_string()))?;
        Ok(config.sample_rate().0)
    }

    /// Open the default output device and start rendering `bank`
    pub fn new(
        bank: Arc<StemBank>,
        master_volume: f32,
        notification_tx: Arc<Mutex<NotificationProducer>>,
    ) -> Result<Self, EngineError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(EngineError::NoDevice)?;

        log::info!(
            "Audio device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        let supported_config = device
            .default_output_config()
            .map_err(|e| EngineError::Config(e.to_string()))?;

        let sample_format = supported_config.sample_format();
        let sample_rate = supported_config.sample_rate().0;
        let channels = supported_config.channels() as usize;
        let config: StreamConfig = supported_config.into();

        if sample_rate != bank.sample_rate() {
            log::warn!(
                "Stem bank runs at {} Hz but device runs at {} Hz; playback speed will be off",
                bank.sample_rate(),
                sample_rate
            );
        }

        let volume = AtomicF32::new(master_volume);

        let stream = match sample_format {
            SampleFormat::F32 => Self::build_stream::<f32>(
                &device,
                &config,
                channels,
                Arc::clone(&bank),
                volume.clone(),
                notification_tx.clone(),
            ),
            SampleFormat::I16 => Self::build_stream::<i16>(
                &device,
                &config,
                channels,
                Arc::clone(&bank),
                volume.clone(),
                notification_tx.clone(),
            ),
            SampleFormat::U16 => Self::build_stream::<u16>(
                &device,
                &config,
                channels,
                Arc::clone(&bank),
                volume.clone(),
                notification_tx.clone(),
            ),
            other => return Err(EngineError::UnsupportedFormat(other)),
        }?;

        stream
            .play()
            .map_err(|e| EngineError::Stream(e.to_string()))?;

        log::info!("Audio engine started: {} Hz, {} channels", sample_rate, channels);
        push_notification(
            &notification_tx,
            Notification::info(
                NotificationCategory::Audio,
                format!("Audio connected: {} Hz", sample_rate),
            ),
        );

        Ok(Self {
            _device: device,
            _stream: stream,
            sample_rate,
            volume,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn build_stream<T>(
        device: &Device,
        config: &StreamConfig,
        channels: usize,
        bank: Arc<StemBank>,
        volume: AtomicF32,
        notification_tx: Arc<Mutex<NotificationProducer>>,
    ) -> Result<Stream, EngineError>
    where
        T: SizedSample + FromSample<f32> + Send + 'static,
    {
        let mut smoother = OnePoleSmoother::new(volume.get(), 10.0, config.sample_rate.0 as f32);
        let mut scratch = vec![0.0f32; MAX_BLOCK_FRAMES * 2];

        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    // No allocations, no I/O, no blocking locks past this point
                    for block in data.chunks_mut(MAX_BLOCK_FRAMES * channels.max(1)) {
                        let frames = block.len() / channels.max(1);
                        let mix = &mut scratch[..frames * 2];
                        bank.render(mix);

                        for (frame, stereo) in block.chunks_mut(channels.max(1)).zip(mix.chunks_exact(2)) {
                            let gain = smoother.process(volume.get());
                            let left = soft_clip(flush_denormals_to_zero(stereo[0]) * gain);
                            let right = soft_clip(flush_denormals_to_zero(stereo[1]) * gain);
                            write_stereo_to_interleaved_frame((left, right), frame);
                        }
                    }
                },
                move |err| {
                    log::error!("Audio stream error: {}", err);
                    push_notification(
                        &notification_tx,
                        Notification::error(
                            NotificationCategory::Audio,
                            format!("Audio stream error: {}", err),
                        ),
                    );
                },
                None,
            )
            .map_err(|e| EngineError::Stream(e.to_string()))
    }
}
