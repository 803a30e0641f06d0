//! # Audio Capture Module
//!
//! Real-time microphone capture using CPAL (Cross-Platform Audio Library).
//! Opens an input device, converts whatever sample format it delivers to
//! mono `f32`, and hands each callback's samples to the caller.
//!
//! ## Features
//! - Default or named input device selection
//! - Any CPAL sample format, converted to f32
//! - Interleaved multi-channel input downmixed to mono

use anyhow::{Context, Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Sample, SampleFormat, SizedSample, Stream, StreamConfig, SupportedStreamConfig};

/// Nominal capture rate. The device's own default rate is used when it
/// differs; estimates are computed against the actual rate.
pub const SAMPLE_RATE: u32 = 44100;

/// An input device and the configuration it will be opened with.
pub struct AudioInput {
    device: Device,
    config: SupportedStreamConfig,
    name: String,
}

impl AudioInput {
    /// Selects an input device by name, or the host default.
    pub fn open(device_name: Option<&str>) -> Result<Self> {
        let host = cpal::default_host();
        let device = match device_name {
            Some(wanted) => host
                .input_devices()
                .context("Failed to enumerate input devices")?
                .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
                .ok_or_else(|| anyhow!("Input device not found: {}", wanted))?,
            None => host
                .default_input_device()
                .ok_or_else(|| anyhow!("No input device available"))?,
        };

        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let config = device
            .default_input_config()
            .with_context(|| format!("No usable input config for {}", name))?;

        log::info!("Using audio input device: {}", name);
        log::info!(
            "Selected sample rate: {} Hz ({} channel(s), {:?})",
            config.sample_rate().0,
            config.channels(),
            config.sample_format()
        );
        if config.sample_rate().0 != SAMPLE_RATE {
            log::debug!("Device rate differs from nominal {} Hz", SAMPLE_RATE);
        }

        Ok(Self { device, config, name })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate().0
    }

    /// Builds and starts the input stream.
    ///
    /// `on_samples` runs on the audio thread with mono f32 samples.
    pub fn start<F>(self, on_samples: F) -> Result<Stream>
    where
        F: FnMut(&[f32]) + Send + 'static,
    {
        let stream_config: StreamConfig = self.config.config();
        let stream = match self.config.sample_format() {
            SampleFormat::I8 => build_stream::<i8, F>(&self.device, &stream_config, on_samples)?,
            SampleFormat::I16 => build_stream::<i16, F>(&self.device, &stream_config, on_samples)?,
            SampleFormat::I32 => build_stream::<i32, F>(&self.device, &stream_config, on_samples)?,
            SampleFormat::I64 => build_stream::<i64, F>(&self.device, &stream_config, on_samples)?,
            SampleFormat::U8 => build_stream::<u8, F>(&self.device, &stream_config, on_samples)?,
            SampleFormat::U16 => build_stream::<u16, F>(&self.device, &stream_config, on_samples)?,
            SampleFormat::U32 => build_stream::<u32, F>(&self.device, &stream_config, on_samples)?,
            SampleFormat::U64 => build_stream::<u64, F>(&self.device, &stream_config, on_samples)?,
            SampleFormat::F32 => build_stream::<f32, F>(&self.device, &stream_config, on_samples)?,
            SampleFormat::F64 => build_stream::<f64, F>(&self.device, &stream_config, on_samples)?,
            other => return Err(anyhow!("Unsupported sample format: {:?}", other)),
        };

        stream.play().context("Failed to start input stream")?;
        Ok(stream)
    }
}

/// Starts capture from the named or default input device.
///
/// # Returns
/// * `Ok((stream, sample_rate))` - Running stream handle and its sample rate
/// * `Err(e)` - Device or stream setup failed
pub fn start_audio_capture<F>(device_name: Option<&str>, on_samples: F) -> Result<(Stream, u32)>
where
    F: FnMut(&[f32]) + Send + 'static,
{
    let input = AudioInput::open(device_name)?;
    let sample_rate = input.sample_rate();
    Ok((input.start(on_samples)?, sample_rate))
}

fn build_stream<T, F>(device: &Device, config: &StreamConfig, mut on_samples: F) -> Result<Stream>
where
    T: Sample + SizedSample + Send + 'static,
    f32: cpal::FromSample<T>,
    F: FnMut(&[f32]) + Send + 'static,
{
    let channels = config.channels.max(1) as usize;
    let mut mono: Vec<f32> = Vec::new();

    let stream = device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                mono.clear();
                downmix_into(data, channels, &mut mono);
                on_samples(&mono);
            },
            |err| log::error!("An error occurred on the audio stream: {}", err),
            None,
        )
        .context("Failed to build input stream")?;

    Ok(stream)
}

/// Averages interleaved frames into mono f32 samples.
fn downmix_into<T>(data: &[T], channels: usize, out: &mut Vec<f32>)
where
    T: Sample,
    f32: cpal::FromSample<T>,
{
    if channels <= 1 {
        out.extend(data.iter().map(|&s| f32::from_sample(s)));
        return;
    }
    out.extend(data.chunks(channels).map(|frame| {
        frame.iter().map(|&s| f32::from_sample(s)).sum::<f32>() / frame.len() as f32
    }));
}

/// Names of all available input devices.
pub fn list_input_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let mut devices = Vec::new();

    for device in host.input_devices()? {
        if let Ok(name) = device.name() {
            devices.push(name);
        }
    }

    Ok(devices)
}

pub fn default_input_device_name() -> Result<String> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("No default input device"))?;
    Ok(device.name()?)
}
