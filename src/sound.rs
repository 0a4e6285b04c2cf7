use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample, Stream};
use log::warn;

const TONE_HZ: f32 = 440.0;

/// The audio collaborator: a single output stream producing a sine tone,
/// played while the sound timer is active and paused otherwise.
pub struct Sound {
    stream: Stream,
    active: bool,
}

impl Sound {
    /// Builds the beeper with its stream paused. Returns `None` (with a
    /// warning) when no usable output device exists, so the emulator can run
    /// silent instead of failing to start.
    pub fn new() -> Option<Self> {
        let host = cpal::default_host();
        let device = match host.default_output_device() {
            Some(device) => device,
            None => {
                warn!("no audio output device available, running without sound");
                return None;
            }
        };
        let config = match device.default_output_config() {
            Ok(config) => config,
            Err(err) => {
                warn!("error while querying audio output config: {err}");
                return None;
            }
        };

        let sample_format = config.sample_format();
        let config = config.into();
        let stream = match sample_format {
            cpal::SampleFormat::I8 => Self::build_stream::<i8>(&device, &config),
            cpal::SampleFormat::I16 => Self::build_stream::<i16>(&device, &config),
            cpal::SampleFormat::I32 => Self::build_stream::<i32>(&device, &config),
            cpal::SampleFormat::I64 => Self::build_stream::<i64>(&device, &config),
            cpal::SampleFormat::U8 => Self::build_stream::<u8>(&device, &config),
            cpal::SampleFormat::U16 => Self::build_stream::<u16>(&device, &config),
            cpal::SampleFormat::U32 => Self::build_stream::<u32>(&device, &config),
            cpal::SampleFormat::U64 => Self::build_stream::<u64>(&device, &config),
            cpal::SampleFormat::F32 => Self::build_stream::<f32>(&device, &config),
            cpal::SampleFormat::F64 => Self::build_stream::<f64>(&device, &config),
            sample_format => {
                warn!("unsupported sample format '{sample_format}'");
                return None;
            }
        };

        match stream {
            Ok(stream) => {
                if let Err(err) = stream.pause() {
                    warn!("could not pause audio stream: {err}");
                }
                Some(Self {
                    stream,
                    active: false,
                })
            }
            Err(err) => {
                warn!("could not build audio stream: {err}");
                None
            }
        }
    }

    /// Follows the polled sound-active flag; the stream is only touched on
    /// transitions.
    pub fn set_active(&mut self, active: bool) {
        if active == self.active {
            return;
        }
        let result = if active {
            self.stream.play().map_err(|err| err.to_string())
        } else {
            self.stream.pause().map_err(|err| err.to_string())
        };
        match result {
            Ok(()) => self.active = active,
            Err(err) => warn!("audio stream error: {err}"),
        }
    }

    fn build_stream<T>(
        device: &cpal::Device,
        config: &cpal::StreamConfig,
    ) -> Result<Stream, cpal::BuildStreamError>
    where
        T: SizedSample + FromSample<f32>,
    {
        let sample_rate = config.sample_rate.0 as f32;
        let channels = config.channels as usize;

        // Produce a sinusoid of maximum amplitude.
        let mut sample_clock = 0f32;
        let mut next_value = move || {
            sample_clock = (sample_clock + 1.0) % sample_rate;
            (sample_clock * TONE_HZ * 2.0 * std::f32::consts::PI / sample_rate).sin()
        };

        let err_fn = |err| warn!("an error occurred on the audio stream: {err}");

        device.build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                Self::write_data(data, channels, &mut next_value)
            },
            err_fn,
            None,
        )
    }

    fn write_data<T>(output: &mut [T], channels: usize, next_sample: &mut dyn FnMut() -> f32)
    where
        T: Sample + FromSample<f32>,
    {
        for frame in output.chunks_mut(channels) {
            let value: T = T::from_sample(next_sample());
            for sample in frame.iter_mut() {
                *sample = value;
            }
        }
    }
}
