use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use crossbeam_channel::{Receiver, Sender};
use log::{info, warn};
use std::collections::VecDeque;

use super::{AcquireError, ByteSpectrumAnalyser, SpectrumSnapshot, SpectrumSource};

/// Live microphone input behind the sampler boundary.
///
/// The cpal callback only forwards mono PCM blocks over a channel. Blocks are
/// drained on the caller's thread every tick, whether or not a snapshot is
/// taken, so analysis and everything downstream of it stays single-threaded.
pub struct MicrophoneSource {
    stream: Option<Stream>,
    audio_receiver: Receiver<Vec<f32>>,
    recent: VecDeque<f32>,
    analyser: ByteSpectrumAnalyser,
    sample_rate: f32,
    transform_size: usize,
}

impl MicrophoneSource {
    pub fn acquire(analyser: ByteSpectrumAnalyser) -> Result<Self, AcquireError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(AcquireError::DeviceUnavailable)?;

        let config = device.default_input_config().map_err(|e| match e {
            cpal::DefaultStreamConfigError::DeviceNotAvailable => AcquireError::DeviceUnavailable,
            other => classify_backend_error(other.to_string()),
        })?;

        info!("Using audio device: {}", device.name().unwrap_or_else(|_| "Unknown".to_string()));
        info!("Audio config: {:?}", config);

        let sample_rate = config.sample_rate().0 as f32;
        let sample_format = config.sample_format();
        let (audio_sender, audio_receiver) = crossbeam_channel::unbounded();

        let stream = Self::create_input_stream(&device, &config.into(), sample_format, audio_sender)?;
        stream.play().map_err(|e| match e {
            cpal::PlayStreamError::DeviceNotAvailable => AcquireError::DeviceUnavailable,
            other => classify_backend_error(other.to_string()),
        })?;

        let transform_size = analyser.fft_size();

        Ok(Self {
            stream: Some(stream),
            audio_receiver,
            recent: VecDeque::with_capacity(transform_size * 2),
            analyser,
            sample_rate,
            transform_size,
        })
    }

    fn create_input_stream(
        device: &Device,
        config: &StreamConfig,
        sample_format: SampleFormat,
        sender: Sender<Vec<f32>>,
    ) -> Result<Stream, AcquireError> {
        info!(
            "Creating input stream with {} channels at {} Hz ({:?})",
            config.channels, config.sample_rate.0, sample_format
        );

        match sample_format {
            SampleFormat::F32 => Self::build_stream::<f32>(device, config, sender),
            SampleFormat::I16 => Self::build_stream::<i16>(device, config, sender),
            SampleFormat::U16 => Self::build_stream::<u16>(device, config, sender),
            other => Err(AcquireError::Stream(format!("unsupported sample format {other:?}"))),
        }
    }

    fn build_stream<T>(
        device: &Device,
        config: &StreamConfig,
        sender: Sender<Vec<f32>>,
    ) -> Result<Stream, AcquireError>
    where
        T: SizedSample,
        f32: cpal::FromSample<T>,
    {
        let channels = config.channels.max(1) as usize;

        device
            .build_input_stream(
                config,
                move |data: &[T], _: &cpal::InputCallbackInfo| {
                    let mono_data: Vec<f32> = data
                        .chunks(channels)
                        .map(|frame| {
                            frame.iter().map(|&s| s.to_sample::<f32>()).sum::<f32>() / channels as f32
                        })
                        .collect();

                    if sender.send(mono_data).is_err() {
                        warn!("Failed to send audio data");
                    }
                },
                |err| {
                    warn!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| match e {
                cpal::BuildStreamError::DeviceNotAvailable => AcquireError::DeviceUnavailable,
                other => classify_backend_error(other.to_string()),
            })
    }

    pub fn is_released(&self) -> bool {
        self.stream.is_none()
    }
}

/// Move every queued block into `recent`, keeping only its newest `keep` samples.
fn drain_blocks(receiver: &Receiver<Vec<f32>>, recent: &mut VecDeque<f32>, keep: usize) {
    while let Ok(block) = receiver.try_recv() {
        recent.extend(block);
        let excess = recent.len().saturating_sub(keep);
        recent.drain(..excess);
    }
}

/// cpal has no dedicated permission error; backends report it in their message.
fn classify_backend_error(message: String) -> AcquireError {
    let lowered = message.to_lowercase();
    if lowered.contains("permission") || lowered.contains("not authorized") || lowered.contains("denied") {
        AcquireError::PermissionDenied
    } else {
        AcquireError::Stream(message)
    }
}

impl SpectrumSource for MicrophoneSource {
    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn transform_size(&self) -> usize {
        self.transform_size
    }

    fn snapshot(&mut self) -> SpectrumSnapshot {
        let step = self.bin_frequency_step();
        if self.stream.is_none() {
            return SpectrumSnapshot::silent(self.analyser.bin_count(), step);
        }

        drain_blocks(&self.audio_receiver, &mut self.recent, self.transform_size);
        let magnitudes = self.analyser.analyse(self.recent.make_contiguous());
        SpectrumSnapshot::new(magnitudes, step)
    }

    fn discard_pending(&mut self) {
        drain_blocks(&self.audio_receiver, &mut self.recent, self.transform_size);
    }

    fn release(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                warn!("Failed to pause input stream on release: {}", e);
            }
            drop(stream);
            self.recent.clear();
            info!("Microphone released");
        }
    }

    fn source_type(&self) -> &'static str {
        "microphone"
    }
}

impl Drop for MicrophoneSource {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draining_empties_the_queue_and_keeps_the_newest_window() {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let mut recent = VecDeque::new();

        // Ten seconds of 480-sample blocks at 48 kHz, as if nobody had looked.
        for block in 0..1000 {
            sender.send(vec![block as f32; 480]).unwrap();
        }
        drain_blocks(&receiver, &mut recent, 1024);

        assert!(receiver.is_empty());
        assert_eq!(recent.len(), 1024);
        assert_eq!(recent.back(), Some(&999.0));
        assert_eq!(recent.front(), Some(&997.0));
    }

    #[test]
    fn backend_messages_are_classified() {
        assert_eq!(
            classify_backend_error("Access denied by the user".to_string()),
            AcquireError::PermissionDenied
        );
        assert_eq!(
            classify_backend_error("Microphone permission was not granted".to_string()),
            AcquireError::PermissionDenied
        );
        assert_eq!(
            classify_backend_error("ALSA function 'snd_pcm_open' failed".to_string()),
            AcquireError::Stream("ALSA function 'snd_pcm_open' failed".to_string())
        );
    }
}
