use crate::error::NotifyError;
use std::{f32::consts::TAU, sync::Arc, time::Duration};
use tracing::debug;

const SAMPLE_RATE: u32 = 44_100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
    Triangle,
    Sawtooth,
}

impl Waveform {
    /// One sample at `phase` in [0, 1).
    fn sample(self, phase: f32) -> f32 {
        match self {
            Waveform::Sine => (TAU * phase).sin(),
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
            Waveform::Sawtooth => 2.0 * phase - 1.0,
        }
    }
}

/// An oscillator feeding a gain node that ramps exponentially from
/// `initial_gain` to `decay_target` over `duration`, then stops.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ToneSpec {
    pub frequency_hz: f32,
    pub waveform: Waveform,
    pub initial_gain: f32,
    pub decay_target: f32,
    pub duration: Duration,
}

/// Short beep played alongside a food-ready alert.
pub const FOOD_READY_CUE: ToneSpec = ToneSpec {
    frequency_hz: 800.0,
    waveform: Waveform::Sine,
    initial_gain: 0.3,
    decay_target: 0.01,
    duration: Duration::from_millis(500),
};

impl ToneSpec {
    pub fn gain_at(&self, t: f32) -> f32 {
        let total = self.duration.as_secs_f32();
        if total <= 0.0 || self.initial_gain <= 0.0 || self.decay_target <= 0.0 {
            return 0.0;
        }
        let progress = (t / total).clamp(0.0, 1.0);
        self.initial_gain * (self.decay_target / self.initial_gain).powf(progress)
    }

    /// Mono 16-bit PCM samples at 44.1 kHz.
    pub fn render(&self) -> Vec<i16> {
        let count = (self.duration.as_secs_f32() * SAMPLE_RATE as f32).round() as usize;
        (0..count)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                let phase = (self.frequency_hz * t).fract();
                let v = self.waveform.sample(phase) * self.gain_at(t);
                (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
            })
            .collect()
    }

    /// The rendered tone as an in-memory RIFF/WAVE file.
    pub fn to_wav(&self) -> Vec<u8> {
        let samples = self.render();
        let data_len = (samples.len() * 2) as u32;
        let mut out = Vec::with_capacity(44 + data_len as usize);
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes()); // PCM
        out.extend_from_slice(&1u16.to_le_bytes()); // mono
        out.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
        out.extend_from_slice(&(SAMPLE_RATE * 2).to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        for s in samples {
            out.extend_from_slice(&s.to_le_bytes());
        }
        out
    }
}

pub trait AudioOutput: Send + Sync {
    /// Plays the tone to completion. May block.
    fn play(&self, tone: &ToneSpec) -> Result<(), NotifyError>;
}

/// Plays `tone` on the blocking pool and forgets about it.
///
/// Failures, including a panicking backend, end here: they are logged at
/// debug level and never reach the caller.
pub fn play_cue(output: Arc<dyn AudioOutput>, tone: ToneSpec) {
    tokio::task::spawn_blocking(move || {
        if let Err(e) = output.play(&tone) {
            debug!("sound not supported: {e}");
        }
    });
}

/// Default output device of the host.
pub struct SystemAudio;

impl AudioOutput for SystemAudio {
    #[cfg(windows)]
    fn play(&self, tone: &ToneSpec) -> Result<(), NotifyError> {
        use windows_sys::Win32::Media::Audio::{PlaySoundW, SND_MEMORY, SND_NODEFAULT, SND_SYNC};

        let wav = tone.to_wav();
        // SND_MEMORY reinterprets the pointer as the in-memory file image.
        let ok = unsafe {
            PlaySoundW(
                wav.as_ptr() as *const u16,
                std::ptr::null_mut(),
                SND_MEMORY | SND_SYNC | SND_NODEFAULT,
            )
        };
        if ok == 0 {
            return Err(NotifyError::AudioUnavailable("PlaySoundW failed".to_string()));
        }
        Ok(())
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    fn play(&self, tone: &ToneSpec) -> Result<(), NotifyError> {
        let wav = tone.to_wav();
        let mut failures = Vec::new();
        for (program, args) in PLAYERS {
            match pipe_to_player(program, args, &wav) {
                Ok(()) => return Ok(()),
                Err(e) => failures.push(e),
            }
        }
        Err(NotifyError::AudioUnavailable(failures.join("; ")))
    }

    #[cfg(not(any(windows, all(unix, not(target_os = "macos")))))]
    fn play(&self, _tone: &ToneSpec) -> Result<(), NotifyError> {
        Err(NotifyError::AudioUnavailable(
            "no audio output on this platform".to_string(),
        ))
    }
}

/// Sound servers tried in order; each reads a WAV stream on stdin.
#[cfg(all(unix, not(target_os = "macos")))]
const PLAYERS: [(&str, &[&str]); 3] = [
    ("paplay", &[]),
    ("pw-play", &["-"]),
    ("aplay", &["-q", "-"]),
];

/// Feeds `wav` to `program` and waits for it to finish playing.
#[cfg(all(unix, not(target_os = "macos")))]
fn pipe_to_player(program: &str, args: &[&str], wav: &[u8]) -> Result<(), String> {
    use std::{
        io::Write,
        process::{Command, Stdio},
    };

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| format!("{program}: {e}"))?;

    // stdin is dropped before the wait so the player sees end of file.
    let written = match child.stdin.take() {
        Some(mut stdin) => stdin.write_all(wav),
        None => Ok(()),
    };
    let status = child.wait().map_err(|e| format!("{program}: {e}"))?;
    written.map_err(|e| format!("{program}: {e}"))?;
    if !status.success() {
        return Err(format!("{program} exited with {status}"));
    }
    Ok(())
}
