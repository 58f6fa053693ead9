use crate::error::Result;
use std::io::{self, Write};
use std::path::Path;

/// Audible cue played on every accepted code.
///
/// Playback problems are logged and otherwise ignored.
#[derive(Debug)]
pub enum SoundCue {
    /// No sound
    Silent,
    /// Terminal bell (BEL on stderr)
    Bell,
    /// Tone or sound file through the default audio output
    #[cfg(feature = "audio")]
    Speaker(player::Player),
}

impl SoundCue {
    /// Choose the cue for the given options.
    ///
    /// Without the `audio` feature a configured sound file cannot be played and the
    /// terminal bell is used instead.
    pub fn from_options(enabled: bool, sound_file: Option<&Path>) -> Result<Self> {
        if !enabled {
            return Ok(SoundCue::Silent);
        }

        speaker(sound_file)
    }

    /// Play the cue without blocking.
    pub fn play(&self) {
        match self {
            SoundCue::Silent => {}
            SoundCue::Bell => {
                let mut stderr = io::stderr();
                if let Err(err) = stderr.write_all(b"\x07").and_then(|_| stderr.flush()) {
                    tracing::debug!("Bell failed: {err}");
                }
            }
            #[cfg(feature = "audio")]
            SoundCue::Speaker(player) => player.play(),
        }
    }
}

#[cfg(feature = "audio")]
fn speaker(sound_file: Option<&Path>) -> Result<SoundCue> {
    Ok(SoundCue::Speaker(player::Player::spawn(sound_file)?))
}

#[cfg(not(feature = "audio"))]
fn speaker(sound_file: Option<&Path>) -> Result<SoundCue> {
    if let Some(path) = sound_file {
        tracing::warn!(
            "Ignoring sound file {}: built without the `audio` feature",
            path.display()
        );
    }
    Ok(SoundCue::Bell)
}

#[cfg(feature = "audio")]
mod player {
    use crate::error::{Error, Result};
    use rodio::source::{SineWave, Source};
    use rodio::{Decoder, OutputStream, Sink};
    use std::io::Cursor;
    use std::path::Path;
    use std::sync::mpsc::{self, Sender};
    use std::thread;
    use std::time::Duration;

    const TONE_HZ: f32 = 880.0;
    const TONE_LENGTH: Duration = Duration::from_millis(150);

    /// Handle to the audio thread. The output stream is not `Send`, so it lives on a
    /// dedicated thread that plays one cue per message.
    #[derive(Debug)]
    pub struct Player {
        tx: Sender<()>,
    }

    impl Player {
        pub(super) fn spawn(sound_file: Option<&Path>) -> Result<Self> {
            let clip = match sound_file {
                Some(path) => Some(std::fs::read(path).map_err(|e| {
                    Error::Audio(format!("Cannot read sound file {}: {e}", path.display()))
                })?),
                None => None,
            };

            let (tx, rx) = mpsc::channel::<()>();
            thread::Builder::new()
                .name("qscan-audio".to_string())
                .spawn(move || {
                    let (_stream, handle) = match OutputStream::try_default() {
                        Ok(output) => output,
                        Err(err) => {
                            tracing::debug!("No audio output, scan cue disabled: {err}");
                            // Drain requests so senders never notice
                            while rx.recv().is_ok() {}
                            return;
                        }
                    };

                    while rx.recv().is_ok() {
                        let sink = match Sink::try_new(&handle) {
                            Ok(sink) => sink,
                            Err(err) => {
                                tracing::debug!("Audio sink unavailable: {err}");
                                continue;
                            }
                        };
                        match &clip {
                            Some(bytes) => match Decoder::new(Cursor::new(bytes.clone())) {
                                Ok(source) => sink.append(source),
                                Err(err) => {
                                    tracing::debug!("Sound file not playable: {err}");
                                    continue;
                                }
                            },
                            None => sink.append(
                                SineWave::new(TONE_HZ)
                                    .take_duration(TONE_LENGTH)
                                    .amplify(0.25),
                            ),
                        }
                        sink.detach();
                    }
                })
                .map_err(|e| Error::Audio(format!("Failed to spawn audio thread: {e}")))?;

            Ok(Self { tx })
        }

        pub(super) fn play(&self) {
            if self.tx.send(()).is_err() {
                tracing::debug!("Audio thread is gone, cue skipped");
            }
        }
    }
}
