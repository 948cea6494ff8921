// src/assets.rs
//
// Ambient sound identifiers and how their bytes become playable buffers.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::debug;
use serde::{Deserialize, Serialize};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::AudioError;
use crate::nodes::SharedAudioData;

/// The fixed set of ambient backgrounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoundId {
    None,
    #[default]
    Ocean,
    Rain,
    Forest,
    Stream,
}

impl SoundId {
    pub const ALL: [SoundId; 5] = [
        SoundId::None,
        SoundId::Ocean,
        SoundId::Rain,
        SoundId::Forest,
        SoundId::Stream,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SoundId::None => "none",
            SoundId::Ocean => "ocean",
            SoundId::Rain => "rain",
            SoundId::Forest => "forest",
            SoundId::Stream => "stream",
        }
    }

    pub fn is_none(&self) -> bool {
        *self == SoundId::None
    }
}

impl fmt::Display for SoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SoundId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SoundId::ALL
            .into_iter()
            .find(|id| id.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown sound '{s}'"))
    }
}

// ═══════════════════════════════════════════════════════════════════
// Sources
// ═══════════════════════════════════════════════════════════════════

/// Resolves a sound to its encoded bytes.
pub trait AssetSource: Send + Sync {
    fn fetch(&self, sound: SoundId) -> impl Future<Output = Result<Vec<u8>, AudioError>> + Send;
}

/// Reads `<root>/<sound>.<extension>` from disk.
#[derive(Debug, Clone)]
pub struct FileAssets {
    root: PathBuf,
    extension: String,
}

impl FileAssets {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
        }
    }

    pub fn path_for(&self, sound: SoundId) -> PathBuf {
        self.root
            .join(sound.as_str())
            .with_extension(self.extension.trim_start_matches('.'))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetSource for FileAssets {
    fn fetch(&self, sound: SoundId) -> impl Future<Output = Result<Vec<u8>, AudioError>> + Send {
        let path = self.path_for(sound);
        async move {
            debug!("reading {}", path.display());
            tokio::fs::read(&path)
                .await
                .map_err(|source| AudioError::Asset { sound, source })
        }
    }
}

/// In-memory assets. Counts fetches so callers can observe caching.
#[derive(Debug, Default)]
pub struct MemoryAssets {
    sounds: HashMap<SoundId, Arc<Vec<u8>>>,
    fetches: AtomicUsize,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sound(mut self, sound: SoundId, bytes: Vec<u8>) -> Self {
        self.sounds.insert(sound, Arc::new(bytes));
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }
}

impl AssetSource for MemoryAssets {
    fn fetch(&self, sound: SoundId) -> impl Future<Output = Result<Vec<u8>, AudioError>> + Send {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let result = self
            .sounds
            .get(&sound)
            .map(|bytes| bytes.as_ref().clone())
            .ok_or_else(|| AudioError::Asset {
                sound,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not registered"),
            });
        async move { result }
    }
}

impl<A: AssetSource> AssetSource for Arc<A> {
    fn fetch(&self, sound: SoundId) -> impl Future<Output = Result<Vec<u8>, AudioError>> + Send {
        self.as_ref().fetch(sound)
    }
}

// ═══════════════════════════════════════════════════════════════════
// Decoding
// ═══════════════════════════════════════════════════════════════════

/// Decode any format symphonia can probe into interleaved f32.
pub fn decode(sound: SoundId, bytes: Vec<u8>) -> Result<SharedAudioData, AudioError> {
    let fail = |reason: String| AudioError::Decode { sound, reason };

    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());
    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| fail(e.to_string()))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| fail("no default track".into()))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut channels = track.codec_params.channels.map(|c| c.count());

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| fail(e.to_string()))?;

    let mut samples: Vec<f32> = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(fail(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate.get_or_insert(spec.rate);
                channels.get_or_insert(spec.channels.count());
                let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buf.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buf.samples());
            }
            // Skip corrupt packets rather than dropping the whole sound.
            Err(SymphoniaError::IoError(_)) | Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(fail(e.to_string())),
        }
    }

    let sample_rate = sample_rate.ok_or_else(|| fail("unknown sample rate".into()))?;
    let channels = channels.ok_or_else(|| fail("unknown channel count".into()))?;
    if samples.is_empty() {
        return Err(fail("no audio frames".into()));
    }

    let data = SharedAudioData::new(sound, sample_rate as f64, channels, samples);
    debug!(
        "decoded {}: {:.2}s, {} ch @ {} Hz",
        sound,
        data.duration_secs(),
        data.channels,
        sample_rate
    );
    Ok(data)
}
