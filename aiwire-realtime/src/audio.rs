//! Audio formats and the base64 wire representation of audio payloads.

use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Audio encodings accepted in `input_audio_format` / `output_audio_format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AudioEncoding {
    /// 16-bit little-endian PCM.
    #[serde(rename = "pcm16")]
    #[default]
    Pcm16,
    /// G.711 μ-law.
    #[serde(rename = "g711_ulaw")]
    G711Ulaw,
    /// G.711 A-law.
    #[serde(rename = "g711_alaw")]
    G711Alaw,
    /// WAV container.
    #[serde(rename = "wav")]
    Wav,
    /// MP3 (output only on most providers).
    #[serde(rename = "mp3")]
    Mp3,
}

impl std::fmt::Display for AudioEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pcm16 => "pcm16",
            Self::G711Ulaw => "g711_ulaw",
            Self::G711Alaw => "g711_alaw",
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
        };
        f.write_str(name)
    }
}

/// Sample layout of raw audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Number of channels.
    pub channels: u8,
    /// Bits per sample.
    pub bits_per_sample: u8,
    /// Wire encoding.
    pub encoding: AudioEncoding,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::pcm16_24khz()
    }
}

impl AudioFormat {
    /// Mono PCM16 at 24kHz.
    pub fn pcm16_24khz() -> Self {
        Self { sample_rate: 24000, channels: 1, bits_per_sample: 16, encoding: AudioEncoding::Pcm16 }
    }

    /// Mono PCM16 at 16kHz.
    pub fn pcm16_16khz() -> Self {
        Self { sample_rate: 16000, channels: 1, bits_per_sample: 16, encoding: AudioEncoding::Pcm16 }
    }

    /// G.711 μ-law at 8kHz.
    pub fn g711_ulaw() -> Self {
        Self { sample_rate: 8000, channels: 1, bits_per_sample: 8, encoding: AudioEncoding::G711Ulaw }
    }

    /// Bytes of audio per second of playback.
    pub fn bytes_per_second(&self) -> u32 {
        self.sample_rate * self.channels as u32 * (self.bits_per_sample / 8) as u32
    }

    /// Playback duration of `bytes` bytes in milliseconds.
    pub fn duration_ms(&self, bytes: usize) -> f64 {
        let per_second = self.bytes_per_second();
        if per_second == 0 {
            return 0.0;
        }
        bytes as f64 * 1000.0 / per_second as f64
    }
}

/// A chunk of raw audio together with its layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    /// Raw audio data.
    pub data: Vec<u8>,
    /// Layout of `data`.
    pub format: AudioFormat,
}

impl AudioChunk {
    /// Create a new audio chunk.
    pub fn new(data: Vec<u8>, format: AudioFormat) -> Self {
        Self { data, format }
    }

    /// PCM16 24kHz chunk.
    pub fn pcm16_24khz(data: Vec<u8>) -> Self {
        Self::new(data, AudioFormat::pcm16_24khz())
    }

    /// Build a PCM16 chunk from samples (little-endian).
    pub fn from_i16_samples(samples: &[i16], format: AudioFormat) -> Self {
        let data = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        Self::new(data, format)
    }

    /// Playback duration in milliseconds.
    pub fn duration_ms(&self) -> f64 {
        self.format.duration_ms(self.data.len())
    }

    /// Base64 text of the audio data.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }
}

/// Serde adapter: raw bytes in memory, base64 text on the wire.
pub(crate) mod base64_bytes {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_format_bytes_per_second() {
        assert_eq!(AudioFormat::pcm16_24khz().bytes_per_second(), 48000);
        assert_eq!(AudioFormat::pcm16_16khz().bytes_per_second(), 32000);
        assert_eq!(AudioFormat::g711_ulaw().bytes_per_second(), 8000);
    }

    #[test]
    fn test_chunk_duration() {
        let chunk = AudioChunk::pcm16_24khz(vec![0; 4800]);
        assert!((chunk.duration_ms() - 100.0).abs() < 0.001);
    }

    #[test]
    fn test_from_i16_samples_is_little_endian() {
        let chunk = AudioChunk::from_i16_samples(&[1, -1], AudioFormat::pcm16_24khz());
        assert_eq!(chunk.data, vec![0x01, 0x00, 0xFF, 0xFF]);
        assert_eq!(chunk.to_base64(), "AQD//w==");
    }

    #[test]
    fn test_encoding_wire_names() {
        assert_eq!(serde_json::to_string(&AudioEncoding::G711Alaw).unwrap(), "\"g711_alaw\"");
        let parsed: AudioEncoding = serde_json::from_str("\"pcm16\"").unwrap();
        assert_eq!(parsed, AudioEncoding::Pcm16);
        assert_eq!(AudioEncoding::Mp3.to_string(), "mp3");
    }
}
