//! WAV container construction for raw PCM narration audio.
//!
//! Speech providers return headerless PCM plus a MIME-style descriptor such as
//! `audio/L16;rate=24000`. The descriptor is parsed into an [`AudioFormat`] and
//! the payload is wrapped in a canonical 44-byte RIFF header.

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{MediaError, MediaResult};

/// Size of the canonical PCM WAV header.
pub const WAV_HEADER_LEN: usize = 44;

/// PCM sample layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            channels: 1,
            sample_rate: 24_000,
            bits_per_sample: 16,
        }
    }
}

impl AudioFormat {
    /// Bytes per second, or `None` when it does not fit the header field.
    pub fn byte_rate(&self) -> Option<u32> {
        let rate = u64::from(self.sample_rate)
            .checked_mul(u64::from(self.channels))?
            .checked_mul(u64::from(self.bits_per_sample))?
            / 8;
        u32::try_from(rate).ok()
    }

    /// Bytes per sample frame, or `None` when it does not fit the header field.
    pub fn block_align(&self) -> Option<u16> {
        let align = u32::from(self.channels) * u32::from(self.bits_per_sample) / 8;
        u16::try_from(align).ok()
    }
}

/// Parse a provider audio descriptor.
///
/// Unknown or unparseable parts keep the defaults.
pub fn parse_descriptor(descriptor: &str) -> AudioFormat {
    let mut format = AudioFormat::default();
    let mut parts = descriptor.split(';').map(str::trim);

    if let Some(subtype) = parts
        .next()
        .and_then(|media_type| media_type.split_once('/'))
        .map(|(_, subtype)| subtype)
    {
        if let Some(bits) = subtype
            .strip_prefix('L')
            .and_then(|b| b.parse::<u16>().ok())
        {
            format.bits_per_sample = bits;
        }
    }

    for param in parts {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        match key.trim() {
            "rate" => {
                if let Ok(rate) = value.trim().parse() {
                    format.sample_rate = rate;
                }
            }
            "channels" => {
                if let Ok(channels) = value.trim().parse() {
                    format.channels = channels;
                }
            }
            _ => {}
        }
    }

    format
}

/// Render a descriptor for `format`.
pub fn make_descriptor(channels: u16, sample_rate: u32, bits_per_sample: u16) -> String {
    format!(
        "audio/L{};rate={};channels={}",
        bits_per_sample, sample_rate, channels
    )
}

/// Build the 44-byte header for `data_len` bytes of PCM.
///
/// Fails with `InvalidAudio` when a derived size overflows its header field.
pub fn build_wav_header(
    data_len: u32,
    format: &AudioFormat,
) -> MediaResult<[u8; WAV_HEADER_LEN]> {
    let riff_len = data_len
        .checked_add(36)
        .ok_or_else(|| MediaError::InvalidAudio("PCM payload too large for a WAV header".to_string()))?;
    let byte_rate = format.byte_rate().ok_or_else(|| {
        MediaError::InvalidAudio(format!(
            "byte rate overflows for {} Hz x {} channels x {} bits",
            format.sample_rate, format.channels, format.bits_per_sample
        ))
    })?;
    let block_align = format.block_align().ok_or_else(|| {
        MediaError::InvalidAudio(format!(
            "block align overflows for {} channels x {} bits",
            format.channels, format.bits_per_sample
        ))
    })?;

    let mut header = [0u8; WAV_HEADER_LEN];

    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&riff_len.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes());
    header[22..24].copy_from_slice(&format.channels.to_le_bytes());
    header[24..28].copy_from_slice(&format.sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&format.bits_per_sample.to_le_bytes());
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_len.to_le_bytes());

    Ok(header)
}

/// Prepend a WAV header to raw PCM.
pub fn pcm_to_wav(pcm: &[u8], format: &AudioFormat) -> MediaResult<Vec<u8>> {
    let data_len = u32::try_from(pcm.len())
        .map_err(|_| MediaError::InvalidAudio("PCM payload exceeds 4 GiB".to_string()))?;

    let header = build_wav_header(data_len, format)?;
    let mut out = Vec::with_capacity(WAV_HEADER_LEN + pcm.len());
    out.extend_from_slice(&header);
    out.extend_from_slice(pcm);
    Ok(out)
}

/// Decode a base64 PCM payload and wrap it according to `descriptor`.
pub fn decode_to_wav(data_base64: &str, descriptor: &str) -> MediaResult<Vec<u8>> {
    let pcm = base64::engine::general_purpose::STANDARD
        .decode(data_base64.trim())
        .map_err(|e| MediaError::InvalidAudio(format!("base64 decode failed: {}", e)))?;
    pcm_to_wav(&pcm, &parse_descriptor(descriptor))
}
