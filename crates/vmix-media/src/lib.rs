#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper and media helpers for variation stitching.
//!
//! This crate provides:
//! - Type-safe multi-input FFmpeg command building
//! - The two composition stages (silent visual concat, narration mux)
//! - PCM → WAV container construction from provider audio descriptors
//! - Unique clip-ordering generation
//! - Streaming HTTP download of generated clips

pub mod command;
pub mod compose;
pub mod download;
pub mod error;
pub mod fs_utils;
pub mod ordering;
pub mod wav;

pub use command::{check_ffmpeg, FfmpegCommand, FfmpegRunner};
pub use compose::{build_concat_command, build_mux_command, FfmpegComposer, MediaComposer};
pub use download::{ClipDownloader, HttpDownloader};
pub use error::{MediaError, MediaResult};
pub use fs_utils::remove_if_exists;
pub use ordering::{unique_orderings, ATTEMPT_MULTIPLIER};
pub use wav::{
    build_wav_header, decode_to_wav, make_descriptor, parse_descriptor, pcm_to_wav, AudioFormat,
    WAV_HEADER_LEN,
};
