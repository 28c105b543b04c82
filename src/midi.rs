//! Standard MIDI File encoding
//!
//! Writes format 1 files byte for byte: an `MThd` header followed by one
//! `MTrk` chunk per track. Every event restates its status byte (no running
//! status), and every track ends with an end-of-track meta event.

use crate::config::Config;
use crate::error::{ConvertError, Result};
use crate::tracks::{MidiEvent, TimedEvent, TimedTrack};

/// Largest value a 4-byte variable-length quantity can hold
pub const MAX_VLQ: u32 = 0x0FFF_FFFF;

/// SMF format written to the header (multiple simultaneous tracks)
pub const SMF_FORMAT: u16 = 1;

/// Header chunk data length
const HEADER_LENGTH: u32 = 6;

/// Text written for a track_name event without meta_text
pub const FALLBACK_TRACK_NAME: &str = "Track";

/// Meta event types
pub mod meta {
    pub const TRACK_NAME: u8 = 0x03;
    pub const END_OF_TRACK: u8 = 0x2F;
    pub const SET_TEMPO: u8 = 0x51;
    pub const TIME_SIGNATURE: u8 = 0x58;
    pub const KEY_SIGNATURE: u8 = 0x59;
}

/// Channel voice status nibbles
pub mod status {
    pub const NOTE_OFF: u8 = 0x80;
    pub const NOTE_ON: u8 = 0x90;
    pub const CONTROL_CHANGE: u8 = 0xB0;
    pub const PROGRAM_CHANGE: u8 = 0xC0;
    pub const META: u8 = 0xFF;
}

/// 4/4, 24 MIDI clocks per click, 8 32nd-notes per quarter
const TIME_SIGNATURE_4_4: [u8; 4] = [4, 2, 24, 8];

/// No sharps or flats, major
const KEY_SIGNATURE_C_MAJOR: [u8; 2] = [0, 0];

/// Append `value` as a variable-length quantity: 7-bit groups, most
/// significant first, continuation bit set on all but the last byte.
pub fn write_vlq(out: &mut Vec<u8>, value: u32) {
    let mut groups = [0u8; 5];
    let mut len = 0;
    let mut rest = value;
    loop {
        groups[len] = (rest & 0x7F) as u8;
        len += 1;
        rest >>= 7;
        if rest == 0 {
            break;
        }
    }

    for i in (0..len).rev() {
        let continuation = if i > 0 { 0x80 } else { 0 };
        out.push(groups[i] | continuation);
    }
}

/// Encode `value` as a variable-length quantity
pub fn encode_vlq(value: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(4);
    write_vlq(&mut out, value);
    out
}

/// Decode a variable-length quantity from the start of `bytes`.
///
/// Returns the value and the number of bytes consumed, or `None` if the
/// input ends mid-quantity or runs past the 4-byte SMF limit.
pub fn read_vlq(bytes: &[u8]) -> Option<(u32, usize)> {
    let mut value = 0u32;
    for (i, &byte) in bytes.iter().take(4).enumerate() {
        value = (value << 7) | (byte & 0x7F) as u32;
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}

fn checked_vlq(value: u64, what: &str) -> Result<u32> {
    u32::try_from(value)
        .ok()
        .filter(|v| *v <= MAX_VLQ)
        .ok_or_else(|| {
            ConvertError::MidiEncodeError(format!(
                "{} {} exceeds the variable-length maximum {}",
                what, value, MAX_VLQ
            ))
        })
}

/// Append a meta event: delta, `FF`, type, VLQ length, payload
pub fn write_meta_event(out: &mut Vec<u8>, delta: u32, meta_type: u8, data: &[u8]) -> Result<()> {
    let length = checked_vlq(data.len() as u64, "meta event length")?;
    write_vlq(out, delta);
    out.push(status::META);
    out.push(meta_type);
    write_vlq(out, length);
    out.extend_from_slice(data);
    Ok(())
}

/// Append a channel message: delta, full status byte, data bytes
pub fn write_channel_message(out: &mut Vec<u8>, delta: u32, status_byte: u8, data: &[u8]) {
    write_vlq(out, delta);
    out.push(status_byte);
    out.extend_from_slice(data);
}

/// Append one timed event
pub fn write_event(out: &mut Vec<u8>, event: &TimedEvent, default_uspb: u32) -> Result<()> {
    let delta = checked_vlq(event.delta_time, "delta-time")?;

    match &event.event {
        MidiEvent::Tempo(tempo) => {
            let uspb = tempo.map(|t| t.as_int()).unwrap_or(default_uspb) & 0xFF_FFFF;
            let bytes = uspb.to_be_bytes();
            write_meta_event(out, delta, meta::SET_TEMPO, &bytes[1..])?;
        }
        MidiEvent::TrackName(text) => {
            let text = text.as_deref().unwrap_or(FALLBACK_TRACK_NAME);
            write_meta_event(out, delta, meta::TRACK_NAME, text.as_bytes())?;
        }
        MidiEvent::NoteOn { channel, key, vel } => write_channel_message(
            out,
            delta,
            status::NOTE_ON | channel.as_int(),
            &[key.as_int(), vel.as_int()],
        ),
        MidiEvent::NoteOff { channel, key, vel } => write_channel_message(
            out,
            delta,
            status::NOTE_OFF | channel.as_int(),
            &[key.as_int(), vel.as_int()],
        ),
        MidiEvent::ProgramChange { channel, program } => write_channel_message(
            out,
            delta,
            status::PROGRAM_CHANGE | channel.as_int(),
            &[program.as_int()],
        ),
        MidiEvent::ControlChange {
            channel,
            controller,
            value,
        } => write_channel_message(
            out,
            delta,
            status::CONTROL_CHANGE | channel.as_int(),
            &[controller.as_int(), value.as_int()],
        ),
        MidiEvent::TimeSignature => {
            write_meta_event(out, delta, meta::TIME_SIGNATURE, &TIME_SIGNATURE_4_4)?
        }
        MidiEvent::KeySignature => {
            write_meta_event(out, delta, meta::KEY_SIGNATURE, &KEY_SIGNATURE_C_MAJOR)?
        }
    }

    Ok(())
}

/// Append the `MThd` chunk
pub fn write_header(out: &mut Vec<u8>, track_count: usize, ppq: u16) -> Result<()> {
    let track_count = u16::try_from(track_count).map_err(|_| {
        ConvertError::MidiEncodeError(format!(
            "{} tracks exceed the SMF limit of {}",
            track_count,
            u16::MAX
        ))
    })?;

    out.extend_from_slice(b"MThd");
    out.extend_from_slice(&HEADER_LENGTH.to_be_bytes());
    out.extend_from_slice(&SMF_FORMAT.to_be_bytes());
    out.extend_from_slice(&track_count.to_be_bytes());
    out.extend_from_slice(&ppq.to_be_bytes());
    Ok(())
}

/// Append one `MTrk` chunk, end-of-track included
pub fn write_track_chunk(out: &mut Vec<u8>, track: &TimedTrack, default_uspb: u32) -> Result<()> {
    let mut data = Vec::new();
    for event in &track.events {
        write_event(&mut data, event, default_uspb)?;
    }
    write_meta_event(&mut data, 0, meta::END_OF_TRACK, &[])?;

    let length = u32::try_from(data.len()).map_err(|_| {
        ConvertError::MidiEncodeError(format!(
            "track {} is {} bytes, too long for a chunk",
            track.index,
            data.len()
        ))
    })?;

    out.extend_from_slice(b"MTrk");
    out.extend_from_slice(&length.to_be_bytes());
    out.extend_from_slice(&data);
    Ok(())
}

/// Encode the complete file: header, then each track in the given order
pub fn write_smf(tracks: &[TimedTrack], config: &Config, default_uspb: u32) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    write_header(&mut out, tracks.len(), config.ppq)?;
    for track in tracks {
        write_track_chunk(&mut out, track, default_uspb)?;
    }

    tracing::debug!(
        tracks = tracks.len(),
        bytes = out.len(),
        ppq = config.ppq,
        "encoded standard midi file"
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use midly::num::{u24, u4, u7};

    fn timed(delta_time: u64, event: MidiEvent) -> TimedEvent {
        TimedEvent {
            tick: delta_time,
            delta_time,
            event,
        }
    }

    #[test]
    fn test_vlq_known_encodings() {
        assert_eq!(encode_vlq(0), vec![0x00]);
        assert_eq!(encode_vlq(0x7F), vec![0x7F]);
        assert_eq!(encode_vlq(0x80), vec![0x81, 0x00]);
        assert_eq!(encode_vlq(0x2000), vec![0xC0, 0x00]);
        assert_eq!(encode_vlq(0x3FFF), vec![0xFF, 0x7F]);
        assert_eq!(encode_vlq(0x4000), vec![0x81, 0x80, 0x00]);
        assert_eq!(encode_vlq(MAX_VLQ), vec![0xFF, 0xFF, 0xFF, 0x7F]);
    }

    #[test]
    fn test_read_vlq_rejects_truncated_input() {
        assert_eq!(read_vlq(&[0x81]), None);
        assert_eq!(read_vlq(&[0x80, 0x80, 0x80, 0x80, 0x00]), None);
        assert_eq!(read_vlq(&[0x81, 0x00, 0x55]), Some((128, 2)));
    }

    #[test]
    fn test_tempo_payload_is_24_bit_big_endian() {
        let mut out = Vec::new();
        let event = timed(0, MidiEvent::Tempo(Some(u24::from(500_000))));
        write_event(&mut out, &event, 1).unwrap();
        assert_eq!(out, vec![0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20]);
    }

    #[test]
    fn test_tempo_without_value_uses_default() {
        let mut out = Vec::new();
        write_event(&mut out, &timed(0, MidiEvent::Tempo(None)), 1_000_000).unwrap();
        assert_eq!(out, vec![0x00, 0xFF, 0x51, 0x03, 0x0F, 0x42, 0x40]);
    }

    #[test]
    fn test_track_name_fallback() {
        let mut out = Vec::new();
        write_event(&mut out, &timed(0, MidiEvent::TrackName(None)), 500_000).unwrap();
        assert_eq!(out, b"\x00\xFF\x03\x05Track".to_vec());
    }

    #[test]
    fn test_channel_messages_restate_status() {
        let mut out = Vec::new();
        let on = MidiEvent::NoteOn {
            channel: u4::from(9),
            key: u7::from(36),
            vel: u7::from(100),
        };
        write_event(&mut out, &timed(0, on.clone()), 500_000).unwrap();
        write_event(&mut out, &timed(0, on), 500_000).unwrap();
        let program = MidiEvent::ProgramChange {
            channel: u4::from(2),
            program: u7::from(40),
        };
        write_event(&mut out, &timed(200, program), 500_000).unwrap();
        assert_eq!(
            out,
            vec![0x00, 0x99, 36, 100, 0x00, 0x99, 36, 100, 0x81, 0x48, 0xC2, 40]
        );
    }

    #[test]
    fn test_fixed_signature_payloads() {
        let mut out = Vec::new();
        write_event(&mut out, &timed(0, MidiEvent::TimeSignature), 500_000).unwrap();
        write_event(&mut out, &timed(0, MidiEvent::KeySignature), 500_000).unwrap();
        assert_eq!(
            out,
            vec![0x00, 0xFF, 0x58, 0x04, 4, 2, 24, 8, 0x00, 0xFF, 0x59, 0x02, 0, 0]
        );
    }

    #[test]
    fn test_empty_track_chunk_holds_only_end_of_track() {
        let track = TimedTrack {
            index: 0,
            name: None,
            events: vec![],
        };
        let mut out = Vec::new();
        write_track_chunk(&mut out, &track, 500_000).unwrap();
        assert_eq!(out, b"MTrk\x00\x00\x00\x04\x00\xFF\x2F\x00".to_vec());
    }

    #[test]
    fn test_delta_beyond_vlq_range_is_an_error() {
        let mut out = Vec::new();
        let event = timed(MAX_VLQ as u64 + 1, MidiEvent::KeySignature);
        assert!(matches!(
            write_event(&mut out, &event, 500_000),
            Err(ConvertError::MidiEncodeError(_))
        ));
    }

    #[test]
    fn test_header_layout() {
        let mut out = Vec::new();
        write_header(&mut out, 2, 960).unwrap();
        assert_eq!(
            out,
            vec![b'M', b'T', b'h', b'd', 0, 0, 0, 6, 0, 1, 0, 2, 0x03, 0xC0]
        );
    }
}
