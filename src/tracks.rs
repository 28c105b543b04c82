//! Track assembly: typed events, grouping by track, delta-times

use crate::rows::{EventRow, EventType};
use midly::num::{u24, u4, u7};
use std::collections::BTreeMap;

/// A MIDI event carrying only the fields its kind uses.
///
/// Channel and data bytes are bounded integers; out-of-range row values are
/// masked to their bit width when the event is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn { channel: u4, key: u7, vel: u7 },
    NoteOff { channel: u4, key: u7, vel: u7 },
    ProgramChange { channel: u4, program: u7 },
    ControlChange { channel: u4, controller: u7, value: u7 },
    /// Microseconds per beat; `None` writes the file's default tempo
    Tempo(Option<u24>),
    /// Track name text; `None` writes the fallback name
    TrackName(Option<String>),
    /// Always written as 4/4
    TimeSignature,
    /// Always written as C major
    KeySignature,
}

impl MidiEvent {
    /// Build the typed event for a row.
    ///
    /// Returns `None` for an unknown type or when a field the type requires
    /// is missing. A missing channel means channel 0.
    pub fn from_row(row: &EventRow) -> Option<Self> {
        let channel = u4::from((row.channel.unwrap_or(0) & 0x0F) as u8);

        let event = match row.kind()? {
            EventType::NoteOn => MidiEvent::NoteOn {
                channel,
                key: data_byte(row.note?),
                vel: data_byte(row.velocity?),
            },
            EventType::NoteOff => MidiEvent::NoteOff {
                channel,
                key: data_byte(row.note?),
                vel: data_byte(row.velocity?),
            },
            EventType::ProgramChange => MidiEvent::ProgramChange {
                channel,
                program: data_byte(row.program?),
            },
            EventType::ControlChange => MidiEvent::ControlChange {
                channel,
                controller: data_byte(row.controller?),
                value: data_byte(row.value?),
            },
            EventType::SetTempo => {
                MidiEvent::Tempo(row.tempo.map(|t| u24::from((t & 0xFF_FFFF) as u32)))
            }
            EventType::TrackName => MidiEvent::TrackName(row.meta_text.clone()),
            EventType::TimeSignature => MidiEvent::TimeSignature,
            EventType::KeySignature => MidiEvent::KeySignature,
        };

        Some(event)
    }
}

fn data_byte(value: i64) -> u7 {
    u7::from((value & 0x7F) as u8)
}

/// An event placed on the absolute tick timeline
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEvent {
    /// Track grouping key
    pub track: u64,
    /// Absolute tick
    pub tick: u64,
    /// Position in the input, used as the sort tie-breaker
    pub order: usize,
    pub event: MidiEvent,
}

/// Events sharing one track index, sorted by tick
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub index: u64,
    /// Text of the first track_name event in input order
    pub name: Option<String>,
    pub events: Vec<NormalizedEvent>,
}

/// A normalized event with its distance from the previous event on the track
#[derive(Debug, Clone, PartialEq)]
pub struct TimedEvent {
    pub tick: u64,
    pub delta_time: u64,
    pub event: MidiEvent,
}

/// A track ready for encoding
#[derive(Debug, Clone, PartialEq)]
pub struct TimedTrack {
    pub index: u64,
    pub name: Option<String>,
    pub events: Vec<TimedEvent>,
}

/// Partition events by track and sort each track by tick.
///
/// Tracks come out in ascending index order. Events with equal ticks keep
/// their input order. The track name is taken before sorting, so a
/// track_name row listed first wins even if a later row has an earlier time.
pub fn group_events_by_track(events: Vec<NormalizedEvent>) -> Vec<Track> {
    let mut by_track: BTreeMap<u64, Vec<NormalizedEvent>> = BTreeMap::new();
    for event in events {
        by_track.entry(event.track).or_default().push(event);
    }

    by_track
        .into_iter()
        .map(|(index, mut events)| {
            events.sort_by_key(|e| e.order);
            let name = events
                .iter()
                .find_map(|e| match &e.event {
                    MidiEvent::TrackName(text) => Some(text.clone()),
                    _ => None,
                })
                .flatten();
            events.sort_by_key(|e| e.tick);
            Track {
                index,
                name,
                events,
            }
        })
        .collect()
}

/// Convert absolute ticks to per-track delta-times.
///
/// The first event's delta is measured from tick 0.
pub fn absolute_to_delta_times(tracks: Vec<Track>) -> Vec<TimedTrack> {
    tracks
        .into_iter()
        .map(|track| {
            let mut last_tick = 0u64;
            let events = track
                .events
                .into_iter()
                .map(|event| {
                    let delta_time = event.tick.saturating_sub(last_tick);
                    last_tick = event.tick;
                    TimedEvent {
                        tick: event.tick,
                        delta_time,
                        event: event.event,
                    }
                })
                .collect();

            TimedTrack {
                index: track.index,
                name: track.name,
                events,
            }
        })
        .collect()
}
