// src/audio/metadata.rs
//! Track metadata extraction using Lofty.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::Accessor;

/// Tags and properties needed for display and transport.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    /// Length reported by the container, if any.
    pub duration: Option<Duration>,
    pub sample_rate: Option<u32>,
    /// Raw image bytes (PNG/JPEG) of the first embedded picture.
    pub artwork: Option<Vec<u8>>,
}

/// Probe `path` without decoding audio. Safe to call from any thread.
pub fn load_metadata(path: &Path) -> Result<TrackMetadata> {
    let tagged_file = Probe::open(path)?.read()?;

    let tag = tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag());

    let title = tag.and_then(|t| t.title()).map(|s| s.into_owned());
    let artist = tag.and_then(|t| t.artist()).map(|s| s.into_owned());
    let artwork = tag.and_then(|t| t.pictures().first().map(|pic| pic.data().to_vec()));

    let props = tagged_file.properties();
    let duration = Some(props.duration()).filter(|d| !d.is_zero());

    Ok(TrackMetadata {
        title,
        artist,
        duration,
        sample_rate: props.sample_rate(),
        artwork,
    })
}

/// Container-reported length, used when the decoder cannot tell.
pub fn probe_duration(path: &Path) -> Option<Duration> {
    load_metadata(path).ok().and_then(|m| m.duration)
}
