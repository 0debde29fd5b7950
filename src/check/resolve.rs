//! Stream index resolution: abstract language requests to concrete
//! audio-stream indices.

use std::collections::BTreeSet;

use crate::domain::ProbeSnapshot;
use crate::lang;

/// What to do when no stream matches any requested language.
///
/// The policy is an explicit parameter: callers state their intent rather
/// than the resolver inferring it from the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackPolicy {
    /// Narrow intent (profile-scoped): fall back to the first audio stream.
    FirstStream,
    /// Broad intent (consistency checking): fall back to all audio streams.
    AllStreams,
}

/// Outcome of stream resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub streams: BTreeSet<usize>,
    pub used_fallback: bool,
}

/// Resolve requested languages to absolute audio-stream indices.
///
/// An empty match never returns silently: one of the two fallback
/// policies always applies. The result is only empty when the file has no
/// audio streams at all.
pub fn resolve_audio_streams(
    probe: &ProbeSnapshot,
    requested_languages: &[String],
    policy: FallbackPolicy,
) -> Resolution {
    let mut streams = BTreeSet::new();
    for requested in requested_languages {
        for track in &probe.audio_tracks {
            if let Some(track_lang) = &track.language {
                if lang::matches(track_lang, requested) {
                    streams.insert(track.stream_index);
                }
            }
        }
    }

    if !streams.is_empty() {
        return Resolution {
            streams,
            used_fallback: false,
        };
    }

    let fallback: BTreeSet<usize> = match policy {
        FallbackPolicy::FirstStream => probe
            .audio_tracks
            .first()
            .map(|t| t.stream_index)
            .into_iter()
            .collect(),
        FallbackPolicy::AllStreams => probe.audio_tracks.iter().map(|t| t.stream_index).collect(),
    };

    Resolution {
        streams: fallback,
        used_fallback: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AudioTrack;

    fn probe_with_langs(langs: &[Option<&str>]) -> ProbeSnapshot {
        ProbeSnapshot {
            container: "matroska".to_string(),
            duration: Some(1400.0),
            video_tracks: Vec::new(),
            audio_tracks: langs
                .iter()
                .enumerate()
                .map(|(i, lang)| AudioTrack {
                    stream_index: i + 1,
                    codec: "aac".to_string(),
                    language: lang.map(str::to_string),
                    duration: None,
                    channels: Some(2),
                })
                .collect(),
        }
    }

    #[test]
    fn matching_languages_resolve_directly() {
        let probe = probe_with_langs(&[Some("jpn"), Some("eng")]);
        let res = resolve_audio_streams(&probe, &["ja".to_string()], FallbackPolicy::FirstStream);
        assert_eq!(res.streams, BTreeSet::from([1]));
        assert!(!res.used_fallback);
    }

    #[test]
    fn narrow_fallback_picks_first_stream() {
        let probe = probe_with_langs(&[Some("eng"), Some("ger")]);
        let res = resolve_audio_streams(&probe, &["ja".to_string()], FallbackPolicy::FirstStream);
        assert_eq!(res.streams, BTreeSet::from([1]));
        assert!(res.used_fallback);
    }

    #[test]
    fn broad_fallback_picks_all_streams() {
        let probe = probe_with_langs(&[Some("eng"), None, Some("ger")]);
        let res = resolve_audio_streams(&probe, &["ja".to_string()], FallbackPolicy::AllStreams);
        assert_eq!(res.streams, BTreeSet::from([1, 2, 3]));
        assert!(res.used_fallback);
    }

    #[test]
    fn no_audio_streams_yields_empty_fallback() {
        let probe = probe_with_langs(&[]);
        let res = resolve_audio_streams(&probe, &["ja".to_string()], FallbackPolicy::AllStreams);
        assert!(res.streams.is_empty());
        assert!(res.used_fallback);
    }

    #[test]
    fn multiple_requests_union_their_matches() {
        let probe = probe_with_langs(&[Some("jpn"), Some("eng"), Some("ger")]);
        let res = resolve_audio_streams(
            &probe,
            &["ja".to_string(), "de".to_string()],
            FallbackPolicy::FirstStream,
        );
        assert_eq!(res.streams, BTreeSet::from([1, 3]));
        assert!(!res.used_fallback);
    }
}
