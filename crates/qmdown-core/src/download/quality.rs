//! Encoding quality tiers.
//!
//! A [`QualityTier`] is an opaque, ranked encoding option for the same
//! logical song. Rank is positional: callers hand the resolver an ordered
//! list, highest priority first, and the resolver never reorders it.
//!
//! [`SongFileType`] is the built-in catalog of encodings the music service
//! offers, used by the CLI to build a tier list from a maximum quality.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// An encoding option: a stable identifier plus a file extension hint.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualityTier {
    /// Stable identifier passed to the URL lookup (e.g. `F000`).
    pub id: String,
    /// Human-readable name used in logs (e.g. `flac`).
    pub name: String,
    /// File extension including the leading dot (e.g. `.flac`).
    pub extension: String,
}

impl QualityTier {
    /// Create a tier. A missing leading dot on `extension` is added.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        let extension = extension.into();
        let extension = if extension.is_empty() || extension.starts_with('.') {
            extension
        } else {
            format!(".{extension}")
        };
        Self {
            id: id.into(),
            name: name.into(),
            extension,
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Song encodings offered by the music service, highest quality first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SongFileType {
    /// Hi-res master.
    Master,
    /// Dolby Atmos, stereo downmix.
    Atmos2,
    /// Dolby Atmos 5.1.
    Atmos51,
    /// Lossless FLAC.
    Flac,
    /// Ogg Vorbis 640 kbps.
    Ogg640,
    /// Ogg Vorbis 320 kbps.
    Ogg320,
    /// MP3 320 kbps.
    Mp3_320,
    /// Ogg Vorbis 192 kbps.
    Ogg192,
    /// MP3 128 kbps.
    Mp3_128,
    /// Ogg Vorbis 96 kbps.
    Ogg96,
    /// AAC 192 kbps.
    Acc192,
    /// AAC 96 kbps.
    Acc96,
    /// AAC 48 kbps.
    Acc48,
}

impl SongFileType {
    /// Every file type in rank order.
    pub const ALL: [Self; 13] = [
        Self::Master,
        Self::Atmos2,
        Self::Atmos51,
        Self::Flac,
        Self::Ogg640,
        Self::Ogg320,
        Self::Mp3_320,
        Self::Ogg192,
        Self::Mp3_128,
        Self::Ogg96,
        Self::Acc192,
        Self::Acc96,
        Self::Acc48,
    ];

    /// Service-side identifier prefix.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Master => "AI00",
            Self::Atmos2 => "Q000",
            Self::Atmos51 => "Q001",
            Self::Flac => "F000",
            Self::Ogg640 => "O801",
            Self::Ogg320 => "O800",
            Self::Mp3_320 => "M800",
            Self::Ogg192 => "O600",
            Self::Mp3_128 => "M500",
            Self::Ogg96 => "O400",
            Self::Acc192 => "C600",
            Self::Acc96 => "C400",
            Self::Acc48 => "C200",
        }
    }

    /// File extension for downloaded files of this type.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Master | Self::Atmos2 | Self::Atmos51 | Self::Flac => ".flac",
            Self::Ogg640 | Self::Ogg320 | Self::Ogg192 | Self::Ogg96 => ".ogg",
            Self::Mp3_320 | Self::Mp3_128 => ".mp3",
            Self::Acc192 | Self::Acc96 | Self::Acc48 => ".m4a",
        }
    }

    /// Lowercase name, as accepted by [`FromStr`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Master => "master",
            Self::Atmos2 => "atmos_2",
            Self::Atmos51 => "atmos_51",
            Self::Flac => "flac",
            Self::Ogg640 => "ogg_640",
            Self::Ogg320 => "ogg_320",
            Self::Mp3_320 => "mp3_320",
            Self::Ogg192 => "ogg_192",
            Self::Mp3_128 => "mp3_128",
            Self::Ogg96 => "ogg_96",
            Self::Acc192 => "acc_192",
            Self::Acc96 => "acc_96",
            Self::Acc48 => "acc_48",
        }
    }

    /// Convert to a resolver tier.
    #[must_use]
    pub fn tier(self) -> QualityTier {
        QualityTier::new(self.code(), self.as_str(), self.extension())
    }

    /// Ranked tier list starting at `max` and walking down to the lowest quality.
    #[must_use]
    pub fn priority_from(max: Self) -> Vec<QualityTier> {
        Self::ALL
            .iter()
            .copied()
            .filter(|file_type| *file_type >= max)
            .map(Self::tier)
            .collect()
    }
}

impl fmt::Display for SongFileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown file type name.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("Unknown quality '{0}'")]
pub struct UnknownFileType(pub String);

impl FromStr for SongFileType {
    type Err = UnknownFileType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|file_type| {
                file_type.as_str() == normalized
                    || file_type.code().eq_ignore_ascii_case(&normalized)
            })
            .ok_or_else(|| UnknownFileType(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_adds_leading_dot() {
        let tier = QualityTier::new("M800", "mp3_320", "mp3");
        assert_eq!(tier.extension, ".mp3");

        let tier = QualityTier::new("F000", "flac", ".flac");
        assert_eq!(tier.extension, ".flac");
    }

    #[test]
    fn test_priority_from_flac_walks_down() {
        let tiers = SongFileType::priority_from(SongFileType::Flac);
        let names: Vec<_> = tiers.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names.first(), Some(&"flac"));
        assert_eq!(names.last(), Some(&"acc_48"));
        assert!(!names.contains(&"master"));
        assert_eq!(tiers.len(), 10);
    }

    #[test]
    fn test_priority_from_lowest_is_single_tier() {
        let tiers = SongFileType::priority_from(SongFileType::Acc48);
        assert_eq!(tiers, vec![SongFileType::Acc48.tier()]);
    }

    #[test]
    fn test_parse_names_and_codes() {
        assert_eq!("FLAC".parse::<SongFileType>(), Ok(SongFileType::Flac));
        assert_eq!("mp3-320".parse::<SongFileType>(), Ok(SongFileType::Mp3_320));
        assert_eq!("m500".parse::<SongFileType>(), Ok(SongFileType::Mp3_128));
        assert!("wav".parse::<SongFileType>().is_err());
    }

    #[test]
    fn test_catalog_is_rank_ordered() {
        let mut sorted = SongFileType::ALL;
        sorted.sort();
        assert_eq!(sorted, SongFileType::ALL);
    }
}
