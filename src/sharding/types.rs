use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The one-shard-per-letter layout queried by the broad fan-out search.
pub const LEGACY_LETTERS: [char; 26] = [
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R',
    'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z',
];

/// Identifier of a shard in the composite layout.
///
/// The set is closed: every titled book maps to exactly one of these, and the members
/// together cover `A`-`Z` plus the fallback bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CompositeShard {
    A1,
    A2,
    S1,
    S2,
    T1,
    T2,
    C,
    L,
    M,
    P,
    BE,
    DJK,
    FGQX,
    HIY,
    NOUVZ,
    RW,
    Fallback,
}

impl CompositeShard {
    pub const ALL: [CompositeShard; 17] = [
        CompositeShard::A1,
        CompositeShard::A2,
        CompositeShard::S1,
        CompositeShard::S2,
        CompositeShard::T1,
        CompositeShard::T2,
        CompositeShard::C,
        CompositeShard::L,
        CompositeShard::M,
        CompositeShard::P,
        CompositeShard::BE,
        CompositeShard::DJK,
        CompositeShard::FGQX,
        CompositeShard::HIY,
        CompositeShard::NOUVZ,
        CompositeShard::RW,
        CompositeShard::Fallback,
    ];

    /// Canonical key, as stored in the `shard_key` attribute.
    pub fn as_str(&self) -> &'static str {
        match self {
            CompositeShard::A1 => "A1",
            CompositeShard::A2 => "A2",
            CompositeShard::S1 => "S1",
            CompositeShard::S2 => "S2",
            CompositeShard::T1 => "T1",
            CompositeShard::T2 => "T2",
            CompositeShard::C => "C",
            CompositeShard::L => "L",
            CompositeShard::M => "M",
            CompositeShard::P => "P",
            CompositeShard::BE => "BE",
            CompositeShard::DJK => "DJK",
            CompositeShard::FGQX => "FGQX",
            CompositeShard::HIY => "HIY",
            CompositeShard::NOUVZ => "NOUVZ",
            CompositeShard::RW => "RW",
            CompositeShard::Fallback => "0",
        }
    }

    /// True for the sub-shards of a split letter (`A1`, `S2`, ...).
    pub fn is_split(&self) -> bool {
        matches!(
            self,
            CompositeShard::A1
                | CompositeShard::A2
                | CompositeShard::S1
                | CompositeShard::S2
                | CompositeShard::T1
                | CompositeShard::T2
        )
    }
}

impl fmt::Display for CompositeShard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown shard key: {0}")]
pub struct UnknownShardKey(pub String);

impl FromStr for CompositeShard {
    type Err = UnknownShardKey;

    /// Case-insensitive; surrounding whitespace is not accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        CompositeShard::ALL
            .into_iter()
            .find(|shard| shard.as_str() == upper)
            .ok_or_else(|| UnknownShardKey(s.to_string()))
    }
}

impl TryFrom<String> for CompositeShard {
    type Error = UnknownShardKey;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CompositeShard> for String {
    fn from(shard: CompositeShard) -> Self {
        shard.as_str().to_string()
    }
}
