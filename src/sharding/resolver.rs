use super::types::CompositeShard;

/// Shard -> leading letters. Built once, never mutated, read from every query path.
static SHARD_LETTERS: [(CompositeShard, &[char]); 17] = [
    (CompositeShard::A1, &['A']),
    (CompositeShard::A2, &['A']),
    (CompositeShard::S1, &['S']),
    (CompositeShard::S2, &['S']),
    (CompositeShard::T1, &['T']),
    (CompositeShard::T2, &['T']),
    (CompositeShard::C, &['C']),
    (CompositeShard::L, &['L']),
    (CompositeShard::M, &['M']),
    (CompositeShard::P, &['P']),
    (CompositeShard::BE, &['B', 'E']),
    (CompositeShard::DJK, &['D', 'J', 'K']),
    (CompositeShard::FGQX, &['F', 'G', 'Q', 'X']),
    (CompositeShard::HIY, &['H', 'I', 'Y']),
    (CompositeShard::NOUVZ, &['N', 'O', 'U', 'V', 'Z']),
    (CompositeShard::RW, &['R', 'W']),
    (CompositeShard::Fallback, &[]),
];

/// Resolves the composite shard a book belongs to.
///
/// Only the first character of the title is inspected (ASCII upper-cased). Split letters
/// pick their sub-shard with `1 + stable_hash(book_id) % 2`, so a book keeps its shard across
/// restarts and ingestion runs. Anything outside `A`-`Z`, including an empty title, falls
/// back to shard `0`.
pub fn resolve_shard(book_id: &str, title: &str) -> CompositeShard {
    let Some(letter) = leading_letter(title) else {
        return CompositeShard::Fallback;
    };

    let second_half = stable_hash(book_id) % 2 == 1;
    match letter {
        'A' if second_half => CompositeShard::A2,
        'A' => CompositeShard::A1,
        'S' if second_half => CompositeShard::S2,
        'S' => CompositeShard::S1,
        'T' if second_half => CompositeShard::T2,
        'T' => CompositeShard::T1,
        'C' => CompositeShard::C,
        'L' => CompositeShard::L,
        'M' => CompositeShard::M,
        'P' => CompositeShard::P,
        'B' | 'E' => CompositeShard::BE,
        'D' | 'J' | 'K' => CompositeShard::DJK,
        'F' | 'G' | 'Q' | 'X' => CompositeShard::FGQX,
        'H' | 'I' | 'Y' => CompositeShard::HIY,
        'N' | 'O' | 'U' | 'V' | 'Z' => CompositeShard::NOUVZ,
        'R' | 'W' => CompositeShard::RW,
        _ => CompositeShard::Fallback,
    }
}

/// Upper-cased first character of the title when it is an ASCII letter.
pub fn leading_letter(title: &str) -> Option<char> {
    title
        .chars()
        .next()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase())
}

/// Letters stored in `shard`. Empty for the fallback shard.
pub fn letters_for(shard: CompositeShard) -> &'static [char] {
    SHARD_LETTERS
        .iter()
        .find(|(candidate, _)| *candidate == shard)
        .map(|(_, letters)| *letters)
        .unwrap_or(&[])
}

/// Composite shards that may hold titles starting with `letter` (case-insensitive).
///
/// Split letters return both halves; non-letters return the fallback shard.
pub fn shards_for_letter(letter: char) -> Vec<CompositeShard> {
    if !letter.is_ascii_alphabetic() {
        return vec![CompositeShard::Fallback];
    }
    let letter = letter.to_ascii_uppercase();
    SHARD_LETTERS
        .iter()
        .filter(|(_, letters)| letters.contains(&letter))
        .map(|(shard, _)| *shard)
        .collect()
}

/// 64-bit FNV-1a over the UTF-8 bytes of `key`.
///
/// Must stay byte-for-byte stable: external writers split hot letters with it.
pub fn stable_hash(key: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &byte in key.as_bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}
