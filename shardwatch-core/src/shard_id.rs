//! Guild to shard mapping.
//!
//! A gateway routes a guild to shard `(guild_id >> 22) % shards_total`.
//! Guild ids are decimal strings that routinely exceed 53 bits and may
//! exceed 64, so the computation never goes through floating point.
//!
//! Shifting right by 22 is floor division by `2^22`, and
//! `floor(x / 2^22) mod n == floor((x mod (n * 2^22)) / 2^22)`. Folding the
//! digits into a running remainder modulo `n * 2^22` therefore gives the
//! exact answer for identifiers of any length while the accumulator stays
//! below `10 * 2^54`.

use crate::{Error, Result};

/// Bits of a snowflake below the timestamp.
const SNOWFLAKE_SHIFT: u32 = 22;

/// Sentinel rendered for an empty guild id.
pub const UNSHARDED: i64 = -1;

/// Resolve the shard that owns `guild_id`.
///
/// Returns `Ok(None)` only for the empty string. Fails with
/// [`Error::ZeroShards`] when `shards_total` is zero and
/// [`Error::InvalidGuildId`] on any non-digit input, whitespace included.
///
/// ```
/// use shardwatch_core::resolve_shard;
///
/// assert_eq!(resolve_shard("18446744073709551616", 16).unwrap(), Some(0));
/// assert_eq!(resolve_shard("", 16).unwrap(), None);
/// ```
pub fn resolve_shard(guild_id: &str, shards_total: u32) -> Result<Option<u32>> {
    if shards_total == 0 {
        return Err(Error::ZeroShards);
    }
    if guild_id.is_empty() {
        return Ok(None);
    }

    let modulus = u128::from(shards_total) << SNOWFLAKE_SHIFT;
    let mut rem: u128 = 0;
    for b in guild_id.bytes() {
        if !b.is_ascii_digit() {
            return Err(Error::InvalidGuildId(guild_id.to_string()));
        }
        rem = (rem * 10 + u128::from(b - b'0')) % modulus;
    }

    // rem < shards_total * 2^22, so the shifted value fits in u32.
    Ok(Some((rem >> SNOWFLAKE_SHIFT) as u32))
}

/// Like [`resolve_shard`], rendering the empty id as [`UNSHARDED`].
pub fn shard_index(guild_id: &str, shards_total: u32) -> Result<i64> {
    Ok(resolve_shard(guild_id, shards_total)?.map_or(UNSHARDED, i64::from))
}
