//! Version-1 (time-based) UUIDs for time-ordered column keys.
//!
//! Index records append under generated column keys that must sort in
//! issuance order. The generator here guarantees strictly increasing
//! timestamps per process: when the clock has not advanced since the last
//! issue (or went backwards), the previous tick plus one is used instead.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

/// 100ns intervals between the Gregorian epoch (1582-10-15) and the Unix epoch.
pub const GREGORIAN_UNIX_OFFSET: u64 = 0x01B2_1DD2_1381_4000;

/// Issues version-1 UUIDs with strictly increasing timestamps.
#[derive(Debug)]
pub struct TimeUuidGenerator {
    last_ticks: Mutex<u64>,
    clock_seq: u16,
    node: [u8; 6],
}

impl TimeUuidGenerator {
    /// Create a generator with a random node id and clock sequence.
    pub fn new() -> Self {
        let mut node: [u8; 6] = rand::random();
        // Multicast bit marks a node id that is not a real MAC address.
        node[0] |= 0x01;
        Self {
            last_ticks: Mutex::new(0),
            clock_seq: rand::random::<u16>() & 0x3FFF,
            node,
        }
    }

    /// Issue the next UUID.
    pub fn next(&self) -> Uuid {
        let now = ticks_now();
        let ticks = {
            let mut last = self.last_ticks.lock();
            let ticks = if now > *last { now } else { *last + 1 };
            *last = ticks;
            ticks
        };
        build(ticks, self.clock_seq, self.node)
    }
}

impl Default for TimeUuidGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Issue a UUID from the process-wide generator.
pub fn next_time_uuid() -> Uuid {
    static GENERATOR: OnceLock<TimeUuidGenerator> = OnceLock::new();
    GENERATOR.get_or_init(TimeUuidGenerator::new).next()
}

fn ticks_now() -> u64 {
    let micros = Utc::now().timestamp_micros().max(0) as u64;
    micros * 10 + GREGORIAN_UNIX_OFFSET
}

fn build(ticks: u64, clock_seq: u16, node: [u8; 6]) -> Uuid {
    let time_low = (ticks & 0xFFFF_FFFF) as u32;
    let time_mid = ((ticks >> 32) & 0xFFFF) as u16;
    let time_hi_and_version = ((ticks >> 48) & 0x0FFF) as u16 | (1 << 12);

    let mut tail = [0u8; 8];
    tail[0] = ((clock_seq >> 8) as u8 & 0x3F) | 0x80;
    tail[1] = clock_seq as u8;
    tail[2..].copy_from_slice(&node);

    Uuid::from_fields(time_low, time_mid, time_hi_and_version, &tail)
}

/// Extract the 60-bit timestamp (100ns ticks since 1582-10-15).
///
/// `bytes` must hold at least 8 bytes; shorter input yields 0.
pub fn timestamp_ticks(bytes: &[u8]) -> u64 {
    if bytes.len() < 8 {
        return 0;
    }
    let time_low = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as u64;
    let time_mid = u16::from_be_bytes([bytes[4], bytes[5]]) as u64;
    let time_hi = (u16::from_be_bytes([bytes[6], bytes[7]]) & 0x0FFF) as u64;
    (time_hi << 48) | (time_mid << 32) | time_low
}

/// Wall-clock time embedded in a time UUID, at microsecond precision.
pub fn to_datetime(bytes: &[u8]) -> Option<DateTime<Utc>> {
    let ticks = timestamp_ticks(bytes).checked_sub(GREGORIAN_UNIX_OFFSET)?;
    let micros = (ticks / 10) as i64;
    DateTime::from_timestamp(micros.div_euclid(1_000_000), (micros.rem_euclid(1_000_000) * 1_000) as u32)
}
