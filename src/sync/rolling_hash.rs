//! Rolling checksum for the delta scanner
//!
//! Uses an Adler-32 style rolling checksum as the weak hash for block
//! matching, similar to rsync's rolling checksum algorithm. The scanner
//! seeds a window once and then slides it one byte at a time in O(1).

/// Adler-32 style rolling checksum over a window of bytes.
///
/// This is a fast, weak checksum used for initial block matching. When a
/// potential match is found, a strong hash (BLAKE3) confirms it.
///
/// The algorithm maintains two sums:
/// - `a`: sum of all bytes + 1
/// - `b`: weighted sum
///
/// Both are computed modulo 65521 (largest prime < 2^16).
///
/// The checksum starts out *empty*. [`update`](Self::update) seeds it from a
/// full window; [`rotate`](Self::rotate) slides a seeded window forward by
/// one byte; [`clear`](Self::clear) returns to the empty state so the next
/// window is seeded from scratch.
#[derive(Debug, Clone)]
pub struct RollingChecksum {
    a: u32,
    b: u32,
    window_len: u64,
}

const MOD_ADLER: u32 = 65521;

impl RollingChecksum {
    /// Create an empty checksum.
    pub fn new() -> Self {
        Self {
            a: 1,
            b: 0,
            window_len: 0,
        }
    }

    /// Seed the checksum from a full window, recomputing both sums from
    /// scratch. Any previous state is discarded.
    pub fn update(&mut self, data: &[u8]) {
        self.a = 1;
        self.b = 0;
        for &byte in data {
            self.a = (self.a + byte as u32) % MOD_ADLER;
            self.b = (self.b + self.a) % MOD_ADLER;
        }
        self.window_len = data.len() as u64;
    }

    /// Slide the window forward by one byte, removing `old_byte` from the
    /// head and appending `new_byte` at the tail, in O(1).
    ///
    /// Requires a seeded (non-empty) state; the window length is the one
    /// recorded by the seeding `update`.
    ///
    /// For a window of `n` bytes the update is (from rsync/librsync):
    /// - `a_new = a_old - old + new`
    /// - `b_new = b_old - n*old + a_new - 1`
    pub fn rotate(&mut self, old_byte: u8, new_byte: u8) {
        debug_assert!(!self.is_empty(), "rotate on an unseeded checksum");

        let old = old_byte as u32;
        let new = new_byte as u32;

        self.a = (self.a + MOD_ADLER - old + new) % MOD_ADLER;

        // n*old can exceed u32 for very large windows, so subtract in u64.
        let subtract = ((self.window_len * old as u64 + 1) % MOD_ADLER as u64) as u32;
        self.b = (self.b + MOD_ADLER + self.a - subtract) % MOD_ADLER;
    }

    /// Combined 32-bit digest of the current window.
    pub fn digest(&self) -> u32 {
        (self.b << 16) | self.a
    }

    /// Return to the empty state; the next `update` re-seeds.
    pub fn clear(&mut self) {
        self.a = 1;
        self.b = 0;
        self.window_len = 0;
    }

    /// Whether the checksum is unseeded.
    pub fn is_empty(&self) -> bool {
        self.window_len == 0
    }

    /// One-shot checksum of a block, without rolling state.
    pub fn checksum(data: &[u8]) -> u32 {
        let mut a: u32 = 1;
        let mut b: u32 = 0;

        for &byte in data {
            a = (a + byte as u32) % MOD_ADLER;
            b = (b + a) % MOD_ADLER;
        }

        (b << 16) | a
    }
}

impl Default for RollingChecksum {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_matches_oneshot() {
        let data = b"Hello, World!";
        let checksum = RollingChecksum::checksum(data);

        let mut rolling = RollingChecksum::new();
        rolling.update(data);

        assert_eq!(rolling.digest(), checksum);
    }

    #[test]
    fn test_rotate_matches_oneshot() {
        let data = b"ABCDEFGHIJ";
        let block_size = 4;

        // Compute checksums for all windows using full computation
        let mut expected = Vec::new();
        for i in 0..=data.len() - block_size {
            expected.push(RollingChecksum::checksum(&data[i..i + block_size]));
        }

        // Verify rolling computation matches
        let mut rolling = RollingChecksum::new();
        rolling.update(&data[0..block_size]);
        assert_eq!(rolling.digest(), expected[0], "Initial window mismatch");

        for i in 1..expected.len() {
            let old_byte = data[i - 1];
            let new_byte = data[i + block_size - 1];
            rolling.rotate(old_byte, new_byte);

            assert_eq!(
                rolling.digest(),
                expected[i],
                "Mismatch at position {}: got {}, expected {}",
                i,
                rolling.digest(),
                expected[i]
            );
        }
    }

    #[test]
    fn test_rotate_different_window_sizes() {
        let data = b"The quick brown fox jumps over the lazy dog";

        for block_size in [4, 8, 16] {
            let mut rolling = RollingChecksum::new();

            for i in 0..=data.len() - block_size {
                if i == 0 {
                    rolling.update(&data[0..block_size]);
                } else {
                    rolling.rotate(data[i - 1], data[i + block_size - 1]);
                }

                let expected = RollingChecksum::checksum(&data[i..i + block_size]);
                assert_eq!(
                    rolling.digest(),
                    expected,
                    "Window size {}, position {}",
                    block_size,
                    i
                );
            }
        }
    }

    #[test]
    fn test_clear_returns_to_empty() {
        let mut rolling = RollingChecksum::new();
        assert!(rolling.is_empty());

        rolling.update(b"test");
        assert!(!rolling.is_empty());
        let d1 = rolling.digest();

        rolling.clear();
        assert!(rolling.is_empty());

        rolling.update(b"test");
        assert_eq!(rolling.digest(), d1);
    }

    #[test]
    fn test_short_window_update() {
        // A final window shorter than the block size is seeded via update;
        // the digest must match the one-shot computation for that length.
        let data = b"xyz";
        let mut rolling = RollingChecksum::new();
        rolling.update(data);
        assert_eq!(rolling.digest(), RollingChecksum::checksum(data));
    }
}
