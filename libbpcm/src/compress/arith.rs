//! Order-0 adaptive arithmetic coder.
//!
//! 32-bit integer range coder over an adaptive byte model. The encoded form
//! is a 4-byte LE decoded-length prefix followed by the coder output, so the
//! decoder knows exactly how many symbols to pull and the stream needs no
//! terminator symbol.

use crate::core::DecodeError;

const CODE_BITS: u32 = 32;
const MAX_CODE: u64 = (1 << CODE_BITS) - 1;
const HALF: u64 = 1 << (CODE_BITS - 1);
const QUARTER: u64 = 1 << (CODE_BITS - 2);
const THREE_QUARTERS: u64 = 3 * QUARTER;

const INCREMENT: u32 = 32;
const MAX_TOTAL: u64 = 1 << 16;

struct BitWriter {
    bytes: Vec<u8>,
    current: u8,
    filled: u8,
}

impl BitWriter {
    fn new() -> Self {
        BitWriter {
            bytes: Vec::new(),
            current: 0,
            filled: 0,
        }
    }

    fn write_bit(&mut self, bit: u64) {
        self.current = (self.current << 1) | (bit & 1) as u8;
        self.filled += 1;
        if self.filled == 8 {
            self.bytes.push(self.current);
            self.current = 0;
            self.filled = 0;
        }
    }

    fn into_bytes(mut self) -> Vec<u8> {
        if self.filled > 0 {
            self.bytes.push(self.current << (8 - self.filled));
        }
        self.bytes
    }
}

struct BitReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    bit: u8,
}

impl<'a> BitReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        BitReader { bytes, pos: 0, bit: 0 }
    }

    /// reads past the end yield zeros, which is all the coder tail needs
    fn read_bit(&mut self) -> u64 {
        let Some(&byte) = self.bytes.get(self.pos) else {
            return 0;
        };
        let bit = (byte >> (7 - self.bit)) & 1;
        self.bit += 1;
        if self.bit == 8 {
            self.bit = 0;
            self.pos += 1;
        }
        bit as u64
    }
}

/// adaptive byte frequencies
struct Model {
    freq: [u32; 256],
    total: u64,
}

impl Model {
    fn new() -> Self {
        Model {
            freq: [1; 256],
            total: 256,
        }
    }

    /// cumulative range of `symbol` as (low, high)
    fn range(&self, symbol: u8) -> (u64, u64) {
        let mut low = 0u64;
        for &f in &self.freq[..symbol as usize] {
            low += f as u64;
        }
        (low, low + self.freq[symbol as usize] as u64)
    }

    /// symbol whose cumulative range contains `target`
    fn find(&self, target: u64) -> (u8, u64, u64) {
        let mut low = 0u64;
        for (symbol, &f) in self.freq.iter().enumerate() {
            let high = low + f as u64;
            if target < high {
                return (symbol as u8, low, high);
            }
            low = high;
        }
        // target is clamped below total, so this is unreachable
        (255, low - self.freq[255] as u64, low)
    }

    fn update(&mut self, symbol: u8) {
        self.freq[symbol as usize] += INCREMENT;
        self.total += INCREMENT as u64;
        if self.total >= MAX_TOTAL {
            self.total = 0;
            for f in self.freq.iter_mut() {
                *f = (*f >> 1).max(1);
                self.total += *f as u64;
            }
        }
    }
}

pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() / 2 + 8);
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());

    let mut bits = BitWriter::new();
    let mut model = Model::new();
    let mut low: u64 = 0;
    let mut high: u64 = MAX_CODE;
    let mut pending: u64 = 0;

    for &symbol in data {
        let (cum_low, cum_high) = model.range(symbol);
        let total = model.total;
        let range = high - low + 1;
        high = low + range * cum_high / total - 1;
        low += range * cum_low / total;

        loop {
            if high < HALF {
                emit(&mut bits, 0, &mut pending);
            } else if low >= HALF {
                emit(&mut bits, 1, &mut pending);
                low -= HALF;
                high -= HALF;
            } else if low >= QUARTER && high < THREE_QUARTERS {
                pending += 1;
                low -= QUARTER;
                high -= QUARTER;
            } else {
                break;
            }
            low <<= 1;
            high = (high << 1) | 1;
        }
        model.update(symbol);
    }

    pending += 1;
    if low < QUARTER {
        emit(&mut bits, 0, &mut pending);
    } else {
        emit(&mut bits, 1, &mut pending);
    }

    out.extend_from_slice(&bits.into_bytes());
    out
}

fn emit(bits: &mut BitWriter, bit: u64, pending: &mut u64) {
    bits.write_bit(bit);
    while *pending > 0 {
        bits.write_bit(1 - bit);
        *pending -= 1;
    }
}

pub fn decode(data: &[u8], max_len: usize) -> Result<Vec<u8>, DecodeError> {
    const BACKEND: DecodeError = DecodeError::Backend {
        backend: "arithmetic",
    };
    if data.len() < 4 {
        return Err(BACKEND);
    }
    let len = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if len > max_len {
        return Err(BACKEND);
    }

    let mut bits = BitReader::new(&data[4..]);
    let mut model = Model::new();
    let mut low: u64 = 0;
    let mut high: u64 = MAX_CODE;
    let mut value: u64 = 0;
    for _ in 0..CODE_BITS {
        value = (value << 1) | bits.read_bit();
    }

    let mut out = Vec::with_capacity(len);
    for _ in 0..len {
        let total = model.total;
        let range = high - low + 1;
        // corrupt input can push value outside [low, high]; clamp instead
        // of underflowing
        let offset = (value.saturating_sub(low) + 1).min(range);
        let target = ((offset * total - 1) / range).min(total - 1);
        let (symbol, cum_low, cum_high) = model.find(target);

        high = low + range * cum_high / total - 1;
        low += range * cum_low / total;

        loop {
            if high < HALF {
                // nothing to subtract
            } else if low >= HALF {
                low -= HALF;
                high -= HALF;
                value = value.saturating_sub(HALF);
            } else if low >= QUARTER && high < THREE_QUARTERS {
                low -= QUARTER;
                high -= QUARTER;
                value = value.saturating_sub(QUARTER);
            } else {
                break;
            }
            low <<= 1;
            high = (high << 1) | 1;
            value = (value << 1) | bits.read_bit();
        }

        out.push(symbol);
        model.update(symbol);
    }
    Ok(out)
}
