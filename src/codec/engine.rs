use std::fmt;

use super::{CodecError, Result};

const INVALID: u8 = 0xff;

/// Encoder/decoder for one base64 variant (alphabet + bit order)
///
/// Bit layout for little-endian engines, per 3-byte group `v1 v2 v3`:
///
/// ```text
/// symbol 1:  v1 543210
/// symbol 2:  v1 ....76  + v2 3210..
/// symbol 3:  v2 ..7654  + v3 10....
/// symbol 4:  v3 765432
/// ```
///
/// Big-endian engines use the mirrored layout (the standard base64 one):
///
/// ```text
/// symbol 1:  v1 765432
/// symbol 2:  v1 10....  + v2 ..7654
/// symbol 3:  v2 3210..  + v3 ....76
/// symbol 4:  v3 543210
/// ```
///
/// A trailing group of 1 or 2 bytes yields 2 or 3 symbols; the unused bits of
/// the last symbol are always written as zero.
#[derive(Clone)]
pub struct Base64Engine {
    alphabet: String,
    encode_map: [u8; 64],
    decode_map: [u8; 256],
    big: bool,
}

impl Base64Engine {
    /// Build an engine from a 64-symbol ASCII alphabet
    pub fn new(alphabet: &str, big: bool) -> Result<Self> {
        let count = alphabet.chars().count();
        if count != 64 {
            return Err(CodecError::InvalidAlphabetLength(count));
        }

        let mut encode_map = [0u8; 64];
        let mut decode_map = [INVALID; 256];

        for (idx, ch) in alphabet.chars().enumerate() {
            if !ch.is_ascii() {
                return Err(CodecError::NonAsciiSymbol(ch));
            }
            let byte = ch as u8;
            if decode_map[byte as usize] != INVALID {
                return Err(CodecError::DuplicateSymbol(ch));
            }
            encode_map[idx] = byte;
            decode_map[byte as usize] = idx as u8;
        }

        Ok(Self {
            alphabet: alphabet.to_string(),
            encode_map,
            decode_map,
            big,
        })
    }

    pub fn alphabet(&self) -> &str {
        &self.alphabet
    }

    pub fn is_big(&self) -> bool {
        self.big
    }

    pub(super) fn encode6(&self, value: u8) -> char {
        self.encode_map[(value & 0x3f) as usize] as char
    }

    pub(super) fn decode6(&self, ch: char) -> Result<u8> {
        if !ch.is_ascii() {
            return Err(CodecError::InvalidCharacter(ch));
        }
        match self.decode_map[ch as usize] {
            INVALID => Err(CodecError::InvalidCharacter(ch)),
            value => Ok(value),
        }
    }

    fn decode_all(&self, source: &str) -> Result<Vec<u8>> {
        source.chars().map(|ch| self.decode6(ch)).collect()
    }

    /// Encode raw bytes
    pub fn encode_bytes(&self, source: &[u8]) -> String {
        let mut values = Vec::with_capacity((source.len() * 4).div_ceil(3));
        let mut chunks = source.chunks_exact(3);

        for chunk in chunks.by_ref() {
            let (v1, v2, v3) = (chunk[0], chunk[1], chunk[2]);
            if self.big {
                values.extend([v1 >> 2, ((v1 & 0x03) << 4) | (v2 >> 4), ((v2 & 0x0f) << 2) | (v3 >> 6), v3 & 0x3f]);
            } else {
                values.extend([v1 & 0x3f, ((v2 & 0x0f) << 2) | (v1 >> 6), ((v3 & 0x03) << 4) | (v2 >> 4), v3 >> 2]);
            }
        }

        match *chunks.remainder() {
            [v1] => {
                if self.big {
                    values.extend([v1 >> 2, (v1 & 0x03) << 4]);
                } else {
                    values.extend([v1 & 0x3f, v1 >> 6]);
                }
            }
            [v1, v2] => {
                if self.big {
                    values.extend([v1 >> 2, ((v1 & 0x03) << 4) | (v2 >> 4), (v2 & 0x0f) << 2]);
                } else {
                    values.extend([v1 & 0x3f, ((v2 & 0x0f) << 2) | (v1 >> 6), v2 >> 4]);
                }
            }
            _ => {}
        }

        values.into_iter().map(|v| self.encode6(v)).collect()
    }

    /// Decode text produced by [`encode_bytes`](Self::encode_bytes)
    ///
    /// Unused bits in the final symbol are ignored.
    pub fn decode_bytes(&self, source: &str) -> Result<Vec<u8>> {
        let values = self.decode_all(source)?;
        if values.len() % 4 == 1 {
            return Err(CodecError::InvalidLength(values.len()));
        }

        let mut out = Vec::with_capacity(values.len() * 3 / 4);
        let mut chunks = values.chunks_exact(4);

        for chunk in chunks.by_ref() {
            let (v1, v2, v3, v4) = (chunk[0], chunk[1], chunk[2], chunk[3]);
            if self.big {
                out.extend([(v1 << 2) | (v2 >> 4), ((v2 & 0x0f) << 4) | (v3 >> 2), ((v3 & 0x03) << 6) | v4]);
            } else {
                out.extend([v1 | ((v2 & 0x03) << 6), (v2 >> 2) | ((v3 & 0x0f) << 4), (v3 >> 4) | (v4 << 2)]);
            }
        }

        match *chunks.remainder() {
            [v1, v2] => {
                out.push(if self.big { (v1 << 2) | (v2 >> 4) } else { v1 | ((v2 & 0x03) << 6) });
            }
            [v1, v2, v3] => {
                if self.big {
                    out.extend([(v1 << 2) | (v2 >> 4), ((v2 & 0x0f) << 4) | (v3 >> 2)]);
                } else {
                    out.extend([v1 | ((v2 & 0x03) << 6), (v2 >> 2) | ((v3 & 0x0f) << 4)]);
                }
            }
            _ => {}
        }

        Ok(out)
    }

    /// Bits of the last symbol that carry no data, for a given tail length
    fn padding_bits(&self, tail: usize) -> u8 {
        match (tail, self.big) {
            (2, true) => 0x0f,
            (2, false) => 0x3c,
            (3, true) => 0x03,
            (3, false) => 0x30,
            _ => 0,
        }
    }

    /// Detect and clear non-zero padding bits in the final symbol
    ///
    /// Returns `(true, repaired)` when the input had dirty padding bits and
    /// `(false, input)` when it was already canonical.
    pub fn check_repair_unused(&self, source: &str) -> Result<(bool, String)> {
        let len = source.chars().count();
        let tail = len & 3;
        if tail == 1 {
            return Err(CodecError::InvalidLength(len));
        }

        let Some(last) = source.chars().last() else {
            return Ok((false, String::new()));
        };
        let value = self.decode6(last)?;
        let bits = self.padding_bits(tail);

        if value & bits == 0 {
            return Ok((false, source.to_string()));
        }

        let mut repaired: String = source.chars().take(len - 1).collect();
        repaired.push(self.encode6(value & !bits));
        Ok((true, repaired))
    }

    pub fn repair_unused(&self, source: &str) -> Result<String> {
        self.check_repair_unused(source).map(|(_, repaired)| repaired)
    }

    /// Encode `source` after reordering it: output byte `i` is `source[offsets[i]]`
    pub fn encode_transposed_bytes(&self, source: &[u8], offsets: &[usize]) -> Result<String> {
        let transposed = offsets
            .iter()
            .map(|&offset| {
                source.get(offset).copied().ok_or(CodecError::InvalidOffset {
                    offset,
                    len: source.len(),
                })
            })
            .collect::<Result<Vec<u8>>>()?;
        Ok(self.encode_bytes(&transposed))
    }

    /// Inverse of [`encode_transposed_bytes`](Self::encode_transposed_bytes)
    pub fn decode_transposed_bytes(&self, source: &str, offsets: &[usize]) -> Result<Vec<u8>> {
        let decoded = self.decode_bytes(source)?;
        let mut buf: Vec<Option<u8>> = vec![None; offsets.len()];

        for (&offset, byte) in offsets.iter().zip(decoded) {
            let slot = buf.get_mut(offset).ok_or(CodecError::InvalidOffset {
                offset,
                len: offsets.len(),
            })?;
            *slot = Some(byte);
        }

        buf.into_iter()
            .enumerate()
            .map(|(idx, byte)| byte.ok_or(CodecError::IncompleteTransposition(idx)))
            .collect()
    }
}

impl fmt::Debug for Base64Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Base64Engine")
            .field("alphabet", &self.alphabet)
            .field("big", &self.big)
            .finish()
    }
}

impl PartialEq for Base64Engine {
    fn eq(&self, other: &Self) -> bool {
        self.alphabet == other.alphabet && self.big == other.big
    }
}

impl Eq for Base64Engine {}
