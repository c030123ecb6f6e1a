use super::{Base64Engine, CodecError, Result};

/// Number of symbols needed to hold `bits` bits
const fn symbols_for(bits: u32) -> usize {
    bits.div_ceil(6) as usize
}

fn check_width(bits: u32) -> Result<()> {
    if bits == 0 || bits > 126 {
        return Err(CodecError::UnsupportedWidth(bits));
    }
    Ok(())
}

impl Base64Engine {
    /// Encode an unsigned integer of `bits` width
    ///
    /// Big-endian engines emit the most significant group first and put the
    /// padding in the low bits of the last symbol. Little-endian engines emit
    /// the least significant group first and pad the high bits.
    pub fn encode_int(&self, value: u128, bits: u32) -> Result<String> {
        check_width(bits)?;
        if value >> bits != 0 {
            return Err(CodecError::OutOfRange { value, bits });
        }

        let count = symbols_for(bits);
        let pad = (count * 6) as u32 - bits;

        let groups: Vec<u8> = if self.is_big() {
            let value = value << pad;
            (0..count)
                .rev()
                .map(|idx| ((value >> (idx * 6)) & 0x3f) as u8)
                .collect()
        } else {
            (0..count)
                .map(|idx| ((value >> (idx * 6)) & 0x3f) as u8)
                .collect()
        };

        Ok(groups.into_iter().map(|g| self.encode6(g)).collect())
    }

    /// Decode an unsigned integer of `bits` width; input length must be exact
    pub fn decode_int(&self, source: &str, bits: u32) -> Result<u128> {
        check_width(bits)?;
        let expected = symbols_for(bits);
        let actual = source.chars().count();
        if actual != expected {
            return Err(CodecError::WrongLength { expected, actual });
        }

        let values = source
            .chars()
            .map(|ch| self.decode6(ch))
            .collect::<Result<Vec<u8>>>()?;

        let fold = |acc: u128, v: &u8| (acc << 6) | u128::from(*v);
        let pad = (expected * 6) as u32 - bits;

        let out = if self.is_big() {
            values.iter().fold(0, fold) >> pad
        } else {
            values.iter().rev().fold(0, fold) & ((1u128 << bits) - 1)
        };
        Ok(out)
    }

    pub fn encode_int6(&self, value: u8) -> Result<String> {
        self.encode_int(value.into(), 6)
    }

    pub fn decode_int6(&self, source: &str) -> Result<u8> {
        self.decode_int(source, 6).map(|v| v as u8)
    }

    pub fn encode_int12(&self, value: u16) -> Result<String> {
        self.encode_int(value.into(), 12)
    }

    pub fn decode_int12(&self, source: &str) -> Result<u16> {
        self.decode_int(source, 12).map(|v| v as u16)
    }

    pub fn encode_int24(&self, value: u32) -> Result<String> {
        self.encode_int(value.into(), 24)
    }

    pub fn decode_int24(&self, source: &str) -> Result<u32> {
        self.decode_int(source, 24).map(|v| v as u32)
    }

    pub fn encode_int30(&self, value: u32) -> Result<String> {
        self.encode_int(value.into(), 30)
    }

    pub fn decode_int30(&self, source: &str) -> Result<u32> {
        self.decode_int(source, 30).map(|v| v as u32)
    }

    /// Encode a full 64-bit value (11 symbols); every `u64` fits
    pub fn encode_int64(&self, value: u64) -> String {
        let count = symbols_for(64);
        let groups: Vec<u8> = if self.is_big() {
            let value = u128::from(value) << 2;
            (0..count)
                .rev()
                .map(|idx| ((value >> (idx * 6)) & 0x3f) as u8)
                .collect()
        } else {
            (0..count)
                .map(|idx| ((u128::from(value) >> (idx * 6)) & 0x3f) as u8)
                .collect()
        };
        groups.into_iter().map(|g| self.encode6(g)).collect()
    }

    pub fn decode_int64(&self, source: &str) -> Result<u64> {
        self.decode_int(source, 64).map(|v| v as u64)
    }
}

#[cfg(test)]
mod tests {
    use crate::codec::{h64, h64big, CodecError};

    #[test]
    fn test_int6() {
        assert_eq!(h64().encode_int6(0).unwrap(), ".");
        assert_eq!(h64().encode_int6(63).unwrap(), "z");
        assert_eq!(h64().decode_int6("z").unwrap(), 63);
        assert!(matches!(h64().encode_int6(64), Err(CodecError::OutOfRange { value: 64, bits: 6 })));
    }

    #[test]
    fn test_int12_group_order() {
        // 0x041 = groups (1, 1)
        assert_eq!(h64().encode_int12(0x041).unwrap(), "//");
        // low group first for little-endian
        assert_eq!(h64().encode_int12(0x001).unwrap(), "/.");
        assert_eq!(h64big().encode_int12(0x001).unwrap(), "./");
        assert_eq!(h64big().decode_int12("./").unwrap(), 1);
        assert_eq!(h64().decode_int12("/.").unwrap(), 1);
    }

    #[test]
    fn test_int24_roundtrip() {
        for value in [0u32, 1, 0x123456, 0xffffff] {
            assert_eq!(h64().decode_int24(&h64().encode_int24(value).unwrap()).unwrap(), value);
            assert_eq!(h64big().decode_int24(&h64big().encode_int24(value).unwrap()).unwrap(), value);
        }
        assert!(h64().encode_int24(0x1000000).is_err());
    }

    #[test]
    fn test_int30_width() {
        assert_eq!(h64().encode_int30(0x3fffffff).unwrap(), "zzzzz");
        assert!(h64().encode_int30(0x40000000).is_err());
    }

    #[test]
    fn test_int64_padding_placement() {
        // 64 bits in 11 symbols leaves 2 pad bits
        let big = h64big().encode_int64(u64::MAX);
        assert_eq!(big.len(), 11);
        assert!(big.ends_with('w'));
        assert!(big.starts_with('z'));

        let little = h64().encode_int64(u64::MAX);
        assert!(little.starts_with('z'));
        // top group holds only 4 data bits: 0b001111 -> 'D'
        assert!(little.ends_with('D'));
        assert_eq!(h64().decode_int64(&little).unwrap(), u64::MAX);
        assert_eq!(h64big().decode_int64(&big).unwrap(), u64::MAX);
    }

    #[test]
    fn test_int64_matches_generic_encoder() {
        let value = 0x0123_4567_89ab_cdefu64;
        assert_eq!(h64().encode_int64(value), h64().encode_int(value.into(), 64).unwrap());
        assert_eq!(h64big().encode_int64(value), h64big().encode_int(value.into(), 64).unwrap());
    }

    #[test]
    fn test_generic_rejects_values_past_width() {
        let result = h64().encode_int(1u128 << 64, 64);
        assert!(matches!(result, Err(CodecError::OutOfRange { bits: 64, .. })));
    }

    #[test]
    fn test_generic_rejects_unsupported_widths() {
        for bits in [0, 127, 129, 200] {
            assert!(matches!(h64().encode_int(0, bits), Err(CodecError::UnsupportedWidth(b)) if b == bits));
            assert!(matches!(h64().decode_int("", bits), Err(CodecError::UnsupportedWidth(b)) if b == bits));
            assert!(matches!(h64big().decode_int("..", bits), Err(CodecError::UnsupportedWidth(_))));
        }
        let widest = h64big().encode_int((1u128 << 126) - 1, 126).unwrap();
        assert_eq!(h64big().decode_int(&widest, 126).unwrap(), (1u128 << 126) - 1);
    }

    #[test]
    fn test_decode_requires_exact_length() {
        assert!(matches!(
            h64().decode_int12("abc"),
            Err(CodecError::WrongLength { expected: 2, actual: 3 })
        ));
        assert!(matches!(
            h64().decode_int64("abc"),
            Err(CodecError::WrongLength { expected: 11, actual: 3 })
        ));
        assert!(h64().decode_int6("!").is_err());
    }
}
