//! Byte-oriented variable-length integer encoding.
//!
//! Layout of the first byte: bit 7 extends into the next byte, bit 6 is the
//! sign, bits 0..6 hold the lowest six bits of the value. Every following byte
//! carries seven more bits plus its own extension bit. Negative values are
//! stored as their bitwise complement, so small magnitudes of either sign fit
//! into a single byte. A value never spans more than five bytes.

pub const MAX_BYTES_PACKED: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PackError {
    #[error("input truncated at byte {0}")]
    Truncated(usize),
    #[error("output would exceed {max} bytes")]
    Overflow { max: usize },
    #[error("string is not valid utf-8")]
    InvalidString,
    #[error("unknown message id {0}")]
    UnknownMessage(i32),
    #[error("invalid value {value} for {field}")]
    InvalidValue { field: &'static str, value: i32 },
}

pub fn pack(out: &mut Vec<u8>, value: i32) {
    let mut byte = ((value >> 25) & 0x40) as u8;
    let mut rest = value ^ (value >> 31);

    byte |= (rest & 0x3f) as u8;
    rest >>= 6;

    while rest != 0 {
        byte |= 0x80;
        out.push(byte);
        byte = (rest & 0x7f) as u8;
        rest >>= 7;
    }
    out.push(byte);
}

/// Decodes one value, returning it together with the number of bytes consumed.
pub fn unpack(src: &[u8]) -> Result<(i32, usize), PackError> {
    let first = *src.first().ok_or(PackError::Truncated(0))?;
    let sign = ((first >> 6) & 1) as i32;
    let mut value = (first & 0x3f) as i32;

    let mut byte = first;
    let mut pos = 1;
    let mut shift = 6;
    while byte & 0x80 != 0 && pos < MAX_BYTES_PACKED {
        byte = *src.get(pos).ok_or(PackError::Truncated(pos))?;
        let bits = if shift == 27 { byte & 0x0f } else { byte & 0x7f };
        value |= (bits as i32) << shift;
        shift += 7;
        pos += 1;
    }

    Ok((value ^ -sign, pos))
}

pub fn compress(values: &[i32], max_size: usize) -> Result<Vec<u8>, PackError> {
    let mut out = Vec::with_capacity(values.len() * 2);
    for &value in values {
        pack(&mut out, value);
        if out.len() > max_size {
            return Err(PackError::Overflow { max: max_size });
        }
    }
    Ok(out)
}

pub fn decompress(mut src: &[u8]) -> Result<Vec<i32>, PackError> {
    let total = src.len();
    let mut out = Vec::with_capacity(src.len());
    while !src.is_empty() {
        let (value, used) = unpack(src).map_err(|e| match e {
            PackError::Truncated(at) => PackError::Truncated(total - src.len() + at),
            other => other,
        })?;
        out.push(value);
        src = &src[used..];
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn packed(value: i32) -> Vec<u8> {
        let mut out = Vec::new();
        pack(&mut out, value);
        out
    }

    #[test]
    fn test_small_values_take_one_byte() {
        assert_eq!(packed(0), vec![0x00]);
        assert_eq!(packed(1), vec![0x01]);
        assert_eq!(packed(63), vec![0x3f]);
        assert_eq!(packed(-1), vec![0x40]);
        assert_eq!(packed(-64), vec![0x7f]);
    }

    #[test]
    fn test_extension_bytes() {
        assert_eq!(packed(64), vec![0x80, 0x01]);
        assert_eq!(packed(-65), vec![0xc0, 0x01]);
        assert_eq!(packed(i32::MAX).len(), MAX_BYTES_PACKED);
        assert_eq!(packed(i32::MIN).len(), MAX_BYTES_PACKED);
    }

    #[test]
    fn test_unpack_extremes() {
        for value in [0, 1, -1, 63, 64, -64, -65, 8191, 8192, i32::MAX, i32::MIN] {
            let bytes = packed(value);
            assert_eq!(unpack(&bytes).unwrap(), (value, bytes.len()));
        }
    }

    #[test]
    fn test_truncated_input_is_reported() {
        assert_eq!(unpack(&[]), Err(PackError::Truncated(0)));
        assert_eq!(unpack(&[0x80]), Err(PackError::Truncated(1)));
        assert_eq!(decompress(&[0x01, 0x80]), Err(PackError::Truncated(2)));
    }

    #[test]
    fn test_compress_respects_max_size() {
        let values = vec![i32::MAX; 10];
        assert_eq!(
            compress(&values, 20),
            Err(PackError::Overflow { max: 20 })
        );
        assert_eq!(compress(&values, 50).unwrap().len(), 50);
    }

    #[test]
    fn test_random_sequences_survive_compression() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..200 {
            let len = rng.gen_range(0..256);
            let values: Vec<i32> = (0..len)
                .map(|_| match rng.gen_range(0..3) {
                    0 => rng.gen_range(-64..64),
                    1 => rng.gen_range(-100_000..100_000),
                    _ => rng.r#gen(),
                })
                .collect();
            let bytes = compress(&values, usize::MAX).unwrap();
            assert_eq!(decompress(&bytes).unwrap(), values);
        }
    }
}
