//! Raw buffer to typed value conversion.
//!
//! Numeric narrowing follows Rust `as` casts: `i64 → i32` keeps the low 32
//! bits (two's-complement truncation), `f64 → f32` rounds to nearest, and
//! `f64 → i32` truncates toward zero and saturates. Overflow is not guarded.

use bytemuck::Pod;

use crate::container::ElementEncoding;
use crate::data::model::ElementType;
use crate::error::LoadError;

/// Fail with `EncodingMismatch` unless `target` can be produced from `encoding`.
pub fn expect_encoding(
    name: &str,
    encoding: ElementEncoding,
    target: ElementType,
) -> Result<(), LoadError> {
    if target.accepts(encoding) {
        Ok(())
    } else {
        Err(LoadError::EncodingMismatch {
            name: name.to_string(),
            expected: target.label(),
            found: encoding,
        })
    }
}

/// Narrow an `Int64` or `Float64` buffer to `i32`.
pub fn to_i32(name: &str, encoding: ElementEncoding, bytes: &[u8]) -> Result<Vec<i32>, LoadError> {
    decode_numeric(name, encoding, bytes, ElementType::Int32, |v| v as i32, |v| v as i32)
}

/// Narrow an `Int64` or `Float64` buffer to `f32`.
pub fn to_f32(name: &str, encoding: ElementEncoding, bytes: &[u8]) -> Result<Vec<f32>, LoadError> {
    decode_numeric(name, encoding, bytes, ElementType::Float32, |v| v as f32, |v| v as f32)
}

fn decode_numeric<T>(
    name: &str,
    encoding: ElementEncoding,
    bytes: &[u8],
    target: ElementType,
    from_int: impl Fn(i64) -> T,
    from_float: impl Fn(f64) -> T,
) -> Result<Vec<T>, LoadError> {
    match encoding {
        ElementEncoding::Int64 => Ok(bytes
            .chunks_exact(8)
            .map(|c| from_int(bytemuck::pod_read_unaligned(c)))
            .collect()),
        ElementEncoding::Float64 => Ok(bytes
            .chunks_exact(8)
            .map(|c| from_float(bytemuck::pod_read_unaligned(c)))
            .collect()),
        found => Err(LoadError::EncodingMismatch {
            name: name.to_string(),
            expected: target.label(),
            found,
        }),
    }
}

/// Decode a whole buffer as ASCII. Every byte, NUL included, becomes one char.
pub fn decode_ascii(name: &str, bytes: &[u8]) -> Result<String, LoadError> {
    if let Some(offset) = bytes.iter().position(|b| !b.is_ascii()) {
        return Err(LoadError::InvalidAscii {
            name: name.to_string(),
            offset,
            byte: bytes[offset],
        });
    }
    Ok(bytes.iter().map(|&b| char::from(b)).collect())
}

/// Split `text` into consecutive parts of `part_len` characters.
///
/// The last part is shorter when the length is not a multiple of `part_len`.
/// Padding characters are kept as they are.
pub fn split_in_parts(text: &str, part_len: usize) -> Result<Vec<String>, LoadError> {
    if part_len == 0 {
        return Err(LoadError::InvalidArgument(
            "part length has to be positive".to_string(),
        ));
    }
    let chars: Vec<char> = text.chars().collect();
    Ok(chars
        .chunks(part_len)
        .map(|part| part.iter().collect())
        .collect())
}

/// Reinterpret native-endian bytes as `T`, one `size_of::<T>()` chunk per
/// value. A trailing partial chunk is dropped.
pub fn reinterpret<T: Pod>(bytes: &[u8]) -> Result<Vec<T>, LoadError> {
    let size = std::mem::size_of::<T>();
    if size == 0 {
        return Err(LoadError::InvalidArgument(
            "cannot reinterpret bytes as a zero-sized type".to_string(),
        ));
    }
    Ok(bytes
        .chunks_exact(size)
        .map(bytemuck::pod_read_unaligned)
        .collect())
}
