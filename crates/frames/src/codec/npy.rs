//! Minimal NPY (format version 1.0 / 2.0) reader and writer.
//!
//! Only C-ordered arrays of `f32`, `u8` and `bool` are supported, which is
//! everything the frame types persist.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use contracts::{ListenerError, Result};

const MAGIC: &[u8; 6] = b"\x93NUMPY";
const ALIGNMENT: usize = 64;

/// Scalar types with an NPY `descr` code
pub trait NpyElement: Copy {
    /// Type code without the byte-order prefix (`f4`, `u1`, `b1`)
    const KIND: &'static str;

    /// Size in bytes
    const SIZE: usize;

    fn decode(bytes: &[u8], little_endian: bool) -> Self;

    fn encode_into(data: &[Self], out: &mut Vec<u8>);
}

impl NpyElement for f32 {
    const KIND: &'static str = "f4";
    const SIZE: usize = 4;

    fn decode(bytes: &[u8], little_endian: bool) -> Self {
        let raw = [bytes[0], bytes[1], bytes[2], bytes[3]];
        if little_endian {
            f32::from_le_bytes(raw)
        } else {
            f32::from_be_bytes(raw)
        }
    }

    fn encode_into(data: &[Self], out: &mut Vec<u8>) {
        // native byte order, matching the descr written in the header
        out.extend_from_slice(bytemuck::cast_slice(data));
    }
}

impl NpyElement for u8 {
    const KIND: &'static str = "u1";
    const SIZE: usize = 1;

    fn decode(bytes: &[u8], _little_endian: bool) -> Self {
        bytes[0]
    }

    fn encode_into(data: &[Self], out: &mut Vec<u8>) {
        out.extend_from_slice(data);
    }
}

impl NpyElement for bool {
    const KIND: &'static str = "b1";
    const SIZE: usize = 1;

    fn decode(bytes: &[u8], _little_endian: bool) -> Self {
        bytes[0] != 0
    }

    fn encode_into(data: &[Self], out: &mut Vec<u8>) {
        out.extend(data.iter().map(|&b| u8::from(b)));
    }
}

/// Decoded array: C-order shape plus flat data
#[derive(Debug, Clone, PartialEq)]
pub struct NpyArray<T> {
    pub shape: Vec<usize>,
    pub data: Vec<T>,
}

fn descr<T: NpyElement>() -> String {
    let order = if T::SIZE == 1 {
        '|'
    } else if cfg!(target_endian = "little") {
        '<'
    } else {
        '>'
    };
    format!("{order}{}", T::KIND)
}

fn shape_literal(shape: &[usize]) -> String {
    match shape {
        [single] => format!("({single},)"),
        dims => {
            let parts: Vec<String> = dims.iter().map(usize::to_string).collect();
            format!("({})", parts.join(", "))
        }
    }
}

/// Encode an array to NPY bytes
pub fn encode<T: NpyElement>(shape: &[usize], data: &[T]) -> Result<Vec<u8>> {
    let expected: usize = shape.iter().product();
    if expected != data.len() {
        return Err(ListenerError::invalid_argument(format!(
            "npy shape {shape:?} needs {expected} elements, got {}",
            data.len()
        )));
    }

    let mut header = format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': {}, }}",
        descr::<T>(),
        shape_literal(shape)
    );
    // magic + version + u16 length + header + '\n' padded to the alignment
    let unpadded = MAGIC.len() + 2 + 2 + header.len() + 1;
    let padding = (ALIGNMENT - unpadded % ALIGNMENT) % ALIGNMENT;
    header.extend(std::iter::repeat_n(' ', padding));
    header.push('\n');

    let header_len = u16::try_from(header.len())
        .map_err(|_| ListenerError::invalid_argument("npy header too long"))?;

    let mut out = Vec::with_capacity(unpadded + padding + data.len() * T::SIZE);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&header_len.to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    T::encode_into(data, &mut out);
    Ok(out)
}

/// Write an array to `path`
pub fn write<T: NpyElement>(path: &Path, shape: &[usize], data: &[T]) -> Result<()> {
    let bytes = encode(shape, data)?;
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read an array from `path`
pub fn read<T: NpyElement>(path: &Path) -> Result<NpyArray<T>> {
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;
    decode(&bytes).map_err(|message| ListenerError::format(path.display().to_string(), message))
}

/// Decode NPY bytes; the error is a human readable reason
pub fn decode<T: NpyElement>(bytes: &[u8]) -> std::result::Result<NpyArray<T>, String> {
    if bytes.len() < 10 || &bytes[..6] != MAGIC {
        return Err("missing NPY magic".into());
    }
    let major = bytes[6];
    let (header_len, header_start) = match major {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 => {
            if bytes.len() < 12 {
                return Err("truncated NPY header".into());
            }
            (
                u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize,
                12,
            )
        }
        other => return Err(format!("unsupported NPY version {other}")),
    };
    let data_start = header_start + header_len;
    let header = bytes
        .get(header_start..data_start)
        .and_then(|h| std::str::from_utf8(h).ok())
        .ok_or("truncated or non-utf8 NPY header")?;

    let descr = dict_value(header, "descr").ok_or("header has no descr")?;
    let descr = descr.trim_matches(|c| c == '\'' || c == '"');
    if descr.len() < 2 || !descr.is_ascii() {
        return Err(format!("malformed descr '{descr}'"));
    }
    let (order, kind) = descr.split_at(1);
    if kind != T::KIND {
        return Err(format!("expected dtype {}, found {descr}", T::KIND));
    }
    let little_endian = match order {
        "<" | "|" => true,
        ">" => false,
        "=" => cfg!(target_endian = "little"),
        _ => return Err(format!("unrecognised byte order in '{descr}'")),
    };

    if dict_value(header, "fortran_order") == Some("True") {
        return Err("fortran ordered arrays are not supported".into());
    }

    let shape = parse_shape(dict_value(header, "shape").ok_or("header has no shape")?)?;
    let count = shape
        .iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
        .ok_or("shape overflows addressable size")?;
    let needed = count
        .checked_mul(T::SIZE)
        .ok_or("shape overflows addressable size")?;
    let payload = &bytes[data_start..];
    if payload.len() < needed {
        return Err(format!(
            "payload holds {} bytes, shape {shape:?} needs {needed}",
            payload.len()
        ));
    }

    let data = payload
        .chunks_exact(T::SIZE)
        .take(count)
        .map(|chunk| T::decode(chunk, little_endian))
        .collect();
    Ok(NpyArray { shape, data })
}

/// Raw text of a value in the header dictionary
fn dict_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let quoted = format!("'{key}'");
    let start = header.find(&quoted)? + quoted.len();
    let rest = header[start..].trim_start().strip_prefix(':')?.trim_start();
    let end = if rest.starts_with('(') {
        rest.find(')')? + 1
    } else {
        rest.find([',', '}'])?
    };
    Some(rest[..end].trim())
}

fn parse_shape(literal: &str) -> std::result::Result<Vec<usize>, String> {
    literal
        .trim_start_matches('(')
        .trim_end_matches(')')
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().map_err(|_| format!("bad shape entry '{s}'")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_is_aligned() {
        let bytes = encode(&[2, 3, 3], &[0.0f32; 18]).unwrap();
        let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
        assert_eq!((10 + header_len) % ALIGNMENT, 0);
        assert_eq!(bytes.len(), 10 + header_len + 18 * 4);
        assert_eq!(bytes[10 + header_len - 1], b'\n');
    }

    #[test]
    fn test_decode_float_grid() {
        let data: Vec<f32> = (0..12).map(|v| v as f32 * 0.5).collect();
        let bytes = encode(&[2, 2, 3], &data).unwrap();
        let array: NpyArray<f32> = decode(&bytes).unwrap();
        assert_eq!(array.shape, vec![2, 2, 3]);
        assert_eq!(array.data, data);
    }

    #[test]
    fn test_decode_bool_mask() {
        let bytes = encode(&[3], &[true, false, true]).unwrap();
        assert!(bytes.windows(5).any(|w| w == b"'|b1'"));
        let array: NpyArray<bool> = decode(&bytes).unwrap();
        assert_eq!(array.shape, vec![3]);
        assert_eq!(array.data, vec![true, false, true]);
    }

    #[test]
    fn test_decode_rejects_wrong_dtype() {
        let bytes = encode(&[2], &[1u8, 2]).unwrap();
        let err = decode::<f32>(&bytes).unwrap_err();
        assert!(err.contains("expected dtype f4"));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode::<f32>(b"not an npy file").is_err());
    }

    #[test]
    fn test_decode_big_endian_payload() {
        let header = "{'descr': '>f4', 'fortran_order': False, 'shape': (2,), }\n";
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&[1, 0]);
        bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
        bytes.extend_from_slice(header.as_bytes());
        bytes.extend_from_slice(&1.5f32.to_be_bytes());
        bytes.extend_from_slice(&(-2.0f32).to_be_bytes());
        let array: NpyArray<f32> = decode(&bytes).unwrap();
        assert_eq!(array.data, vec![1.5, -2.0]);
    }

    #[test]
    fn test_decode_rejects_overflowing_shape() {
        let header =
            "{'descr': '<f4', 'fortran_order': False, 'shape': (4294967296, 4294967296, 3), }\n";
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&[1, 0]);
        bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
        bytes.extend_from_slice(header.as_bytes());
        bytes.extend_from_slice(&[0u8; 12]);
        let err = decode::<f32>(&bytes).unwrap_err();
        assert!(err.contains("overflows"));
    }
}
