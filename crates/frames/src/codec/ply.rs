//! PLY point-cloud files (vertex positions only).
//!
//! Reads `ascii`, `binary_little_endian` and `binary_big_endian` files whose
//! vertex element carries `x`, `y`, `z`; other vertex properties are skipped.
//! Writes binary in native byte order.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use bytemuck::{Pod, Zeroable};
use nalgebra::Vector3;

use contracts::{ListenerError, Result};

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct PlyVertex {
    x: f32,
    y: f32,
    z: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Encoding {
    Ascii,
    Binary { little_endian: bool },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Scalar {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
}

impl Scalar {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "char" | "int8" => Self::I8,
            "uchar" | "uint8" => Self::U8,
            "short" | "int16" => Self::I16,
            "ushort" | "uint16" => Self::U16,
            "int" | "int32" => Self::I32,
            "uint" | "uint32" => Self::U32,
            "float" | "float32" => Self::F32,
            "double" | "float64" => Self::F64,
            _ => return None,
        })
    }

    fn size(&self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }

    fn read(&self, bytes: &[u8], little_endian: bool) -> f64 {
        macro_rules! num {
            ($ty:ty, $n:expr) => {{
                let mut raw = [0u8; $n];
                raw.copy_from_slice(&bytes[..$n]);
                if little_endian {
                    <$ty>::from_le_bytes(raw) as f64
                } else {
                    <$ty>::from_be_bytes(raw) as f64
                }
            }};
        }
        match self {
            Self::I8 => bytes[0] as i8 as f64,
            Self::U8 => bytes[0] as f64,
            Self::I16 => num!(i16, 2),
            Self::U16 => num!(u16, 2),
            Self::I32 => num!(i32, 4),
            Self::U32 => num!(u32, 4),
            Self::F32 => num!(f32, 4),
            Self::F64 => num!(f64, 8),
        }
    }
}

/// Per-record layout entry, in header order
#[derive(Debug, Clone, Copy)]
enum Field {
    Scalar(Scalar),
    List { count: Scalar, item: Scalar },
}

#[derive(Debug)]
struct Element {
    name: String,
    count: usize,
    /// Named scalar properties
    properties: Vec<(String, Scalar)>,
    fields: Vec<Field>,
}

impl Element {
    fn has_list(&self) -> bool {
        self.fields.iter().any(|f| matches!(f, Field::List { .. }))
    }
}

#[derive(Debug)]
struct Header {
    encoding: Encoding,
    elements: Vec<Element>,
}

fn format_err(path: &Path, message: impl Into<String>) -> ListenerError {
    ListenerError::format(path.display().to_string(), message)
}

fn read_header<R: BufRead>(reader: &mut R, path: &Path) -> Result<Header> {
    let mut line = String::new();
    reader.read_line(&mut line)?;
    if line.trim() != "ply" {
        return Err(format_err(path, "missing 'ply' magic"));
    }

    let mut encoding = None;
    let mut elements: Vec<Element> = Vec::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err(format_err(path, "header ended before end_header"));
        }
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("format") => {
                encoding = Some(match tokens.next() {
                    Some("ascii") => Encoding::Ascii,
                    Some("binary_little_endian") => Encoding::Binary {
                        little_endian: true,
                    },
                    Some("binary_big_endian") => Encoding::Binary {
                        little_endian: false,
                    },
                    other => {
                        return Err(format_err(
                            path,
                            format!("unsupported ply format {other:?}"),
                        ))
                    }
                });
            }
            Some("element") => {
                let name = tokens.next().unwrap_or_default().to_string();
                let count = tokens
                    .next()
                    .and_then(|c| c.parse().ok())
                    .ok_or_else(|| format_err(path, format!("bad count for element {name}")))?;
                elements.push(Element {
                    name,
                    count,
                    properties: Vec::new(),
                    fields: Vec::new(),
                });
            }
            Some("property") => {
                let element = elements
                    .last_mut()
                    .ok_or_else(|| format_err(path, "property before any element"))?;
                let scalar = |ty: Option<&str>| {
                    let ty = ty.unwrap_or_default();
                    Scalar::parse(ty)
                        .ok_or_else(|| format_err(path, format!("unknown property type '{ty}'")))
                };
                match tokens.next() {
                    Some("list") => {
                        let count = scalar(tokens.next())?;
                        let item = scalar(tokens.next())?;
                        element.fields.push(Field::List { count, item });
                    }
                    Some(ty) => {
                        let ty = scalar(Some(ty))?;
                        let name = tokens.next().unwrap_or_default().to_string();
                        element.properties.push((name, ty));
                        element.fields.push(Field::Scalar(ty));
                    }
                    None => return Err(format_err(path, "empty property line")),
                }
            }
            Some("end_header") => break,
            // comment, obj_info
            _ => {}
        }
    }

    let encoding = encoding.ok_or_else(|| format_err(path, "header has no format line"))?;
    Ok(Header { encoding, elements })
}

/// Read vertex positions from a PLY file
pub fn read_points(path: &Path) -> Result<Vec<Vector3<f32>>> {
    let mut reader = BufReader::new(File::open(path)?);
    let header = read_header(&mut reader, path)?;

    let mut points = Vec::new();
    for element in &header.elements {
        let is_vertex = element.name == "vertex";
        if element.has_list() {
            if is_vertex {
                return Err(format_err(path, "list properties on vertices are not supported"));
            }
            if let Encoding::Binary { little_endian } = header.encoding {
                skip_list_records(&mut reader, element, little_endian, path)?;
                continue;
            }
        }

        let index_of = |axis: &str| element.properties.iter().position(|(n, _)| n == axis);
        let axes = if is_vertex {
            match (index_of("x"), index_of("y"), index_of("z")) {
                (Some(x), Some(y), Some(z)) => Some([x, y, z]),
                _ => return Err(format_err(path, "vertex element lacks x/y/z")),
            }
        } else {
            None
        };

        match header.encoding {
            Encoding::Ascii => {
                let mut line = String::new();
                for _ in 0..element.count {
                    line.clear();
                    if reader.read_line(&mut line)? == 0 {
                        return Err(format_err(path, "unexpected end of ascii body"));
                    }
                    if let Some(axes) = axes {
                        let values: Vec<&str> = line.split_whitespace().collect();
                        let mut p = [0.0f32; 3];
                        for (slot, &idx) in p.iter_mut().zip(axes.iter()) {
                            *slot = values
                                .get(idx)
                                .and_then(|v| v.parse::<f32>().ok())
                                .ok_or_else(|| format_err(path, "malformed vertex line"))?;
                        }
                        points.push(Vector3::new(p[0], p[1], p[2]));
                    }
                }
            }
            Encoding::Binary { little_endian } => {
                let stride: usize = element.properties.iter().map(|(_, s)| s.size()).sum();
                let offsets: Vec<usize> = element
                    .properties
                    .iter()
                    .scan(0, |acc, (_, s)| {
                        let offset = *acc;
                        *acc += s.size();
                        Some(offset)
                    })
                    .collect();
                let mut record = vec![0u8; stride];
                for _ in 0..element.count {
                    reader
                        .read_exact(&mut record)
                        .map_err(|e| format_err(path, format!("truncated binary body: {e}")))?;
                    if let Some(axes) = axes {
                        let value = |idx: usize| {
                            let (_, scalar) = element.properties[idx];
                            scalar.read(&record[offsets[idx]..], little_endian) as f32
                        };
                        points.push(Vector3::new(value(axes[0]), value(axes[1]), value(axes[2])));
                    }
                }
            }
        }

        if is_vertex {
            break;
        }
    }
    Ok(points)
}

/// Skip the binary records of an element whose size varies per record
fn skip_list_records<R: Read>(
    reader: &mut R,
    element: &Element,
    little_endian: bool,
    path: &Path,
) -> Result<()> {
    let truncated = |e: std::io::Error| format_err(path, format!("truncated binary body: {e}"));
    let mut prefix = [0u8; 8];
    for _ in 0..element.count {
        for field in &element.fields {
            let len = match *field {
                Field::Scalar(scalar) => scalar.size() as u64,
                Field::List { count, item } => {
                    let prefix = &mut prefix[..count.size()];
                    reader.read_exact(prefix).map_err(truncated)?;
                    let n = count.read(prefix, little_endian);
                    if n < 0.0 || n.fract() != 0.0 {
                        return Err(format_err(
                            path,
                            format!("invalid list length {n} in element {}", element.name),
                        ));
                    }
                    n as u64 * item.size() as u64
                }
            };
            let skipped = std::io::copy(&mut reader.by_ref().take(len), &mut std::io::sink())?;
            if skipped != len {
                return Err(format_err(path, "truncated binary body"));
            }
        }
    }
    Ok(())
}

/// Write vertex positions as a binary PLY file
pub fn write_points(path: &Path, points: &[Vector3<f32>]) -> Result<()> {
    let endian = if cfg!(target_endian = "little") {
        "little"
    } else {
        "big"
    };
    let mut file = BufWriter::new(File::create(path)?);
    writeln!(file, "ply")?;
    writeln!(file, "format binary_{endian}_endian 1.0")?;
    writeln!(file, "element vertex {}", points.len())?;
    writeln!(file, "property float x")?;
    writeln!(file, "property float y")?;
    writeln!(file, "property float z")?;
    writeln!(file, "end_header")?;

    let vertices: Vec<PlyVertex> = points
        .iter()
        .map(|p| PlyVertex {
            x: p.x,
            y: p.y,
            z: p.z,
        })
        .collect();
    file.write_all(bytemuck::cast_slice(&vertices))?;
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_binary_file_reads_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scan.ply");
        let points = vec![Vector3::new(1.0, 2.0, 3.0), Vector3::new(-0.5, 0.25, 8.0)];
        write_points(&path, &points).unwrap();
        assert_eq!(read_points(&path).unwrap(), points);
    }

    #[test]
    fn test_ascii_with_extra_properties() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scan.ply");
        std::fs::write(
            &path,
            "ply\nformat ascii 1.0\ncomment test\nelement vertex 2\n\
             property float intensity\nproperty float x\nproperty float y\nproperty float z\n\
             element face 0\nproperty list uchar int vertex_indices\nend_header\n\
             9 1 2 3\n9 4 5 6\n",
        )
        .unwrap();
        let points = read_points(&path).unwrap();
        assert_eq!(points, vec![Vector3::new(1.0, 2.0, 3.0), Vector3::new(4.0, 5.0, 6.0)]);
    }

    #[test]
    fn test_double_precision_big_endian() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scan.ply");
        let mut bytes = b"ply\nformat binary_big_endian 1.0\nelement vertex 1\n\
property double x\nproperty double y\nproperty double z\nproperty uchar red\nend_header\n"
            .to_vec();
        for v in [0.5f64, -1.0, 2.0] {
            bytes.extend_from_slice(&v.to_be_bytes());
        }
        bytes.push(200);
        std::fs::write(&path, bytes).unwrap();
        assert_eq!(read_points(&path).unwrap(), vec![Vector3::new(0.5, -1.0, 2.0)]);
    }

    #[test]
    fn test_missing_axes_is_format_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scan.ply");
        std::fs::write(
            &path,
            "ply\nformat ascii 1.0\nelement vertex 1\nproperty float x\nend_header\n1\n",
        )
        .unwrap();
        assert!(matches!(
            read_points(&path),
            Err(ListenerError::Format { .. })
        ));
    }

    fn binary_with_face(face_first: bool) -> Vec<u8> {
        let face_header = "element face 2\nproperty uchar flags\nproperty list uchar int vertex_indices\n";
        let vertex_header = "element vertex 1\nproperty float x\nproperty float y\nproperty float z\n";
        let (first, second) = if face_first {
            (face_header, vertex_header)
        } else {
            (vertex_header, face_header)
        };
        let mut bytes =
            format!("ply\nformat binary_little_endian 1.0\n{first}{second}end_header\n").into_bytes();

        let mut faces = Vec::new();
        for indices in [&[0i32, 0, 0][..], &[0, 0, 0, 0][..]] {
            faces.push(7u8);
            faces.push(indices.len() as u8);
            for i in indices {
                faces.extend_from_slice(&i.to_le_bytes());
            }
        }
        let mut vertex = Vec::new();
        for v in [1.0f32, 2.0, 3.0] {
            vertex.extend_from_slice(&v.to_le_bytes());
        }
        if face_first {
            bytes.extend(faces);
            bytes.extend(vertex);
        } else {
            bytes.extend(vertex);
            bytes.extend(faces);
        }
        bytes
    }

    #[test]
    fn test_binary_faces_before_vertices_are_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mesh.ply");
        std::fs::write(&path, binary_with_face(true)).unwrap();
        assert_eq!(read_points(&path).unwrap(), vec![Vector3::new(1.0, 2.0, 3.0)]);
    }

    #[test]
    fn test_binary_faces_after_vertices_are_ignored() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mesh.ply");
        std::fs::write(&path, binary_with_face(false)).unwrap();
        assert_eq!(read_points(&path).unwrap(), vec![Vector3::new(1.0, 2.0, 3.0)]);
    }

    #[test]
    fn test_truncated_face_list_is_format_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mesh.ply");
        let mut bytes = binary_with_face(true);
        let header_end = bytes.windows(11).position(|w| w == b"end_header\n").unwrap() + 11;
        bytes.truncate(header_end + 8);
        std::fs::write(&path, bytes).unwrap();
        assert!(matches!(
            read_points(&path),
            Err(ListenerError::Format { .. })
        ));
    }
}
