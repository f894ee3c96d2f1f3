//! Binary STL parsing. OpenSCAD exports binary STL: an 80-byte header, a
//! little-endian u32 triangle count, then 50-byte records of twelve f32
//! fields (normal plus three vertices) and a u16 attribute count.

use crate::error::{Error, Result};

pub const HEADER_LEN: usize = 80;
pub const TRIANGLE_LEN: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub normal: [f32; 3],
    pub vertices: [[f32; 3]; 3],
}

/// Parse a binary STL body. Trailing bytes beyond the declared triangle
/// count are ignored; a body shorter than the count is an error.
pub fn parse_binary(bytes: &[u8]) -> Result<Vec<Triangle>> {
    if bytes.len() < HEADER_LEN + 4 {
        return Err(Error::malformed(format!(
            "{} bytes is too short for a binary STL",
            bytes.len()
        )));
    }

    let count = u32::from_le_bytes([
        bytes[HEADER_LEN],
        bytes[HEADER_LEN + 1],
        bytes[HEADER_LEN + 2],
        bytes[HEADER_LEN + 3],
    ]) as usize;
    let body = &bytes[HEADER_LEN + 4..];
    if body.len() < count * TRIANGLE_LEN {
        return Err(Error::malformed(format!(
            "header declares {count} triangles but the body holds {}",
            body.len() / TRIANGLE_LEN
        )));
    }

    let mut triangles = Vec::with_capacity(count);
    for record in body.chunks_exact(TRIANGLE_LEN).take(count) {
        let mut fields = [0.0f32; 12];
        for (i, field) in fields.iter_mut().enumerate() {
            let offset = i * 4;
            *field = f32::from_le_bytes([
                record[offset],
                record[offset + 1],
                record[offset + 2],
                record[offset + 3],
            ]);
        }
        triangles.push(Triangle {
            normal: [fields[0], fields[1], fields[2]],
            vertices: [
                [fields[3], fields[4], fields[5]],
                [fields[6], fields[7], fields[8]],
                [fields[9], fields[10], fields[11]],
            ],
        });
    }
    Ok(triangles)
}

/// Axis-aligned bounds over every vertex, or None for an empty mesh
pub fn bounding_box(triangles: &[Triangle]) -> Option<([f32; 3], [f32; 3])> {
    let mut min = [f32::INFINITY; 3];
    let mut max = [f32::NEG_INFINITY; 3];
    for triangle in triangles {
        for vertex in &triangle.vertices {
            for axis in 0..3 {
                min[axis] = min[axis].min(vertex[axis]);
                max[axis] = max[axis].max(vertex[axis]);
            }
        }
    }
    if triangles.is_empty() {
        None
    } else {
        Some((min, max))
    }
}

#[cfg(test)]
pub(crate) fn encode_binary(triangles: &[Triangle]) -> Vec<u8> {
    let mut bytes = vec![0u8; HEADER_LEN];
    bytes.extend_from_slice(&(triangles.len() as u32).to_le_bytes());
    for triangle in triangles {
        for value in triangle.normal {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        for vertex in triangle.vertices {
            for value in vertex {
                bytes.extend_from_slice(&value.to_le_bytes());
            }
        }
        bytes.extend_from_slice(&0u16.to_le_bytes());
    }
    bytes
}

/// Axis-aligned cube centered on the origin, two triangles per face
#[cfg(test)]
pub(crate) fn cube_mesh(size: f32) -> Vec<Triangle> {
    let h = size / 2.0;
    let quads: [([f32; 3], [[f32; 3]; 4]); 6] = [
        ([1.0, 0.0, 0.0], [[h, -h, -h], [h, h, -h], [h, h, h], [h, -h, h]]),
        ([-1.0, 0.0, 0.0], [[-h, -h, -h], [-h, -h, h], [-h, h, h], [-h, h, -h]]),
        ([0.0, 1.0, 0.0], [[-h, h, -h], [-h, h, h], [h, h, h], [h, h, -h]]),
        ([0.0, -1.0, 0.0], [[-h, -h, -h], [h, -h, -h], [h, -h, h], [-h, -h, h]]),
        ([0.0, 0.0, 1.0], [[-h, -h, h], [h, -h, h], [h, h, h], [-h, h, h]]),
        ([0.0, 0.0, -1.0], [[-h, -h, -h], [-h, h, -h], [h, h, -h], [h, -h, -h]]),
    ];
    let mut triangles = Vec::with_capacity(12);
    for (normal, [a, b, c, d]) in quads {
        triangles.push(Triangle {
            normal,
            vertices: [a, b, c],
        });
        triangles.push(Triangle {
            normal,
            vertices: [a, c, d],
        });
    }
    triangles
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_single_triangle() {
        let triangle = Triangle {
            normal: [0.0, 0.0, 1.0],
            vertices: [[0.0, 0.0, 0.0], [10.0, 0.0, 0.0], [0.0, 10.0, 0.0]],
        };
        let parsed = parse_binary(&encode_binary(&[triangle])).unwrap();
        assert_eq!(parsed, vec![triangle]);
    }

    #[test]
    fn too_short_input_is_rejected() {
        let err = parse_binary(&[0u8; 40]).unwrap_err();
        assert!(matches!(err, Error::MalformedStl(_)));
        assert!(err.to_string().contains("too short"));
    }

    #[test]
    fn truncated_body_is_rejected() {
        let mut bytes = encode_binary(&cube_mesh(10.0));
        bytes.truncate(bytes.len() - TRIANGLE_LEN);
        let err = parse_binary(&bytes).unwrap_err();
        assert!(err.to_string().contains("declares 12 triangles"));
    }

    #[test]
    fn trailing_bytes_beyond_the_count_are_ignored() {
        let mut bytes = encode_binary(&cube_mesh(4.0));
        bytes.extend_from_slice(&[0xab; 7]);
        assert_eq!(parse_binary(&bytes).unwrap().len(), 12);
    }

    #[test]
    fn zero_triangles_parses_empty() {
        let bytes = encode_binary(&[]);
        assert_eq!(parse_binary(&bytes).unwrap(), Vec::new());
    }

    #[test]
    fn bounding_box_spans_all_vertices() {
        let (min, max) = bounding_box(&cube_mesh(10.0)).unwrap();
        assert_eq!(min, [-5.0, -5.0, -5.0]);
        assert_eq!(max, [5.0, 5.0, 5.0]);
    }

    #[test]
    fn bounding_box_of_nothing_is_none() {
        assert_eq!(bounding_box(&[]), None);
    }
}
