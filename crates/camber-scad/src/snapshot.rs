//! Render port backed by a small software rasterizer: orthographic,
//! z-buffered projections of the last compiled mesh, PNG-encoded for the
//! multimodal verification request.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use camber_agent::artifact::ArtifactStore;
use camber_agent::ports::{ANGLE_LABELS, RenderPort, Snapshot};
use image::{GrayImage, ImageFormat, Luma};

use crate::error::Result;
use crate::stl::{self, Triangle, bounding_box};

pub const IMAGE_SIZE: u32 = 512;

/// Camera offsets for the verification angles, index-paired with
/// ANGLE_LABELS: perspective, front, top, side
const VIEW_DIRECTIONS: [[f32; 3]; 4] = [
    [1.0, 1.0, 1.0],
    [0.0, -1.0, 0.0],
    [0.0, 0.0, 1.0],
    [1.0, 0.0, 0.0],
];

/// Renders snapshots of whatever mesh the artifact store currently holds
pub struct SnapshotRenderer {
    store: Arc<ArtifactStore>,
    size: u32,
}

impl SnapshotRenderer {
    pub fn new(store: Arc<ArtifactStore>) -> Self {
        Self {
            store,
            size: IMAGE_SIZE,
        }
    }

    pub fn with_size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    fn triangles(&self) -> Result<Option<Vec<Triangle>>> {
        let Some(mesh) = self.store.latest_mesh() else {
            return Ok(None);
        };
        Ok(Some(stl::parse_binary(&mesh)?))
    }
}

impl RenderPort for SnapshotRenderer {
    fn capture_snapshot(&self) -> Option<Snapshot> {
        let triangles = match self.triangles() {
            Ok(Some(triangles)) => triangles,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("snapshot skipped: {e}");
                return None;
            }
        };
        match render_view(&triangles, VIEW_DIRECTIONS[0], self.size) {
            Ok(png_base64) => Some(Snapshot {
                label: ANGLE_LABELS[0],
                png_base64,
            }),
            Err(e) => {
                tracing::warn!("snapshot render failed: {e}");
                None
            }
        }
    }

    fn capture_multi_angle(&self) -> Vec<Snapshot> {
        let triangles = match self.triangles() {
            Ok(Some(triangles)) => triangles,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!("multi-angle capture skipped: {e}");
                return Vec::new();
            }
        };
        let mut snapshots = Vec::with_capacity(VIEW_DIRECTIONS.len());
        for (&label, direction) in ANGLE_LABELS.iter().zip(VIEW_DIRECTIONS) {
            match render_view(&triangles, direction, self.size) {
                Ok(png_base64) => snapshots.push(Snapshot { label, png_base64 }),
                Err(e) => {
                    tracing::warn!("multi-angle capture failed: {e}");
                    return Vec::new();
                }
            }
        }
        snapshots
    }

    fn export_binary(&self, path: &Path) -> camber_agent::Result<PathBuf> {
        let Some(mesh) = self.store.latest_mesh() else {
            return Err(camber_agent::Error::render("no compiled model to export"));
        };
        std::fs::write(path, mesh).map_err(|e| camber_agent::Error::render(e.to_string()))?;
        Ok(path.to_path_buf())
    }
}

/// Project the mesh orthographically along `direction` onto a white
/// square image, depth-tested, each face shaded by how squarely it faces
/// the camera. Returns the PNG as base64.
fn render_view(triangles: &[Triangle], direction: [f32; 3], size: u32) -> Result<String> {
    let forward = normalize(scale(direction, -1.0));
    // Z is up except when looking straight down it
    let up_hint = if direction[0] == 0.0 && direction[1] == 0.0 {
        [0.0, 1.0, 0.0]
    } else {
        [0.0, 0.0, 1.0]
    };
    let right = normalize(cross(forward, up_hint));
    let up = cross(right, forward);

    let (center, radius) = match bounding_box(triangles) {
        Some((min, max)) => {
            let center = [
                (min[0] + max[0]) / 2.0,
                (min[1] + max[1]) / 2.0,
                (min[2] + max[2]) / 2.0,
            ];
            let half = [
                (max[0] - min[0]) / 2.0,
                (max[1] - min[1]) / 2.0,
                (max[2] - min[2]) / 2.0,
            ];
            (center, length(half).max(f32::EPSILON))
        }
        None => ([0.0; 3], 1.0),
    };
    let pixels_per_unit = size as f32 * 0.45 / radius;
    let half_size = size as f32 / 2.0;

    let mut image = GrayImage::from_pixel(size, size, Luma([255u8]));
    let mut depth_buffer = vec![f32::INFINITY; (size * size) as usize];

    for triangle in triangles {
        let mut projected = [[0.0f32; 3]; 3];
        for (slot, vertex) in projected.iter_mut().zip(triangle.vertices) {
            let p = sub(vertex, center);
            *slot = [
                dot(p, right) * pixels_per_unit + half_size,
                half_size - dot(p, up) * pixels_per_unit,
                dot(p, forward),
            ];
        }
        let [a, b, c] = projected;

        let area = edge(a, b, c);
        if area.abs() < f32::EPSILON {
            continue;
        }

        // exporters sometimes zero the stored normal
        let mut normal = triangle.normal;
        if length(normal) < 1e-12 {
            normal = cross(
                sub(triangle.vertices[1], triangle.vertices[0]),
                sub(triangle.vertices[2], triangle.vertices[0]),
            );
        }
        let shade = if length(normal) < 1e-12 {
            128u8
        } else {
            (55.0 + 185.0 * dot(normalize(normal), forward).abs()) as u8
        };

        let x_min = a[0].min(b[0]).min(c[0]).floor().max(0.0) as u32;
        let x_max = (a[0].max(b[0]).max(c[0]).ceil() as i64).min(size as i64 - 1);
        let y_min = a[1].min(b[1]).min(c[1]).floor().max(0.0) as u32;
        let y_max = (a[1].max(b[1]).max(c[1]).ceil() as i64).min(size as i64 - 1);
        if x_max < 0 || y_max < 0 {
            continue;
        }

        for y in y_min..=y_max as u32 {
            for x in x_min..=x_max as u32 {
                let p = [x as f32 + 0.5, y as f32 + 0.5, 0.0];
                let w0 = edge(b, c, p);
                let w1 = edge(c, a, p);
                let w2 = edge(a, b, p);
                let inside = (w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0)
                    || (w0 <= 0.0 && w1 <= 0.0 && w2 <= 0.0);
                if !inside {
                    continue;
                }
                let depth = (w0 * a[2] + w1 * b[2] + w2 * c[2]) / area;
                let index = (y * size + x) as usize;
                if depth < depth_buffer[index] {
                    depth_buffer[index] = depth;
                    image.put_pixel(x, y, Luma([shade]));
                }
            }
        }
    }

    let mut png = Vec::new();
    image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(STANDARD.encode(png))
}

/// Signed doubled area of (a, b, p) in screen space
fn edge(a: [f32; 3], b: [f32; 3], p: [f32; 3]) -> f32 {
    (b[0] - a[0]) * (p[1] - a[1]) - (b[1] - a[1]) * (p[0] - a[0])
}

fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn scale(a: [f32; 3], k: f32) -> [f32; 3] {
    [a[0] * k, a[1] * k, a[2] * k]
}

fn dot(a: [f32; 3], b: [f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn length(a: [f32; 3]) -> f32 {
    dot(a, a).sqrt()
}

fn normalize(a: [f32; 3]) -> [f32; 3] {
    let len = length(a);
    if len == 0.0 { a } else { scale(a, 1.0 / len) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stl::{cube_mesh, encode_binary};

    fn store_with_cube() -> Arc<ArtifactStore> {
        let store = Arc::new(ArtifactStore::new());
        store.store_mesh(encode_binary(&cube_mesh(10.0)));
        store
    }

    fn decode_png(snapshot: &Snapshot) -> GrayImage {
        let png = STANDARD.decode(&snapshot.png_base64).unwrap();
        image::load_from_memory(&png).unwrap().to_luma8()
    }

    #[test]
    fn every_angle_draws_the_cube_over_a_white_background() {
        let renderer = SnapshotRenderer::new(store_with_cube()).with_size(64);
        let snapshots = renderer.capture_multi_angle();
        assert_eq!(snapshots.len(), 4);
        for snapshot in &snapshots {
            let img = decode_png(snapshot);
            assert_eq!(img.dimensions(), (64, 64));
            // the cube covers the image center; the corners stay background
            assert!(img.get_pixel(32, 32).0[0] < 250, "{}", snapshot.label);
            assert_eq!(img.get_pixel(0, 0).0[0], 255, "{}", snapshot.label);
        }
    }

    #[test]
    fn labels_follow_the_fixed_angle_order() {
        let renderer = SnapshotRenderer::new(store_with_cube()).with_size(32);
        let labels: Vec<_> = renderer
            .capture_multi_angle()
            .iter()
            .map(|s| s.label)
            .collect();
        assert_eq!(labels, ANGLE_LABELS);
    }

    #[test]
    fn head_on_faces_shade_brighter_than_oblique_ones() {
        let renderer = SnapshotRenderer::new(store_with_cube()).with_size(64);
        let snapshots = renderer.capture_multi_angle();
        let perspective = decode_png(&snapshots[0]).get_pixel(32, 32).0[0];
        let front = decode_png(&snapshots[1]).get_pixel(32, 32).0[0];
        assert!(front > perspective);
    }

    #[test]
    fn single_snapshot_is_the_perspective_view() {
        let renderer = SnapshotRenderer::new(store_with_cube()).with_size(32);
        let snapshot = renderer.capture_snapshot().unwrap();
        assert_eq!(snapshot.label, "Perspective view");
        decode_png(&snapshot);
    }

    #[test]
    fn no_mesh_yields_no_snapshots() {
        let renderer = SnapshotRenderer::new(Arc::new(ArtifactStore::new()));
        assert!(renderer.capture_snapshot().is_none());
        assert!(renderer.capture_multi_angle().is_empty());
    }

    #[test]
    fn malformed_mesh_bytes_are_skipped() {
        let store = Arc::new(ArtifactStore::new());
        store.store_mesh(b"not an stl".to_vec());
        let renderer = SnapshotRenderer::new(store);
        assert!(renderer.capture_snapshot().is_none());
        assert!(renderer.capture_multi_angle().is_empty());
    }

    #[test]
    fn export_writes_the_stored_mesh_verbatim() {
        let store = store_with_cube();
        let mesh = store.latest_mesh().unwrap();
        let renderer = SnapshotRenderer::new(store);
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("model.stl");
        let written = renderer.export_binary(&target).unwrap();
        assert_eq!(written, target);
        assert_eq!(std::fs::read(&target).unwrap(), mesh);
    }

    #[test]
    fn export_without_a_mesh_is_an_error() {
        let renderer = SnapshotRenderer::new(Arc::new(ArtifactStore::new()));
        let dir = tempfile::tempdir().unwrap();
        let err = renderer.export_binary(&dir.path().join("model.stl"));
        assert!(err.is_err());
    }
}
