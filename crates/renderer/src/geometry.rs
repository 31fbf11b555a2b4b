//! Cover-fit sizing of the image plane.
//!
//! The camera is orthographic with a view of `[-aspect, aspect] x [-1, 1]`
//! where `aspect = width / height`. The plane is sized so that it always
//! covers that view while keeping the image's own aspect ratio; whichever
//! axis overflows is cropped.

use bytemuck::{Pod, Zeroable};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneSize {
    pub width: f32,
    pub height: f32,
}

/// Cover-fit plane for an image of aspect `image_aspect` shown on a screen of
/// aspect `screen_aspect`.
pub fn plane_dimensions(image_aspect: f32, screen_aspect: f32) -> PlaneSize {
    let image_aspect = sanitize_aspect(image_aspect);
    let screen_aspect = sanitize_aspect(screen_aspect);
    if screen_aspect > image_aspect {
        let width = 2.0 * screen_aspect;
        PlaneSize {
            width,
            height: width / image_aspect,
        }
    } else {
        PlaneSize {
            width: 2.0 * image_aspect,
            height: 2.0,
        }
    }
}

fn sanitize_aspect(aspect: f32) -> f32 {
    if aspect.is_finite() && aspect > 0.0 {
        aspect
    } else {
        1.0
    }
}

pub fn aspect_of(width: u32, height: u32) -> f32 {
    width.max(1) as f32 / height.max(1) as f32
}

/// Resolution reported to the shader: the logical window size scaled by the
/// display's pixel ratio, capped at `max_pixel_ratio`.
pub fn shader_resolution(
    physical: (u32, u32),
    scale_factor: f64,
    max_pixel_ratio: f32,
) -> [f32; 2] {
    let scale = if scale_factor.is_finite() && scale_factor > 0.0 {
        scale_factor as f32
    } else {
        1.0
    };
    let ratio = scale.min(max_pixel_ratio.max(f32::EPSILON));
    [
        physical.0 as f32 / scale * ratio,
        physical.1 as f32 / scale * ratio,
    ]
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PlaneVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
}

/// Two counter-clockwise triangles spanning the plane, centred on the origin.
pub fn plane_vertices(size: PlaneSize) -> [PlaneVertex; 6] {
    let hw = size.width * 0.5;
    let hh = size.height * 0.5;
    let bl = PlaneVertex {
        position: [-hw, -hh],
        uv: [0.0, 0.0],
    };
    let br = PlaneVertex {
        position: [hw, -hh],
        uv: [1.0, 0.0],
    };
    let tr = PlaneVertex {
        position: [hw, hh],
        uv: [1.0, 1.0],
    };
    let tl = PlaneVertex {
        position: [-hw, hh],
        uv: [0.0, 1.0],
    };
    [bl, br, tr, bl, tr, tl]
}

impl PlaneSize {
    /// Plane UV under the view-space point `(x, y)`.
    pub fn uv_at(&self, x: f32, y: f32) -> (f32, f32) {
        (x / self.width + 0.5, y / self.height + 0.5)
    }

    pub fn covers(&self, screen_aspect: f32) -> bool {
        let eps = 1e-4;
        self.width * 0.5 + eps >= screen_aspect && self.height * 0.5 + eps >= 1.0
    }
}
