//! CPU evaluation of the water surface shader.
//!
//! Mirrors the fragment shader in `compile.rs` term for term so single frames
//! can be rendered without a GPU (still export) and so the shading math can
//! be unit-tested.

use glam::{Vec2, Vec3, Vec4};
use image::{Rgba, RgbaImage};

use crate::geometry::PlaneSize;
use crate::ripples::{RippleSlot, RIPPLE_SLOTS};

const RIPPLE_SPEED: f32 = 0.3;
const RIPPLE_WIDTH: f32 = 0.05;
const RIPPLE_STRENGTH: f32 = 0.008;
const ABERRATION_THRESHOLD: f32 = 0.005;

/// Something that can be sampled like a `sampler2D` with clamp-to-edge
/// addressing. `uv = (0, 0)` is the bottom-left corner.
pub trait TextureSampler {
    fn sample(&self, uv: Vec2) -> Vec4;
}

/// Uniform colour, mostly useful in tests.
#[derive(Debug, Clone, Copy)]
pub struct SolidColor(pub Vec4);

impl TextureSampler for SolidColor {
    fn sample(&self, _uv: Vec2) -> Vec4 {
        self.0
    }
}

/// Bilinear sampler over an image whose rows are stored bottom-up, as
/// produced by [`crate::loader::decode_image`].
pub struct ImageSampler<'a> {
    image: &'a RgbaImage,
}

impl<'a> ImageSampler<'a> {
    pub fn new(image: &'a RgbaImage) -> Self {
        Self { image }
    }

    fn texel(&self, x: i64, y: i64) -> Vec4 {
        let (width, height) = self.image.dimensions();
        let x = x.clamp(0, width as i64 - 1) as u32;
        let y = y.clamp(0, height as i64 - 1) as u32;
        let [r, g, b, a] = self.image.get_pixel(x, y).0;
        Vec4::new(r as f32, g as f32, b as f32, a as f32) / 255.0
    }
}

impl TextureSampler for ImageSampler<'_> {
    fn sample(&self, uv: Vec2) -> Vec4 {
        let (width, height) = self.image.dimensions();
        if width == 0 || height == 0 {
            return Vec4::ZERO;
        }
        let u = if uv.x.is_finite() { uv.x.clamp(0.0, 1.0) } else { 0.0 };
        let v = if uv.y.is_finite() { uv.y.clamp(0.0, 1.0) } else { 0.0 };
        let px = u * width as f32 - 0.5;
        let py = v * height as f32 - 0.5;
        let x0 = px.floor();
        let y0 = py.floor();
        let fx = px - x0;
        let fy = py - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);
        let lower = self.texel(x0, y0).lerp(self.texel(x0 + 1, y0), fx);
        let upper = self.texel(x0, y0 + 1).lerp(self.texel(x0 + 1, y0 + 1), fx);
        lower.lerp(upper, fy)
    }
}

/// Per-frame shader inputs.
#[derive(Debug, Clone, Copy)]
pub struct ShadeParams {
    pub time: f32,
    pub mix: f32,
    pub ripples: [RippleSlot; RIPPLE_SLOTS],
    pub ripple_count: usize,
}

fn fract(x: Vec3) -> Vec3 {
    x - x.floor()
}

fn mod289_3(x: Vec3) -> Vec3 {
    x - (x * (1.0 / 289.0)).floor() * 289.0
}

fn mod289_2(x: Vec2) -> Vec2 {
    x - (x * (1.0 / 289.0)).floor() * 289.0
}

fn permute(x: Vec3) -> Vec3 {
    mod289_3((x * 34.0 + 1.0) * x)
}

/// Seedless 2D simplex noise in roughly `[-1, 1]`.
pub fn snoise(v: Vec2) -> f32 {
    const C: Vec4 = Vec4::new(
        0.211_324_87,
        0.366_025_42,
        -0.577_350_26,
        0.024_390_243,
    );
    let i = (v + Vec2::splat(v.dot(Vec2::splat(C.y)))).floor();
    let x0 = v - i + Vec2::splat(i.dot(Vec2::splat(C.x)));
    let i1 = if x0.x > x0.y {
        Vec2::new(1.0, 0.0)
    } else {
        Vec2::new(0.0, 1.0)
    };
    let x12 = Vec4::new(x0.x, x0.y, x0.x, x0.y) + Vec4::new(C.x, C.x, C.z, C.z);
    let x12 = Vec4::new(x12.x - i1.x, x12.y - i1.y, x12.z, x12.w);
    let i = mod289_2(i);
    let p = permute(
        permute(Vec3::splat(i.y) + Vec3::new(0.0, i1.y, 1.0))
            + Vec3::splat(i.x)
            + Vec3::new(0.0, i1.x, 1.0),
    );
    let x12_xy = Vec2::new(x12.x, x12.y);
    let x12_zw = Vec2::new(x12.z, x12.w);
    let mut m = (Vec3::splat(0.5) - Vec3::new(x0.dot(x0), x12_xy.dot(x12_xy), x12_zw.dot(x12_zw)))
        .max(Vec3::ZERO);
    m = m * m;
    m = m * m;
    let x = 2.0 * fract(p * C.w) - 1.0;
    let h = x.abs() - 0.5;
    let ox = (x + 0.5).floor();
    let a0 = x - ox;
    m *= Vec3::splat(1.792_842_9) - 0.853_734_7 * (a0 * a0 + h * h);
    let g = Vec3::new(
        a0.x * x0.x + h.x * x0.y,
        a0.y * x12.x + h.y * x12.y,
        a0.z * x12.z + h.z * x12.w,
    );
    130.0 * m.dot(g)
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn mix(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}

/// Ambient swell added to both UV axes.
pub fn ambient_wave(uv: Vec2, time: f32) -> f32 {
    let first = (uv.x * 10.0 + time * 0.5).sin() * (uv.y * 8.0 + time * 0.3).cos() * 0.001;
    let second = (uv.x * 15.0 - time * 0.4).sin() * (uv.y * 12.0 - time * 0.6).cos() * 0.0008;
    first + second
}

pub fn caustics(uv: Vec2, time: f32) -> f32 {
    let mut c = snoise(uv * 8.0 + Vec2::splat(time * 0.2)) * 0.5 + 0.5;
    c += snoise(uv * 12.0 - Vec2::splat(time * 0.15)) * 0.3;
    c * c * 0.005
}

/// Summed ripple displacement and signed ripple intensity at `uv`.
pub fn ripple_field(uv: Vec2, params: &ShadeParams) -> (Vec2, f32) {
    let mut distortion = Vec2::ZERO;
    let mut total = 0.0;
    for slot in params.ripples.iter().take(params.ripple_count.min(RIPPLE_SLOTS)) {
        let diff = uv - Vec2::new(slot.x, slot.y);
        let dist = diff.length();
        let age = params.time - slot.created_at;
        let radius = age * RIPPLE_SPEED;
        let decay = (-age * 2.0).exp();
        let offset = dist - radius;
        let wave1 = (offset * 40.0).sin() * decay;
        let wave2 = (offset * 60.0).sin() * decay * 0.5;
        let wave3 = (offset * 50.0).cos() * decay * 0.3;
        let mask = smoothstep(radius + RIPPLE_WIDTH, radius, dist)
            * smoothstep(radius - RIPPLE_WIDTH * 3.0, radius, dist);
        let strength = (wave1 + wave2 + wave3) * mask * RIPPLE_STRENGTH;
        total += strength;
        if dist > 0.001 {
            distortion += diff.normalize() * strength;
        }
    }
    (distortion, total)
}

/// Colour of the surface at plane coordinate `uv`, tone mapped into `[0, 1)`.
pub fn shade(
    uv: Vec2,
    params: &ShadeParams,
    current: &dyn TextureSampler,
    next: &dyn TextureSampler,
) -> Vec3 {
    let ambient = ambient_wave(uv, params.time);
    let caustic = caustics(uv, params.time);
    let (distortion, total) = ripple_field(uv, params);

    let final_uv = uv + distortion + Vec2::splat(ambient);
    let first = current.sample(final_uv);
    let second = next.sample(final_uv);
    let texel = first * (1.0 - params.mix) + second * params.mix;

    let mut color = texel.truncate();
    color += Vec3::splat(caustic * 0.3);

    let fresnel = (uv - Vec2::splat(0.5)).length() * 1.5;
    color += Vec3::splat(fresnel * fresnel * 0.03);

    let specular = (total * 10.0).max(0.0).powi(3) * 0.2;
    color += Vec3::new(1.0, 1.0, 0.95) * specular;

    if total.abs() > ABERRATION_THRESHOLD {
        let aberration = total * 2.0 * 0.002;
        let red = current.sample(final_uv + Vec2::new(aberration, 0.0)).x;
        let blue = current.sample(final_uv - Vec2::new(aberration, 0.0)).z;
        color.x = mix(color.x, red, 0.3);
        color.z = mix(color.z, blue, 0.3);
    }

    let color = color / (color + Vec3::ONE);
    color.max(Vec3::ZERO).powf(0.98)
}

/// Renders a full frame with the cover-fit plane centred in an orthographic
/// view of `[-aspect, aspect] x [-1, 1]`. Output rows run top-down.
pub fn render_frame(
    width: u32,
    height: u32,
    plane: PlaneSize,
    params: &ShadeParams,
    current: &dyn TextureSampler,
    next: &dyn TextureSampler,
) -> RgbaImage {
    let aspect = width.max(1) as f32 / height.max(1) as f32;
    RgbaImage::from_fn(width, height, |px, py| {
        let view_x = ((px as f32 + 0.5) / width as f32 * 2.0 - 1.0) * aspect;
        let view_y = 1.0 - (py as f32 + 0.5) / height as f32 * 2.0;
        let (u, v) = plane.uv_at(view_x, view_y);
        let color = shade(Vec2::new(u, v), params, current, next);
        let to_byte = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        Rgba([to_byte(color.x), to_byte(color.y), to_byte(color.z), 255])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ripples::RippleStore;
    use std::time::Duration;

    fn params(time: f32, mix: f32, store: &RippleStore) -> ShadeParams {
        ShadeParams {
            time,
            mix,
            ripples: store.export(),
            ripple_count: store.len(),
        }
    }

    fn empty_store() -> RippleStore {
        RippleStore::new(RIPPLE_SLOTS, Duration::from_secs(3))
    }

    const RED: SolidColor = SolidColor(Vec4::new(1.0, 0.0, 0.0, 1.0));
    const BLUE: SolidColor = SolidColor(Vec4::new(0.0, 0.0, 1.0, 1.0));
    const GREEN: SolidColor = SolidColor(Vec4::new(0.0, 1.0, 0.0, 1.0));

    #[test]
    fn noise_is_deterministic_and_bounded() {
        for i in 0..200 {
            let p = Vec2::new(i as f32 * 0.37 - 20.0, i as f32 * 0.11 + 3.0);
            let value = snoise(p);
            assert_eq!(value, snoise(p));
            assert!(value.abs() <= 1.1, "snoise({p}) = {value}");
        }
    }

    #[test]
    fn shading_is_deterministic() {
        let mut store = empty_store();
        store.add(0.4, 0.6, 0.2);
        let params = params(0.5, 0.3, &store);
        let uv = Vec2::new(0.45, 0.58);
        assert_eq!(shade(uv, &params, &RED, &BLUE), shade(uv, &params, &RED, &BLUE));
    }

    #[test]
    fn sentinel_slots_contribute_nothing() {
        let mut store = empty_store();
        store.add(0.5, 0.5, 1.0);
        let one = params(1.2, 0.0, &store);
        let all = ShadeParams {
            ripple_count: RIPPLE_SLOTS,
            ..one
        };
        for uv in [Vec2::new(0.5, 0.56), Vec2::new(0.1, 0.9), Vec2::new(0.55, 0.5)] {
            assert_eq!(ripple_field(uv, &one), ripple_field(uv, &all));
        }
    }

    #[test]
    fn mix_selects_texture() {
        let store = empty_store();
        let uv = Vec2::new(0.3, 0.7);
        let start = params(1.0, 0.0, &store);
        assert_eq!(shade(uv, &start, &RED, &BLUE), shade(uv, &start, &RED, &GREEN));
        let end = params(1.0, 1.0, &store);
        assert_eq!(shade(uv, &end, &RED, &BLUE), shade(uv, &end, &GREEN, &BLUE));
    }

    #[test]
    fn ripple_ring_distorts_near_its_radius() {
        let mut store = empty_store();
        store.add(0.5, 0.5, 0.0);
        let params = params(0.5, 0.0, &store);
        let on_ring = Vec2::new(0.5 + 0.15, 0.5);
        let far = Vec2::new(0.95, 0.95);
        let (_, near_total) = ripple_field(on_ring + Vec2::new(0.01, 0.0), &params);
        let (far_distortion, far_total) = ripple_field(far, &params);
        assert!(near_total.abs() > 0.0);
        assert_eq!(far_total, 0.0);
        assert_eq!(far_distortion, Vec2::ZERO);
    }

    #[test]
    fn output_is_tone_mapped() {
        let white = SolidColor(Vec4::ONE);
        let store = empty_store();
        let color = shade(Vec2::new(0.5, 0.5), &params(0.0, 0.0, &store), &white, &white);
        for channel in color.to_array() {
            assert!(channel > 0.45 && channel < 1.0, "channel {channel}");
        }
    }

    #[test]
    fn image_sampler_reads_bottom_up_rows() {
        let mut image = RgbaImage::new(1, 2);
        image.put_pixel(0, 0, Rgba([0, 0, 255, 255]));
        image.put_pixel(0, 1, Rgba([255, 0, 0, 255]));
        let sampler = ImageSampler::new(&image);
        assert_eq!(sampler.sample(Vec2::new(0.5, 0.0)), Vec4::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(sampler.sample(Vec2::new(0.5, 1.0)), Vec4::new(1.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn renders_full_frame() {
        let store = empty_store();
        let frame = render_frame(
            8,
            4,
            PlaneSize {
                width: 4.0,
                height: 2.0,
            },
            &params(0.0, 0.0, &store),
            &RED,
            &RED,
        );
        assert_eq!(frame.dimensions(), (8, 4));
        let pixel = frame.get_pixel(4, 2).0;
        assert!(pixel[0] > pixel[1] && pixel[0] > pixel[2]);
        assert_eq!(pixel[3], 255);
    }
}
