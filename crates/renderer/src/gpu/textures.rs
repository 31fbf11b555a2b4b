use std::borrow::Cow;
use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::RgbaImage;
use wgpu::util::{DeviceExt, TextureDataOrder};

use crate::scene::SurfaceImage;

/// A decoded slide living on the GPU.
///
/// Textures are shared between the scene and the bind group cache through
/// `Arc`; `id` identifies the upload so the renderer can tell when the pair
/// of bound images changed.
#[derive(Debug)]
pub(crate) struct ImageTexture {
    pub id: u64,
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl ImageTexture {
    /// Uploads RGBA rows (bottom row first) as an `Rgba8Unorm` texture,
    /// shrinking images that exceed the device limit.
    pub fn upload(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        image: &RgbaImage,
        id: u64,
        max_dimension: u32,
    ) -> Self {
        let image = fit_to_limit(image, max_dimension);
        let (width, height) = image.dimensions();
        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some(&format!("slide texture #{id}")),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            TextureDataOrder::LayerMajor,
            image.as_raw(),
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            id,
            texture,
            view,
            width,
            height,
        }
    }

    pub fn destroy(&self) {
        self.texture.destroy();
    }
}

impl SurfaceImage for Arc<ImageTexture> {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

fn fit_to_limit(image: &RgbaImage, max_dimension: u32) -> Cow<'_, RgbaImage> {
    let (width, height) = image.dimensions();
    let longest = width.max(height);
    if longest <= max_dimension || max_dimension == 0 {
        return Cow::Borrowed(image);
    }
    let scale = max_dimension as f64 / longest as f64;
    let target_width = ((width as f64 * scale).round() as u32).clamp(1, max_dimension);
    let target_height = ((height as f64 * scale).round() as u32).clamp(1, max_dimension);
    tracing::warn!(
        width,
        height,
        target_width,
        target_height,
        "image exceeds GPU texture limit; downscaling"
    );
    Cow::Owned(imageops::resize(
        image,
        target_width,
        target_height,
        FilterType::Triangle,
    ))
}

/// Linear, clamp-to-edge sampler shared by both slide bindings.
pub(crate) fn create_slide_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("slide sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_images_are_not_copied() {
        let image = RgbaImage::new(64, 32);
        assert!(matches!(fit_to_limit(&image, 8192), Cow::Borrowed(_)));
    }

    #[test]
    fn oversized_images_keep_aspect() {
        let image = RgbaImage::new(400, 100);
        let fitted = fit_to_limit(&image, 200);
        assert_eq!(fitted.dimensions(), (200, 50));
    }
}
