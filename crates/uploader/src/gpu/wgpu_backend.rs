use std::borrow::Cow;

use image::imageops;
use media::{Dimensions, RgbaImage};

use super::{ApiVersion, GpuBackend, InternalFormat, StorageDescriptor};
use crate::errors::BackendError;
use crate::texture::{Filter, PixelFormat, SamplerParams, Wrap};

/// A [GpuBackend] on top of a `wgpu` device.
#[derive(Debug, Clone)]
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
}

/// A texture created by [WgpuBackend], with a view and sampler ready for
/// binding.
#[derive(Debug)]
pub struct WgpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    descriptor: StorageDescriptor,
}

impl WgpuTexture {
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

    pub fn descriptor(&self) -> &StorageDescriptor {
        &self.descriptor
    }
}

impl WgpuBackend {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self { device, queue }
    }

    /// Create a device with no surface, blocking until it's ready.
    pub fn request_headless() -> Result<Self, BackendError> {
        pollster::block_on(async {
            let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
                backends: wgpu::Backends::PRIMARY,
                ..Default::default()
            });

            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::default(),
                    compatible_surface: None,
                    force_fallback_adapter: false,
                })
                .await?;

            let (device, queue) = adapter
                .request_device(&wgpu::DeviceDescriptor {
                    label: Some("uploader"),
                    required_features: wgpu::Features::empty(),
                    experimental_features: wgpu::ExperimentalFeatures::disabled(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                    trace: wgpu::Trace::Off,
                })
                .await?;

            Ok::<_, BackendError>(Self::new(device, queue))
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
}

impl GpuBackend for WgpuBackend {
    type Handle = WgpuTexture;

    fn api(&self) -> ApiVersion {
        ApiVersion::Modern
    }

    fn create_texture(
        &mut self,
        descriptor: &StorageDescriptor,
    ) -> Result<WgpuTexture, BackendError> {
        let max_levels = descriptor.size.max_side().ilog2() + 1;
        if descriptor.level_count == 0 || descriptor.level_count > max_levels {
            return Err(BackendError::LevelOutOfRange {
                level: descriptor.level_count.saturating_sub(1),
                level_count: max_levels,
            });
        }

        // Every level exists (zeroed) from here on. Allocating one later is
        // only a size check.
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("uploader/texture"),
            size: wgpu::Extent3d {
                width: descriptor.size.width(),
                height: descriptor.size.height(),
                depth_or_array_layers: 1,
            },
            mip_level_count: descriptor.level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: texture_format(descriptor.format),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = create_sampler(&self.device, &descriptor.sampler, descriptor.level_count);

        Ok(WgpuTexture {
            texture,
            view,
            sampler,
            descriptor: *descriptor,
        })
    }

    fn allocate_level(
        &mut self,
        handle: &WgpuTexture,
        level: u32,
        size: Dimensions,
    ) -> Result<(), BackendError> {
        let level_size = level_size(handle, level)?;
        if level_size != size {
            return Err(BackendError::LevelSizeMismatch {
                level,
                level_width: level_size.width(),
                level_height: level_size.height(),
                width: size.width(),
                height: size.height(),
            });
        }
        Ok(())
    }

    fn write_region(
        &mut self,
        handle: &WgpuTexture,
        level: u32,
        x: u32,
        y: u32,
        pixels: &RgbaImage,
    ) -> Result<(), BackendError> {
        let level_size = level_size(handle, level)?;
        let (width, height) = pixels.dimensions();
        if width == 0 || height == 0 {
            return Ok(());
        }
        if x + width > level_size.width() || y + height > level_size.height() {
            return Err(BackendError::RegionOutOfBounds {
                level,
                x,
                y,
                width,
                height,
                level_width: level_size.width(),
                level_height: level_size.height(),
            });
        }

        let sampler = &handle.descriptor.sampler;
        let mut pixels = Cow::Borrowed(pixels);
        let mut y = y;
        if sampler.flip_y {
            pixels = Cow::Owned(imageops::flip_vertical(&*pixels));
            y = level_size.height() - y - height;
        }
        if sampler.premultiply_alpha {
            let mut owned = pixels.into_owned();
            premultiply(&mut owned);
            pixels = Cow::Owned(owned);
        }

        let format = handle.descriptor.format;
        let data = convert_texels(&pixels, format);
        let bytes_per_row = width * bytes_per_texel(format);

        let expected = (bytes_per_row * height) as usize;
        if data.len() != expected {
            return Err(BackendError::DataSizeMismatch {
                expected,
                actual: data.len(),
            });
        }

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &handle.texture,
                mip_level: level,
                origin: wgpu::Origin3d { x, y, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            &data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );

        Ok(())
    }

    fn delete_texture(&mut self, handle: WgpuTexture) {
        handle.texture.destroy();
    }
}

fn level_size(handle: &WgpuTexture, level: u32) -> Result<Dimensions, BackendError> {
    handle
        .descriptor
        .level_size(level)
        .ok_or(BackendError::LevelOutOfRange {
            level,
            level_count: handle.descriptor.level_count,
        })
}

/// `wgpu` has no three-channel formats, so RGB storage is widened to RGBA.
fn texture_format(format: InternalFormat) -> wgpu::TextureFormat {
    match format {
        InternalFormat::R8 | InternalFormat::Unsized(PixelFormat::Red) => {
            wgpu::TextureFormat::R8Unorm
        }
        InternalFormat::R16F => wgpu::TextureFormat::R16Float,
        InternalFormat::R32F => wgpu::TextureFormat::R32Float,
        InternalFormat::Rgb8
        | InternalFormat::Rgba8
        | InternalFormat::Unsized(PixelFormat::Rgb | PixelFormat::Rgba) => {
            wgpu::TextureFormat::Rgba8Unorm
        }
        InternalFormat::Rgb16F | InternalFormat::Rgba16F => wgpu::TextureFormat::Rgba16Float,
        InternalFormat::Rgb32F | InternalFormat::Rgba32F => wgpu::TextureFormat::Rgba32Float,
    }
}

fn bytes_per_texel(format: InternalFormat) -> u32 {
    match texture_format(format) {
        wgpu::TextureFormat::R8Unorm => 1,
        wgpu::TextureFormat::R16Float => 2,
        wgpu::TextureFormat::R32Float | wgpu::TextureFormat::Rgba8Unorm => 4,
        wgpu::TextureFormat::Rgba16Float => 8,
        _ => 16,
    }
}

/// Turn 8-bit RGBA texels into the bytes `format` stores.
fn convert_texels(pixels: &RgbaImage, format: InternalFormat) -> Vec<u8> {
    let unorm = |v: u8| v as f32 / 255.0;

    match texture_format(format) {
        wgpu::TextureFormat::Rgba8Unorm => pixels.as_raw().clone(),
        wgpu::TextureFormat::R8Unorm => pixels.pixels().map(|p| p.0[0]).collect(),
        wgpu::TextureFormat::R16Float => pixels
            .pixels()
            .flat_map(|p| f16_bits(unorm(p.0[0])).to_le_bytes())
            .collect(),
        wgpu::TextureFormat::R32Float => pixels
            .pixels()
            .flat_map(|p| unorm(p.0[0]).to_le_bytes())
            .collect(),
        wgpu::TextureFormat::Rgba16Float => pixels
            .as_raw()
            .iter()
            .flat_map(|&v| f16_bits(unorm(v)).to_le_bytes())
            .collect(),
        _ => pixels
            .as_raw()
            .iter()
            .flat_map(|&v| unorm(v).to_le_bytes())
            .collect(),
    }
}

/// Half-float bits of `value`, which must be `0.0` or a normal number in
/// `[2^-14, 1.0]` (every non-zero `n / 255` is).
fn f16_bits(value: f32) -> u16 {
    if value <= 0.0 {
        return 0;
    }

    let bits = value.to_bits();
    let mut exponent = ((bits >> 23) & 0xFF) as i32 - 127 + 15;
    let mut mantissa = ((bits & 0x7F_FFFF) + 0x1000) >> 13;
    if mantissa == 0x400 {
        mantissa = 0;
        exponent += 1;
    }
    ((exponent as u16) << 10) | mantissa as u16
}

fn premultiply(pixels: &mut RgbaImage) {
    for pixel in pixels.pixels_mut() {
        let alpha = pixel.0[3] as u32;
        for channel in &mut pixel.0[..3] {
            *channel = ((*channel as u32 * alpha + 127) / 255) as u8;
        }
    }
}

fn create_sampler(
    device: &wgpu::Device,
    params: &SamplerParams,
    level_count: u32,
) -> wgpu::Sampler {
    let uses_mipmaps = params.min_filter.uses_mipmaps() && level_count > 1;

    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("uploader/sampler"),
        address_mode_u: address_mode(params.wrap_s),
        address_mode_v: address_mode(params.wrap_t),
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: filter_mode(params.mag_filter),
        min_filter: filter_mode(params.min_filter),
        mipmap_filter: mipmap_filter_mode(params.min_filter),
        lod_max_clamp: if uses_mipmaps {
            (level_count - 1) as f32
        } else {
            0.0
        },
        ..Default::default()
    })
}

fn address_mode(wrap: Wrap) -> wgpu::AddressMode {
    match wrap {
        Wrap::Repeat => wgpu::AddressMode::Repeat,
        Wrap::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        Wrap::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
    }
}

fn filter_mode(filter: Filter) -> wgpu::FilterMode {
    match filter {
        Filter::Nearest | Filter::NearestMipmapNearest | Filter::NearestMipmapLinear => {
            wgpu::FilterMode::Nearest
        }
        Filter::Linear | Filter::LinearMipmapNearest | Filter::LinearMipmapLinear => {
            wgpu::FilterMode::Linear
        }
    }
}

fn mipmap_filter_mode(filter: Filter) -> wgpu::MipmapFilterMode {
    match filter {
        Filter::NearestMipmapLinear | Filter::LinearMipmapLinear => wgpu::MipmapFilterMode::Linear,
        _ => wgpu::MipmapFilterMode::Nearest,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_floats_match_known_values() {
        assert_eq!(f16_bits(0.0), 0x0000);
        assert_eq!(f16_bits(1.0), 0x3C00);
        assert_eq!(f16_bits(0.5), 0x3800);
        assert_eq!(f16_bits(0.25), 0x3400);
    }

    #[test]
    fn texels_are_converted_per_format() {
        let pixels = RgbaImage::from_pixel(2, 1, image::Rgba([255, 0, 0, 255]));

        assert_eq!(convert_texels(&pixels, InternalFormat::Rgba8).len(), 8);
        assert_eq!(convert_texels(&pixels, InternalFormat::R8), vec![255, 255]);
        assert_eq!(
            convert_texels(&pixels, InternalFormat::R32F),
            [1.0f32.to_le_bytes(); 2].concat()
        );
        assert_eq!(convert_texels(&pixels, InternalFormat::Rgb16F).len(), 2 * 8);
        for format in [
            InternalFormat::R16F,
            InternalFormat::Rgba32F,
            InternalFormat::Unsized(PixelFormat::Rgb),
        ] {
            assert_eq!(
                convert_texels(&pixels, format).len() as u32,
                2 * bytes_per_texel(format)
            );
        }
    }

    #[test]
    fn rgb_storage_is_widened() {
        assert_eq!(texture_format(InternalFormat::Rgb8), wgpu::TextureFormat::Rgba8Unorm);
        assert_eq!(texture_format(InternalFormat::Rgb32F), wgpu::TextureFormat::Rgba32Float);
    }

    #[test]
    fn premultiplying_scales_colour_by_alpha() {
        let mut pixels = RgbaImage::from_pixel(1, 1, image::Rgba([200, 100, 255, 128]));
        premultiply(&mut pixels);
        assert_eq!(pixels.get_pixel(0, 0).0, [100, 50, 128, 128]);
    }

    #[test]
    fn trilinear_filters_map_to_linear_mipmaps() {
        assert_eq!(mipmap_filter_mode(Filter::LinearMipmapLinear), wgpu::MipmapFilterMode::Linear);
        assert_eq!(filter_mode(Filter::NearestMipmapLinear), wgpu::FilterMode::Nearest);
        assert_eq!(address_mode(Wrap::MirroredRepeat), wgpu::AddressMode::MirrorRepeat);
    }
}
