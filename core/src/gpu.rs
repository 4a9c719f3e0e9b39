//! GPU side of the instance buffers.
//!
//! Renderers never talk to wgpu directly. They hand dirty rows to an
//! [`InstanceUploader`] once per frame; [`WgpuInstanceUploader`] turns those
//! into `write_buffer` calls on per-kind vertex buffers.

use std::collections::HashMap;

use codecity_common::RgbColor;
use codecity_scene::{AtlasRegion, Vertex};

use crate::instanced::{InstanceMatrix, MeshKind};

/// The per-instance attribute arrays a mesh kind can carry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum InstanceAttribute {
    Matrix,
    Color,
    LabelAtlas,
}

impl InstanceAttribute {
    /// Size in bytes of one row.
    pub fn stride(self) -> usize {
        match self {
            InstanceAttribute::Matrix => std::mem::size_of::<InstanceMatrix>(),
            InstanceAttribute::Color => std::mem::size_of::<RgbColor>(),
            InstanceAttribute::LabelAtlas => std::mem::size_of::<AtlasRegion>(),
        }
    }
}

/// Receives instance data from the renderers.
pub trait InstanceUploader {
    /// The buffer for `kind`/`attribute` must now hold exactly `capacity` rows.
    fn reallocate(&mut self, kind: MeshKind, attribute: InstanceAttribute, capacity: usize);

    /// Writes consecutive rows starting at `first_instance`.
    fn write(&mut self, kind: MeshKind, attribute: InstanceAttribute, first_instance: usize, bytes: &[u8]);
}

// Vertex shader attribute locations
enum ShaderLocations {
    VertexPosition = 0,
    TextureCoords,
    VertexNormal,
    InstanceTransformRow0,
    InstanceTransformRow1,
    InstanceTransformRow2,
    InstanceTransformRow3,
    InstanceColor,
    InstanceLabelAtlas,
}

/// Returns the vertex buffer layout of the shared box, label and arrow geometry.
pub fn vertex_buffer_layout() -> wgpu::VertexBufferLayout<'static> {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] = [
        wgpu::VertexAttribute {
            offset: 0,
            shader_location: ShaderLocations::VertexPosition as u32,
            format: wgpu::VertexFormat::Float32x3,
        },
        wgpu::VertexAttribute {
            offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
            shader_location: ShaderLocations::TextureCoords as u32,
            format: wgpu::VertexFormat::Float32x2,
        },
        wgpu::VertexAttribute {
            offset: std::mem::size_of::<[f32; 5]>() as wgpu::BufferAddress,
            shader_location: ShaderLocations::VertexNormal as u32,
            format: wgpu::VertexFormat::Float32x3,
        },
    ];

    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &ATTRIBUTES,
    }
}

/// Returns the per-instance buffer layout of one attribute.
///
/// Each attribute lives in its own buffer so that colors can be rewritten
/// without touching transforms.
pub fn instance_buffer_layout(attribute: InstanceAttribute) -> wgpu::VertexBufferLayout<'static> {
    const MATRIX: [wgpu::VertexAttribute; 4] = [
        wgpu::VertexAttribute {
            offset: 0,
            shader_location: ShaderLocations::InstanceTransformRow0 as u32,
            format: wgpu::VertexFormat::Float32x4,
        },
        wgpu::VertexAttribute {
            offset: std::mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
            shader_location: ShaderLocations::InstanceTransformRow1 as u32,
            format: wgpu::VertexFormat::Float32x4,
        },
        wgpu::VertexAttribute {
            offset: std::mem::size_of::<[f32; 4 * 2]>() as wgpu::BufferAddress,
            shader_location: ShaderLocations::InstanceTransformRow2 as u32,
            format: wgpu::VertexFormat::Float32x4,
        },
        wgpu::VertexAttribute {
            offset: std::mem::size_of::<[f32; 4 * 3]>() as wgpu::BufferAddress,
            shader_location: ShaderLocations::InstanceTransformRow3 as u32,
            format: wgpu::VertexFormat::Float32x4,
        },
    ];
    const COLOR: [wgpu::VertexAttribute; 1] = [wgpu::VertexAttribute {
        offset: 0,
        shader_location: ShaderLocations::InstanceColor as u32,
        format: wgpu::VertexFormat::Float32x3,
    }];
    const LABEL_ATLAS: [wgpu::VertexAttribute; 1] = [wgpu::VertexAttribute {
        offset: 0,
        shader_location: ShaderLocations::InstanceLabelAtlas as u32,
        format: wgpu::VertexFormat::Float32x3,
    }];

    let attributes: &'static [wgpu::VertexAttribute] = match attribute {
        InstanceAttribute::Matrix => &MATRIX,
        InstanceAttribute::Color => &COLOR,
        InstanceAttribute::LabelAtlas => &LABEL_ATLAS,
    };

    wgpu::VertexBufferLayout {
        array_stride: attribute.stride() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes,
    }
}

/// Uploads instance rows into wgpu vertex buffers, one buffer per kind and attribute.
pub struct WgpuInstanceUploader<'a> {
    device: &'a wgpu::Device,
    queue: &'a wgpu::Queue,
    buffers: &'a mut HashMap<(MeshKind, InstanceAttribute), wgpu::Buffer>,
}

impl<'a> WgpuInstanceUploader<'a> {
    /// # Arguments
    /// * `buffers` - Buffers owned by the caller's render pass, created and replaced here
    pub fn new(
        device: &'a wgpu::Device,
        queue: &'a wgpu::Queue,
        buffers: &'a mut HashMap<(MeshKind, InstanceAttribute), wgpu::Buffer>,
    ) -> Self {
        Self { device, queue, buffers }
    }
}

impl InstanceUploader for WgpuInstanceUploader<'_> {
    fn reallocate(&mut self, kind: MeshKind, attribute: InstanceAttribute, capacity: usize) {
        log::debug!("Reallocating {:?} {:?} buffer for {} instances", kind, attribute, capacity);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Instance Attribute Buffer"),
            size: (capacity * attribute.stride()) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.buffers.insert((kind, attribute), buffer);
    }

    fn write(&mut self, kind: MeshKind, attribute: InstanceAttribute, first_instance: usize, bytes: &[u8]) {
        match self.buffers.get(&(kind, attribute)) {
            Some(buffer) => {
                let offset = (first_instance * attribute.stride()) as wgpu::BufferAddress;
                self.queue.write_buffer(buffer, offset, bytes);
            }
            None => log::error!("No {:?} {:?} buffer allocated, dropping upload", kind, attribute),
        }
    }
}
