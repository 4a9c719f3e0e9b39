use std::ops::Range;

use cgmath::Matrix4;
use codecity_common::RgbColor;
use codecity_scene::AtlasRegion;

use crate::gpu::{InstanceAttribute, InstanceUploader};
use crate::instanced::MeshKind;

/// Column-major 4x4 transform as uploaded to the GPU.
pub type InstanceMatrix = [[f32; 4]; 4];

/// Matrix that collapses an instance to a point, hiding it without freeing its slot.
pub fn hidden_matrix() -> InstanceMatrix {
    Matrix4::from_scale(0.0).into()
}

/// One per-instance attribute array with dirty-range tracking.
///
/// Writes that do not change a row leave the channel clean, so redundant
/// recolors and re-transforms never reach the GPU. Dirty rows are merged into
/// one contiguous range and drained once per frame by [`flush`](Self::flush).
#[derive(Debug, Clone)]
pub struct InstanceChannel<T> {
    data: Vec<T>,
    dirty: Option<Range<usize>>,
    /// Set when the row count changed; the next flush reallocates and uploads everything.
    reallocated: bool,
}

impl<T: bytemuck::Pod + PartialEq> InstanceChannel<T> {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            dirty: None,
            reallocated: false,
        }
    }

    /// Sizes the channel to exactly `count` rows filled with `fill`.
    ///
    /// Returns true when the size changed, i.e. the GPU buffer must be
    /// reallocated. Rows are kept as they are when the size matches.
    pub fn resize(&mut self, count: usize, fill: T) -> bool {
        if self.data.len() == count {
            return false;
        }
        self.data.clear();
        self.data.resize(count, fill);
        self.dirty = None;
        self.reallocated = true;
        true
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.data.get(index)
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Writes a row. Out-of-range indices are ignored and return false.
    pub fn set(&mut self, index: usize, value: T) -> bool {
        let Some(row) = self.data.get_mut(index) else {
            return false;
        };
        if *row != value {
            *row = value;
            self.mark_dirty(index);
        }
        true
    }

    fn mark_dirty(&mut self, index: usize) {
        self.dirty = Some(match self.dirty.take() {
            Some(range) => range.start.min(index)..range.end.max(index + 1),
            None => index..index + 1,
        });
    }

    /// The rows written since the last flush.
    pub fn dirty_range(&self) -> Option<Range<usize>> {
        if self.reallocated {
            Some(0..self.data.len())
        } else {
            self.dirty.clone()
        }
    }

    pub fn needs_upload(&self) -> bool {
        self.reallocated || self.dirty.is_some()
    }

    /// Sends pending rows to the uploader and clears the dirty state.
    ///
    /// Returns the number of uploader calls made.
    pub fn flush(
        &mut self,
        kind: MeshKind,
        attribute: InstanceAttribute,
        uploader: &mut dyn InstanceUploader,
    ) -> usize {
        let mut calls = 0;
        if self.reallocated {
            uploader.reallocate(kind, attribute, self.data.len());
            calls += 1;
        }
        if let Some(range) = self.dirty_range().filter(|range| !range.is_empty()) {
            let first = range.start;
            uploader.write(kind, attribute, first, bytemuck::cast_slice(&self.data[range]));
            calls += 1;
        }
        self.reallocated = false;
        self.dirty = None;
        calls
    }
}

impl<T: bytemuck::Pod + PartialEq> Default for InstanceChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Transform and color rows of one box category.
#[derive(Debug, Clone, Default)]
pub struct BoxInstances {
    pub matrices: InstanceChannel<InstanceMatrix>,
    pub colors: InstanceChannel<RgbColor>,
}

impl BoxInstances {
    /// Sizes both channels. Returns true if the buffers were reallocated.
    pub fn resize(&mut self, count: usize) -> bool {
        let matrices = self.matrices.resize(count, hidden_matrix());
        let colors = self.colors.resize(count, RgbColor::BLACK);
        matrices || colors
    }

    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }

    pub fn needs_upload(&self) -> bool {
        self.matrices.needs_upload() || self.colors.needs_upload()
    }

    pub fn flush(&mut self, kind: MeshKind, uploader: &mut dyn InstanceUploader) -> usize {
        self.matrices.flush(kind, InstanceAttribute::Matrix, uploader)
            + self.colors.flush(kind, InstanceAttribute::Color, uploader)
    }
}

/// Transform and atlas rows of one label category.
#[derive(Debug, Clone, Default)]
pub struct LabelInstances {
    pub matrices: InstanceChannel<InstanceMatrix>,
    pub atlas: InstanceChannel<AtlasRegion>,
    /// Box index owning each label slot.
    pub owners: Vec<Option<usize>>,
}

impl LabelInstances {
    pub fn resize(&mut self, count: usize) -> bool {
        self.owners.clear();
        self.owners.resize(count, None);
        let matrices = self.matrices.resize(count, hidden_matrix());
        let atlas = self.atlas.resize(count, AtlasRegion::default());
        matrices || atlas
    }

    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }

    pub fn needs_upload(&self) -> bool {
        self.matrices.needs_upload() || self.atlas.needs_upload()
    }

    pub fn flush(&mut self, kind: MeshKind, uploader: &mut dyn InstanceUploader) -> usize {
        self.matrices.flush(kind, InstanceAttribute::Matrix, uploader)
            + self.atlas.flush(kind, InstanceAttribute::LabelAtlas, uploader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::tests::{RecordingUploader, UploadEvent};

    #[test]
    fn test_channel_tracks_merged_dirty_range() {
        let mut channel: InstanceChannel<[f32; 3]> = InstanceChannel::new();
        channel.resize(10, [0.0; 3]);
        channel.flush(MeshKind::Class, InstanceAttribute::Color, &mut RecordingUploader::default());

        channel.set(7, [1.0, 0.0, 0.0]);
        channel.set(2, [0.0, 1.0, 0.0]);

        assert_eq!(channel.dirty_range(), Some(2..8));
    }

    #[test]
    fn test_channel_ignores_unchanged_rows() {
        let mut channel: InstanceChannel<[f32; 3]> = InstanceChannel::new();
        channel.resize(4, [0.5; 3]);
        channel.flush(MeshKind::Class, InstanceAttribute::Color, &mut RecordingUploader::default());

        assert!(channel.set(1, [0.5; 3]));
        assert!(!channel.needs_upload());
        assert!(!channel.set(9, [1.0; 3]));
    }

    #[test]
    fn test_channel_resize_only_when_count_changes() {
        let mut channel: InstanceChannel<[f32; 3]> = InstanceChannel::new();
        assert!(channel.resize(3, [0.0; 3]));
        channel.flush(MeshKind::Component, InstanceAttribute::Color, &mut RecordingUploader::default());

        channel.set(0, [1.0; 3]);
        assert!(!channel.resize(3, [0.0; 3]));
        assert_eq!(channel.get(0), Some(&[1.0; 3]));
    }

    #[test]
    fn test_flush_reallocates_then_uploads_everything() {
        let mut instances = BoxInstances::default();
        instances.resize(3);
        let mut uploader = RecordingUploader::default();

        let calls = instances.flush(MeshKind::Component, &mut uploader);

        assert_eq!(calls, 4);
        assert_eq!(
            uploader.events[0],
            UploadEvent::Reallocate(MeshKind::Component, InstanceAttribute::Matrix, 3)
        );
        assert_eq!(uploader.bytes_written(InstanceAttribute::Matrix), 3 * 64);
        assert_eq!(uploader.bytes_written(InstanceAttribute::Color), 3 * 12);
        assert!(!instances.needs_upload());

        // Nothing pending, nothing sent
        assert_eq!(instances.flush(MeshKind::Component, &mut uploader), 0);
    }

    #[test]
    fn test_hidden_matrix_collapses_points() {
        use cgmath::{Point3, Transform};

        let matrix = Matrix4::from(hidden_matrix());
        let point = matrix.transform_point(Point3::new(3.0, -2.0, 5.0));
        assert_eq!(point, Point3::new(0.0, 0.0, 0.0));
    }
}
