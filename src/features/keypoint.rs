use serde::Serialize;

/// Length of a SIFT descriptor (4x4 spatial cells, 8 orientation bins)
pub const DESCRIPTOR_SIZE: usize = 128;

/// A fixed-length descriptor vector, L2-normalized
pub type Descriptor = [f32; DESCRIPTOR_SIZE];

/// A detected scale-space keypoint in input image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KeyPoint {
    pub x: f32,
    pub y: f32,
    /// Diameter of the meaningful neighbourhood
    pub size: f32,
    /// Dominant gradient orientation in degrees, [0, 360)
    pub angle: f32,
    /// Absolute interpolated DoG contrast
    pub response: f32,
    pub octave: usize,
    pub layer: usize,
}

impl KeyPoint {
    pub fn pt(&self) -> (f64, f64) {
        (self.x as f64, self.y as f64)
    }
}

/// Keypoints with one descriptor each, index-aligned
#[derive(Debug, Clone, Default)]
pub struct Features {
    pub keypoints: Vec<KeyPoint>,
    pub descriptors: Vec<Descriptor>,
}

impl Features {
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// Position of a keypoint inside the scale space, used for descriptor sampling
#[derive(Debug, Clone, Copy)]
pub(crate) struct ScaleLocation {
    pub octave: usize,
    pub layer: usize,
    /// Octave-local sub-pixel position
    pub x: f32,
    pub y: f32,
    /// Octave-local Gaussian scale
    pub sigma: f32,
}
