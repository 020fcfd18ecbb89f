//! Terrain heightfield
//!
//! Stored in the arena as `HEIGHTMAP_RESOLUTION`² unsigned 16-bit samples,
//! row-major. The on-disk format is the same samples, little-endian, with
//! no header.

use strata_abi::{FfiStr, FileBuffer};

use crate::state::Engine;

pub const HEIGHTMAP_RESOLUTION: usize = 256;
pub const HEIGHTMAP_SAMPLES: usize = HEIGHTMAP_RESOLUTION * HEIGHTMAP_RESOLUTION;

/// Size of a raw heightmap file in bytes
pub const HEIGHTMAP_FILE_LEN: usize = HEIGHTMAP_SAMPLES * 2;

#[repr(C)]
pub struct Heightmap {
    /// Offset of the sample array within the engine region
    pub samples_offset: u64,
}

/// Bilinear sample of normalised height at normalised coordinates
pub fn sample(samples: &[u16], x: f32, z: f32) -> f32 {
    let max = (HEIGHTMAP_RESOLUTION - 1) as f32;
    let fx = x.clamp(0.0, 1.0) * max;
    let fz = z.clamp(0.0, 1.0) * max;

    let x0 = fx.floor() as usize;
    let z0 = fz.floor() as usize;
    let x1 = (x0 + 1).min(HEIGHTMAP_RESOLUTION - 1);
    let z1 = (z0 + 1).min(HEIGHTMAP_RESOLUTION - 1);
    let tx = fx - x0 as f32;
    let tz = fz - z0 as f32;

    let at = |x: usize, z: usize| samples[z * HEIGHTMAP_RESOLUTION + x] as f32 / u16::MAX as f32;
    let top = at(x0, z0) * (1.0 - tx) + at(x1, z0) * tx;
    let bottom = at(x0, z1) * (1.0 - tx) + at(x1, z1) * tx;
    top * (1.0 - tz) + bottom * tz
}

impl<'a> Engine<'a> {
    pub(crate) fn heightmap_samples_ptr(&self) -> *mut u16 {
        self.allocator
            .at(self.state.heightmap.samples_offset)
            .map_or(std::ptr::null_mut(), |ptr| ptr as *mut u16)
    }

    pub fn heightmap_samples(&self) -> Option<&[u16]> {
        let ptr = self.heightmap_samples_ptr();
        (!ptr.is_null()).then(|| unsafe { std::slice::from_raw_parts(ptr, HEIGHTMAP_SAMPLES) })
    }

    fn heightmap_samples_mut(&mut self) -> Option<&mut [u16]> {
        let ptr = self.heightmap_samples_ptr();
        (!ptr.is_null()).then(|| unsafe { std::slice::from_raw_parts_mut(ptr, HEIGHTMAP_SAMPLES) })
    }

    pub fn heightfield_height(&self, x: f32, z: f32) -> f32 {
        self.heightmap_samples().map_or(0.0, |samples| sample(samples, x, z))
    }

    /// Replace the heightfield with a raw file read through the host
    pub fn load_heightmap(&mut self, path: &str) -> bool {
        let platform = self.platform;
        let mut buffer = FileBuffer::empty();
        if !(platform.read_entire_file)(platform.host, FfiStr::new(path), &mut buffer) {
            log_platform!(platform, Warn, "Could not read heightmap '{}'", path);
            return false;
        }

        let loaded = if buffer.len as usize != HEIGHTMAP_FILE_LEN || buffer.data.is_null() {
            log_platform!(
                platform,
                Error,
                "Heightmap '{}' is {} bytes, expected {}",
                path,
                buffer.len,
                HEIGHTMAP_FILE_LEN
            );
            false
        } else {
            let bytes = unsafe { std::slice::from_raw_parts(buffer.data, HEIGHTMAP_FILE_LEN) };
            match self.heightmap_samples_mut() {
                Some(samples) => {
                    for (sample, pair) in samples.iter_mut().zip(bytes.chunks_exact(2)) {
                        *sample = u16::from_le_bytes([pair[0], pair[1]]);
                    }
                    true
                }
                None => false,
            }
        };
        (platform.release_file)(platform.host, &mut buffer);

        if loaded {
            self.touch_heightmap_asset();
            log_platform!(platform, Info, "Loaded heightmap '{}'", path);
        }
        loaded
    }

    /// Write the heightfield as a raw file through the host
    pub fn save_heightmap(&self, path: &str) -> bool {
        let Some(samples) = self.heightmap_samples() else {
            return false;
        };
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        let written = (self.platform.write_entire_file)(
            self.platform.host,
            FfiStr::new(path),
            bytes.as_ptr(),
            bytes.len() as u64,
        );
        if !written {
            log_platform!(self.platform, Warn, "Could not write heightmap '{}'", path);
        }
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_flat() {
        let samples = vec![u16::MAX / 2; HEIGHTMAP_SAMPLES];
        let h = sample(&samples, 0.3, 0.7);
        assert!((h - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_sample_corners_and_clamp() {
        let mut samples = vec![0u16; HEIGHTMAP_SAMPLES];
        samples[HEIGHTMAP_SAMPLES - 1] = u16::MAX;
        assert_eq!(sample(&samples, 1.0, 1.0), 1.0);
        assert_eq!(sample(&samples, 5.0, 5.0), 1.0);
        assert_eq!(sample(&samples, 0.0, 0.0), 0.0);
    }

    #[test]
    fn test_sample_interpolates() {
        let mut samples = vec![0u16; HEIGHTMAP_SAMPLES];
        samples[1] = u16::MAX;
        let step = 1.0 / (HEIGHTMAP_RESOLUTION - 1) as f32;
        let h = sample(&samples, step * 0.5, 0.0);
        assert!((h - 0.5).abs() < 0.001);
    }
}
