//! Accumulation of gesture coverage over the required mask
use crate::{BBox, BitMask, Point, Scalar, Size};

/// Default distance between sampled points of a gesture segment (raster units)
pub const DEFAULT_SAMPLE_STEP: Scalar = 2.0;

/// Pixels covered by the user's gesture that are also required
///
/// Marking is idempotent and restricted to the required mask, so the covered
/// count never exceeds the required count and never decreases until `reset`.
#[derive(Debug, Clone)]
pub struct Coverage {
    covered: BitMask,
    radius: u32,
    step: Scalar,
    // disk of integer offsets within `radius`
    offsets: Vec<(i64, i64)>,
}

impl Coverage {
    pub fn new(size: Size, radius: u32, step: Scalar) -> Self {
        let r = radius as i64;
        let offsets = (-r..=r)
            .flat_map(|dy| (-r..=r).map(move |dx| (dx, dy)))
            .filter(|(dx, dy)| dx * dx + dy * dy <= r * r)
            .collect();
        Self {
            covered: BitMask::new(size),
            radius,
            step: if step > 0.0 { step } else { DEFAULT_SAMPLE_STEP },
            offsets,
        }
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }

    pub fn covered(&self) -> &BitMask {
        &self.covered
    }

    /// Number of covered required pixels
    pub fn count(&self) -> usize {
        self.covered.count()
    }

    /// Forget all coverage
    pub fn reset(&mut self) {
        self.covered.clear();
    }

    /// Coverage ratio in `[0, 1]`, always `0` for an empty required mask
    pub fn ratio(&self, required: &BitMask) -> Scalar {
        if required.is_empty() {
            return 0.0;
        }
        (self.covered.count() as Scalar / required.count() as Scalar).min(1.0)
    }

    /// Mark the pixel containing the point, returns `true` if coverage grew
    pub fn mark_point(&mut self, required: &BitMask, x: i64, y: i64) -> bool {
        match required.shape().checked_offset(x, y) {
            Some(index) if required.contains(index) => self.covered.insert(index),
            _ => false,
        }
    }

    /// Area where a sample can still touch the raster
    fn reach(&self, required: &BitMask) -> BBox {
        let Size { width, height } = required.size();
        BBox::new((0.0, 0.0), (width as Scalar, height as Scalar))
            .inflate(self.radius as Scalar + 1.0)
    }

    /// Mark every pixel within the radius of the center, returns number of newly covered pixels
    pub fn mark_neighborhood(&mut self, required: &BitMask, center: Point) -> usize {
        if !self.reach(required).contains(center) {
            return 0;
        }
        let x = center.x().floor() as i64;
        let y = center.y().floor() as i64;
        let mut marked = 0;
        for index in 0..self.offsets.len() {
            let (dx, dy) = self.offsets[index];
            if self.mark_point(required, x + dx, y + dy) {
                marked += 1;
            }
        }
        marked
    }

    /// Densely resample the segment and mark neighborhood of every sample
    ///
    /// Without a starting point only the end point is marked. Only the part of
    /// the segment that can reach the raster is resampled.
    pub fn sample_segment(&mut self, required: &BitMask, from: Option<Point>, to: Point) -> usize {
        let Some(from) = from else {
            return self.mark_neighborhood(required, to);
        };
        let Some((from, to)) = self.reach(required).clip_segment(from, to) else {
            return 0;
        };
        let distance = from.dist(to);
        let steps = if distance.is_finite() {
            ((distance / self.step).ceil() as usize).max(1)
        } else {
            1
        };
        let mut marked = 0;
        for i in 0..=steps {
            let t = i as Scalar / steps as Scalar;
            marked += self.mark_neighborhood(required, from.lerp(to, t));
        }
        marked
    }
}

/// In-progress pointer path of the current stroke
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GestureState {
    /// Whether a stroke is in progress
    pub drawing: bool,
    /// Last sampled point of the stroke in raster coordinates
    pub last_point: Option<Point>,
    /// Pointer that owns the stroke
    pub pointer_id: Option<u32>,
}

impl GestureState {
    pub fn begin(&mut self, pointer_id: u32, point: Point) {
        *self = Self {
            drawing: true,
            last_point: Some(point),
            pointer_id: Some(pointer_id),
        };
    }

    pub fn end(&mut self) {
        *self = Self::default();
    }

    /// Whether the event from this pointer belongs to the current stroke
    pub fn owns(&self, pointer_id: u32) -> bool {
        self.drawing && self.pointer_id == Some(pointer_id)
    }
}
