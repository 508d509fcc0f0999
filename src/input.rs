//! Pointer and keyboard input delivered by the host
use crate::{Point, Scalar, Size};
use std::fmt;

/// Pointer event in display coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub pointer_id: u32,
    pub position: Point,
}

impl PointerEvent {
    pub fn new(pointer_id: u32, position: impl Into<Point>) -> Self {
        Self {
            pointer_id,
            position: position.into(),
        }
    }
}

/// Keys the engine reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Escape,
    Enter,
    Other,
}

impl Key {
    /// Map DOM style key name
    pub fn from_name(name: &str) -> Self {
        match name {
            "Escape" | "Esc" => Key::Escape,
            "Enter" | "Return" => Key::Enter,
            _ => Key::Other,
        }
    }
}

/// Placement of the raster on the display
///
/// Display rectangle may be scaled relative to the raster, pointer positions
/// are mapped back into raster pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    origin: Point,
    display: [Scalar; 2],
    raster: Size,
}

impl Viewport {
    /// Raster shown at its own size at the origin
    pub fn identity(raster: Size) -> Self {
        Self {
            origin: Point::new(0.0, 0.0),
            display: [raster.width as Scalar, raster.height as Scalar],
            raster,
        }
    }

    /// Raster displayed in the rectangle with `origin` and `width x height` size
    pub fn new(origin: impl Into<Point>, width: Scalar, height: Scalar, raster: Size) -> Self {
        Self {
            origin: origin.into(),
            display: [width, height],
            raster,
        }
    }

    pub fn raster(&self) -> Size {
        self.raster
    }

    /// Convert display position into raster coordinates
    pub fn to_raster(&self, position: Point) -> Point {
        let [width, height] = self.display;
        let sx = if width > 0.0 {
            self.raster.width as Scalar / width
        } else {
            1.0
        };
        let sy = if height > 0.0 {
            self.raster.height as Scalar / height
        } else {
            1.0
        };
        let local = position - self.origin;
        Point::new(local.x() * sx, local.y() * sy)
    }
}

/// Host side registration of pointer and key handlers
pub trait InputSource {
    /// Start delivering events to the engine
    fn attach(&mut self);
    /// Stop delivering events to the engine
    fn detach(&mut self);
}

/// Source that is always silent, used when the host pushes events directly
#[derive(Debug, Default, Clone, Copy)]
pub struct NoInput;

impl InputSource for NoInput {
    fn attach(&mut self) {}
    fn detach(&mut self) {}
}

/// Owner of the attach/detach pair of an input source
///
/// Listeners are attached at most once and always detached on `detach` or drop.
pub struct Listeners {
    source: Box<dyn InputSource>,
    attached: bool,
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("attached", &self.attached)
            .finish()
    }
}

impl Default for Listeners {
    fn default() -> Self {
        Self::new(Box::new(NoInput))
    }
}

impl Listeners {
    pub fn new(source: Box<dyn InputSource>) -> Self {
        Self {
            source,
            attached: false,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn attach(&mut self) {
        if !self.attached {
            self.source.attach();
            self.attached = true;
        }
    }

    pub fn detach(&mut self) {
        if self.attached {
            self.source.detach();
            self.attached = false;
        }
    }
}

impl Drop for Listeners {
    fn drop(&mut self) {
        self.detach();
    }
}
