use crate::{BBox, Line, Point, Scalar, SvgParserError, SvgPathParser, Transform};
use std::{fmt, str::FromStr};

/// flatness of 0.05px gives good accuracy tradeoff
pub const DEFAULT_FLATNESS: Scalar = 0.05;

// subdivision depth limit, 2^16 lines per curve is more than enough
const MAX_FLATTEN_DEPTH: usize = 16;

/// Path segment
#[derive(Clone, Copy, PartialEq)]
pub enum Segment {
    Line([Point; 2]),
    Quad([Point; 3]),
    Cubic([Point; 4]),
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Line([p0, p1]) => write!(f, "Line {:?} {:?}", p0, p1),
            Segment::Quad([p0, p1, p2]) => write!(f, "Quad {:?} {:?} {:?}", p0, p1, p2),
            Segment::Cubic([p0, p1, p2, p3]) => {
                write!(f, "Cubic {:?} {:?} {:?} {:?}", p0, p1, p2, p3)
            }
        }
    }
}

impl Segment {
    pub fn start(&self) -> Point {
        match self {
            Segment::Line([p0, _]) => *p0,
            Segment::Quad([p0, ..]) => *p0,
            Segment::Cubic([p0, ..]) => *p0,
        }
    }

    pub fn end(&self) -> Point {
        match self {
            Segment::Line([_, p1]) => *p1,
            Segment::Quad([.., p2]) => *p2,
            Segment::Cubic([.., p3]) => *p3,
        }
    }

    /// Apply affine transformation to all control points
    pub fn transform(&self, tr: Transform) -> Self {
        match *self {
            Segment::Line(ps) => Segment::Line(ps.map(|p| tr.apply(p))),
            Segment::Quad(ps) => Segment::Quad(ps.map(|p| tr.apply(p))),
            Segment::Cubic(ps) => Segment::Cubic(ps.map(|p| tr.apply(p))),
        }
    }

    /// Maximum distance from control points to the chord
    fn deviation(&self) -> Scalar {
        let chord = Line::new(self.start(), self.end());
        match self {
            Segment::Line(_) => 0.0,
            Segment::Quad([_, p1, _]) => chord.distance_to(*p1),
            Segment::Cubic([_, p1, p2, _]) => chord.distance_to(*p1).max(chord.distance_to(*p2)),
        }
    }

    /// Split segment in two halves (de Casteljau)
    fn split(&self) -> (Self, Self) {
        match *self {
            Segment::Line([p0, p1]) => {
                let mid = p0.lerp(p1, 0.5);
                (Segment::Line([p0, mid]), Segment::Line([mid, p1]))
            }
            Segment::Quad([p0, p1, p2]) => {
                let p01 = p0.lerp(p1, 0.5);
                let p12 = p1.lerp(p2, 0.5);
                let mid = p01.lerp(p12, 0.5);
                (Segment::Quad([p0, p01, mid]), Segment::Quad([mid, p12, p2]))
            }
            Segment::Cubic([p0, p1, p2, p3]) => {
                let p01 = p0.lerp(p1, 0.5);
                let p12 = p1.lerp(p2, 0.5);
                let p23 = p2.lerp(p3, 0.5);
                let p012 = p01.lerp(p12, 0.5);
                let p123 = p12.lerp(p23, 0.5);
                let mid = p012.lerp(p123, 0.5);
                (
                    Segment::Cubic([p0, p01, p012, mid]),
                    Segment::Cubic([mid, p123, p23, p3]),
                )
            }
        }
    }

    /// Append points approximating the segment (start point excluded)
    pub fn flatten_into(&self, flatness: Scalar, out: &mut Vec<Point>) {
        self.flatten_rec(flatness, MAX_FLATTEN_DEPTH, out)
    }

    fn flatten_rec(&self, flatness: Scalar, depth: usize, out: &mut Vec<Point>) {
        if depth == 0 || self.deviation() <= flatness {
            out.push(self.end());
            return;
        }
        let (left, right) = self.split();
        left.flatten_rec(flatness, depth - 1, out);
        right.flatten_rec(flatness, depth - 1, out);
    }
}

/// Non-empty collection of segments where the end of each segment coincides
/// with the start of the next one.
#[derive(Clone, PartialEq)]
pub struct SubPath {
    segments: Vec<Segment>,
    /// Whether SubPath contains an implicit line segment connecting start and the end of it.
    closed: bool,
}

impl fmt::Debug for SubPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in self.segments.iter() {
            writeln!(f, "{:?}", segment)?;
        }
        if self.closed {
            writeln!(f, "Close")
        } else {
            writeln!(f, "End")
        }
    }
}

impl SubPath {
    pub fn new(segments: Vec<Segment>, closed: bool) -> Option<Self> {
        if segments.is_empty() {
            None
        } else {
            Some(Self { segments, closed })
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn closed(&self) -> bool {
        self.closed
    }

    pub fn start(&self) -> Point {
        self.segments[0].start()
    }

    /// Flatten sub-path into a polyline in the target coordinate system
    pub fn flatten(&self, tr: Transform, flatness: Scalar) -> Polyline {
        let mut points = vec![tr.apply(self.start())];
        for segment in self.segments.iter() {
            segment.transform(tr).flatten_into(flatness, &mut points);
        }
        Polyline {
            points,
            closed: self.closed,
        }
    }
}

/// Sequence of points connected by straight lines
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Polyline {
    pub points: Vec<Point>,
    pub closed: bool,
}

impl Polyline {
    /// Iterate over lines of the polyline, including the closing one
    pub fn lines(&self) -> impl Iterator<Item = Line> + '_ {
        let closing = match (self.closed, self.points.first(), self.points.last()) {
            (true, Some(first), Some(last)) if !first.is_close_to(*last) => {
                Some(Line::new(*last, *first))
            }
            _ => None,
        };
        self.points
            .windows(2)
            .map(|pair| Line::new(pair[0], pair[1]))
            .chain(closing)
    }

    pub fn bbox(&self) -> Option<BBox> {
        let (first, rest) = self.points.split_first()?;
        Some(
            rest.iter()
                .fold(BBox::new(*first, *first), |bbox, p| bbox.extend(*p)),
        )
    }
}

/// Collection of sub-paths
#[derive(Clone, PartialEq, Default)]
pub struct Path {
    subpaths: Vec<SubPath>,
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for subpath in self.subpaths.iter() {
            subpath.fmt(f)?;
        }
        Ok(())
    }
}

impl Path {
    pub fn new(subpaths: Vec<SubPath>) -> Self {
        Self { subpaths }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.subpaths.is_empty()
    }

    pub fn subpaths(&self) -> &[SubPath] {
        &self.subpaths
    }

    /// Number of segments in the path
    pub fn segments_count(&self) -> usize {
        self.subpaths.iter().map(|sp| sp.segments.len()).sum()
    }

    /// Apply transformation to the path
    pub fn transform(&self, tr: Transform) -> Self {
        let subpaths = self
            .subpaths
            .iter()
            .map(|sp| SubPath {
                segments: sp.segments.iter().map(|s| s.transform(tr)).collect(),
                closed: sp.closed,
            })
            .collect();
        Self { subpaths }
    }

    /// Append all sub-paths of other path
    pub fn extend(&mut self, other: Path) {
        self.subpaths.extend(other.subpaths)
    }

    /// Convert path to polylines in the target coordinate system
    pub fn flatten(&self, tr: Transform, flatness: Scalar) -> Vec<Polyline> {
        self.subpaths
            .iter()
            .map(|sp| sp.flatten(tr, flatness))
            .collect()
    }

    /// Bounding box of the flattened path
    pub fn bbox(&self, tr: Transform) -> Option<BBox> {
        self.flatten(tr, DEFAULT_FLATNESS)
            .iter()
            .filter_map(Polyline::bbox)
            .reduce(|a, b| a.union(b))
    }

    /// Parse path from SVG path data
    pub fn from_svg(data: impl AsRef<[u8]>) -> Result<Self, SvgParserError> {
        let mut builder = PathBuilder::new();
        builder.append_svg_path(data)?;
        Ok(builder.build())
    }
}

impl FromStr for Path {
    type Err = SvgParserError;

    fn from_str(text: &str) -> Result<Path, Self::Err> {
        Path::from_svg(text)
    }
}

/// Incremental path construction
#[derive(Clone, Default)]
pub struct PathBuilder {
    position: Point,
    subpath: Vec<Segment>,
    subpaths: Vec<SubPath>,
}

impl PathBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build path
    pub fn build(&mut self) -> Path {
        let PathBuilder {
            subpath,
            mut subpaths,
            ..
        } = std::mem::take(self);
        subpaths.extend(SubPath::new(subpath, false));
        Path::new(subpaths)
    }

    /// Extend path from string, which is specified in the same format as SVGs path element.
    pub fn append_svg_path(&mut self, data: impl AsRef<[u8]>) -> Result<&mut Self, SvgParserError> {
        for cmd in SvgPathParser::new(data.as_ref()) {
            cmd?.apply(self);
        }
        Ok(self)
    }

    /// Move current position, ending current subpath
    pub fn move_to(&mut self, p: impl Into<Point>) -> &mut Self {
        let subpath = std::mem::take(&mut self.subpath);
        self.subpaths.extend(SubPath::new(subpath, false));
        self.position = p.into();
        self
    }

    /// Close current subpath
    pub fn close(&mut self) -> &mut Self {
        let subpath = std::mem::take(&mut self.subpath);
        if let Some(seg) = subpath.first() {
            self.position = seg.start();
        }
        self.subpaths.extend(SubPath::new(subpath, true));
        self
    }

    /// Add line from the current position to the specified point
    pub fn line_to(&mut self, p: impl Into<Point>) -> &mut Self {
        let p = p.into();
        if !self.position.is_close_to(p) {
            self.subpath.push(Segment::Line([self.position, p]));
            self.position = p;
        }
        self
    }

    /// Add quadratic bezier curve
    pub fn quad_to(&mut self, p1: impl Into<Point>, p2: impl Into<Point>) -> &mut Self {
        let p2 = p2.into();
        self.subpath
            .push(Segment::Quad([self.position, p1.into(), p2]));
        self.position = p2;
        self
    }

    /// Add cubic bezier curve
    pub fn cubic_to(
        &mut self,
        p1: impl Into<Point>,
        p2: impl Into<Point>,
        p3: impl Into<Point>,
    ) -> &mut Self {
        let p3 = p3.into();
        self.subpath
            .push(Segment::Cubic([self.position, p1.into(), p2.into(), p3]));
        self.position = p3;
        self
    }

    /// Current position of the builder
    pub fn position(&self) -> Point {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_approx_eq;

    #[test]
    fn test_builder() -> Result<(), SvgParserError> {
        let path: Path = "M0 0 L10 0 L10 10 Z M20 20 L30 20".parse()?;
        assert_eq!(path.subpaths().len(), 2);
        assert!(path.subpaths()[0].closed());
        assert!(!path.subpaths()[1].closed());
        assert_eq!(path.segments_count(), 3);

        let lines = path.flatten(Transform::identity(), DEFAULT_FLATNESS);
        // closing line is implicit
        assert_eq!(lines[0].lines().count(), 3);
        assert_eq!(lines[1].lines().count(), 1);
        Ok(())
    }

    #[test]
    fn test_flatten_curve() -> Result<(), SvgParserError> {
        let path: Path = "M0 0 Q50 100 100 0".parse()?;
        let lines = path.flatten(Transform::identity(), 0.1);
        let points = &lines[0].points;
        assert!(points.len() > 8);
        assert_eq!(points.first(), Some(&Point::new(0.0, 0.0)));
        assert_eq!(points.last(), Some(&Point::new(100.0, 0.0)));
        // curve peak is at half of the control point height
        let top = points.iter().fold(0.0, |acc: Scalar, p| acc.max(p.y()));
        assert_approx_eq!(top, 50.0, 0.1);
        Ok(())
    }

    #[test]
    fn test_bbox_transform() -> Result<(), SvgParserError> {
        let path: Path = "M0 0 L10 20".parse()?;
        let tr = Transform::identity().translate(5.0, 5.0).scale(2.0, -1.0);
        let bbox = path.bbox(tr).expect("non empty path");
        assert_eq!(bbox.min(), Point::new(5.0, -15.0));
        assert_eq!(bbox.max(), Point::new(25.0, 5.0));
        assert!(Path::empty().bbox(tr).is_none());
        Ok(())
    }
}
