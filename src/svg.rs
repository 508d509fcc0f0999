//! SVG path data parser
//!
//! Glyph outlines are stored as SVG path data. Supported commands are
//! `M L H V Q T C S Z` in both absolute and relative forms, elliptic arcs
//! are rejected since glyph outlines never need them.
//!
//! See [SVG Path Specification](https://www.w3.org/TR/SVG11/paths.html#PathData)
use crate::{PathBuilder, Point, Scalar};
use std::fmt;

/// Possible SVG path commands (all points are absolute)
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SvgPathCmd {
    MoveTo(Point),
    LineTo(Point),
    QuadTo(Point, Point),
    CubicTo(Point, Point, Point),
    Close(Point),
}

impl SvgPathCmd {
    /// Get destination point of the SVG command
    pub fn dst(&self) -> Point {
        use SvgPathCmd::*;
        *match self {
            MoveTo(dst) => dst,
            LineTo(dst) => dst,
            QuadTo(_, dst) => dst,
            CubicTo(_, _, dst) => dst,
            Close(dst) => dst,
        }
    }

    /// Apply SVG command to path builder
    pub fn apply(&self, builder: &mut PathBuilder) {
        use SvgPathCmd::*;
        match self {
            MoveTo(p) => builder.move_to(*p),
            LineTo(p) => builder.line_to(*p),
            QuadTo(p1, p2) => builder.quad_to(*p1, *p2),
            CubicTo(p1, p2, p3) => builder.cubic_to(*p1, *p2, *p3),
            Close(_) => builder.close(),
        };
    }
}

/// Iterator over commands of SVG path data
pub struct SvgPathParser<'a> {
    input: &'a [u8],
    offset: usize,
    // operation to repeat when command letter is omitted
    prev_op: Option<u8>,
    // previous command (used to reflect control points of smooth curves)
    prev_cmd: Option<SvgPathCmd>,
    position: Point,
    subpath_start: Point,
}

impl<'a> SvgPathParser<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            offset: 0,
            prev_op: None,
            prev_cmd: None,
            position: Point::new(0.0, 0.0),
            subpath_start: Point::new(0.0, 0.0),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.offset).copied()
    }

    fn parse_separators(&mut self) {
        while let Some(b' ' | b'\t' | b'\r' | b'\n' | b',') = self.peek() {
            self.offset += 1;
        }
    }

    fn parse_scalar(&mut self) -> Result<Scalar, SvgParserError> {
        self.parse_separators();
        match self.peek() {
            Some(b'0'..=b'9' | b'-' | b'+' | b'.') => {}
            _ => return Err(SvgParserError::InvalidScalar(self.offset)),
        }
        let (value, consumed) = lexical_core::parse_partial::<Scalar>(&self.input[self.offset..])
            .map_err(|_| SvgParserError::InvalidScalar(self.offset))?;
        if consumed == 0 || !value.is_finite() {
            return Err(SvgParserError::InvalidScalar(self.offset));
        }
        self.offset += consumed;
        Ok(value)
    }

    // parse pair of scalars, relative operations are offset by the current position
    fn parse_point(&mut self, relative: bool) -> Result<Point, SvgParserError> {
        let point = Point::new(self.parse_scalar()?, self.parse_scalar()?);
        if relative {
            Ok(point + self.position)
        } else {
            Ok(point)
        }
    }

    // parse command letter, repeating previous one for implicit commands
    fn parse_op(&mut self) -> Result<Option<u8>, SvgParserError> {
        self.parse_separators();
        let Some(op) = self.peek() else {
            return Ok(None);
        };
        match op {
            b'M' | b'm' | b'L' | b'l' | b'V' | b'v' | b'H' | b'h' | b'C' | b'c' | b'S' | b's'
            | b'Q' | b'q' | b'T' | b't' | b'Z' | b'z' => {
                self.offset += 1;
                self.prev_op = match op {
                    b'm' => Some(b'l'),
                    b'M' => Some(b'L'),
                    b'Z' | b'z' => None,
                    _ => Some(op),
                };
                Ok(Some(op))
            }
            b'A' | b'a' => Err(SvgParserError::UnsupportedCmd(op)),
            b'0'..=b'9' | b'-' | b'+' | b'.' => match self.prev_op {
                Some(prev) => Ok(Some(prev)),
                None => Err(SvgParserError::InvalidCmd(op)),
            },
            _ => Err(SvgParserError::InvalidCmd(op)),
        }
    }

    // control point reflected from the previous command of the same kind
    fn reflected(&self, cubic: bool) -> Point {
        let ctrl = match self.prev_cmd {
            Some(SvgPathCmd::CubicTo(_, p2, _)) if cubic => Some(p2),
            Some(SvgPathCmd::QuadTo(p1, _)) if !cubic => Some(p1),
            _ => None,
        };
        match ctrl {
            Some(ctrl) => 2.0 * self.position - ctrl,
            None => self.position,
        }
    }

    /// Parse single SVG path command from the input
    pub fn parse_cmd(&mut self) -> Result<Option<SvgPathCmd>, SvgParserError> {
        let Some(op) = self.parse_op()? else {
            return Ok(None);
        };
        if self.prev_cmd.is_none() && !matches!(op, b'M' | b'm') {
            return Err(SvgParserError::MoveToExpected);
        }
        let relative = op.is_ascii_lowercase();
        let cmd = match op {
            b'M' | b'm' => {
                let dst = self.parse_point(relative)?;
                self.subpath_start = dst;
                SvgPathCmd::MoveTo(dst)
            }
            b'L' | b'l' => SvgPathCmd::LineTo(self.parse_point(relative)?),
            b'V' | b'v' => {
                let y = self.parse_scalar()?;
                let p0 = self.position;
                let y = if relative { p0.y() + y } else { y };
                SvgPathCmd::LineTo(Point::new(p0.x(), y))
            }
            b'H' | b'h' => {
                let x = self.parse_scalar()?;
                let p0 = self.position;
                let x = if relative { p0.x() + x } else { x };
                SvgPathCmd::LineTo(Point::new(x, p0.y()))
            }
            b'Q' | b'q' => {
                let p1 = self.parse_point(relative)?;
                let p2 = self.parse_point(relative)?;
                SvgPathCmd::QuadTo(p1, p2)
            }
            b'T' | b't' => {
                let p1 = self.reflected(false);
                let p2 = self.parse_point(relative)?;
                SvgPathCmd::QuadTo(p1, p2)
            }
            b'C' | b'c' => {
                let p1 = self.parse_point(relative)?;
                let p2 = self.parse_point(relative)?;
                let p3 = self.parse_point(relative)?;
                SvgPathCmd::CubicTo(p1, p2, p3)
            }
            b'S' | b's' => {
                let p1 = self.reflected(true);
                let p2 = self.parse_point(relative)?;
                let p3 = self.parse_point(relative)?;
                SvgPathCmd::CubicTo(p1, p2, p3)
            }
            b'Z' | b'z' => SvgPathCmd::Close(self.subpath_start),
            _ => return Err(SvgParserError::InvalidCmd(op)),
        };
        self.position = cmd.dst();
        self.prev_cmd = Some(cmd);
        Ok(Some(cmd))
    }
}

impl Iterator for SvgPathParser<'_> {
    type Item = Result<SvgPathCmd, SvgParserError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.parse_cmd().transpose()
    }
}

/// Error while parsing path in the SVG format
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SvgParserError {
    /// Failed to parse SVG command
    InvalidCmd(u8),
    /// Command is valid SVG but is not supported
    UnsupportedCmd(u8),
    /// Failed to parse scalar value at the given offset
    InvalidScalar(usize),
    /// Path data must start with a move-to command
    MoveToExpected,
}

impl fmt::Display for SvgParserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCmd(op) => write!(f, "invalid path command {:?}", *op as char),
            Self::UnsupportedCmd(op) => write!(f, "unsupported path command {:?}", *op as char),
            Self::InvalidScalar(offset) => write!(f, "invalid number at offset {}", offset),
            Self::MoveToExpected => write!(f, "path data must start with a move-to command"),
        }
    }
}

impl std::error::Error for SvgParserError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_approx_eq;

    fn parse(data: &str) -> Result<Vec<SvgPathCmd>, SvgParserError> {
        SvgPathParser::new(data.as_bytes()).collect()
    }

    #[test]
    fn test_parse_scalar() -> Result<(), SvgParserError> {
        let mut parser = SvgPathParser::new(b"1 .22e0.32 3.21e-3-1.24 1e4");
        assert_approx_eq!(parser.parse_scalar()?, 1.0);
        assert_approx_eq!(parser.parse_scalar()?, 0.22);
        assert_approx_eq!(parser.parse_scalar()?, 0.32);
        assert_approx_eq!(parser.parse_scalar()?, 3.21e-3);
        assert_approx_eq!(parser.parse_scalar()?, -1.24);
        assert_approx_eq!(parser.parse_scalar()?, 1e4);
        assert!(parser.parse_scalar().is_err());
        Ok(())
    }

    #[test]
    fn test_parse_cmds() -> Result<(), SvgParserError> {
        let cmds = parse("M10 20 l5 0 5 5 H0 v-10 z")?;
        assert_eq!(
            cmds,
            vec![
                SvgPathCmd::MoveTo(Point::new(10.0, 20.0)),
                SvgPathCmd::LineTo(Point::new(15.0, 20.0)),
                SvgPathCmd::LineTo(Point::new(20.0, 25.0)),
                SvgPathCmd::LineTo(Point::new(0.0, 25.0)),
                SvgPathCmd::LineTo(Point::new(0.0, 15.0)),
                SvgPathCmd::Close(Point::new(10.0, 20.0)),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_parse_smooth() -> Result<(), SvgParserError> {
        let cmds = parse("M0 0 Q10 10 20 0 T40 0 C40 10 50 10 50 0 S60 -10 60 0")?;
        assert_eq!(
            cmds[2],
            SvgPathCmd::QuadTo(Point::new(30.0, -10.0), Point::new(40.0, 0.0))
        );
        assert_eq!(
            cmds[4],
            SvgPathCmd::CubicTo(
                Point::new(50.0, -10.0),
                Point::new(60.0, -10.0),
                Point::new(60.0, 0.0)
            )
        );
        Ok(())
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse("L 1 2"), Err(SvgParserError::MoveToExpected));
        assert_eq!(
            parse("M0 0 A 1 1 0 0 1 2 2"),
            Err(SvgParserError::UnsupportedCmd(b'A'))
        );
        assert_eq!(parse("M0 0 X"), Err(SvgParserError::InvalidCmd(b'X')));
        assert!(matches!(
            parse("M0 0 L1"),
            Err(SvgParserError::InvalidScalar(_))
        ));
    }
}
