//! Software rendering of stroked polylines
//!
//! Strokes are rasterized with round caps and joins by measuring the distance
//! from each pixel center to the stroke centerline, which also yields one pixel
//! of anti-aliased fringe.
use crate::{Image, ImageMut, ImageOwned, Line, Point, Polyline, Rgba8, Scalar, Size};

/// Rasterize stroke of the polylines into a new alpha mask
pub fn stroke_alpha(polylines: &[Polyline], width: Scalar, size: Size) -> ImageOwned<u8> {
    let _span = tracing::debug_span!("[stroke]", width, lines = polylines.len()).entered();
    let mut alpha = ImageOwned::new_default(size);
    for polyline in polylines {
        stroke_polyline(&mut alpha, polyline, width);
    }
    alpha
}

/// Accumulate stroke of a single polyline into an alpha mask (maximum of coverages)
pub fn stroke_polyline(mut alpha: impl ImageMut<Pixel = u8>, polyline: &Polyline, width: Scalar) {
    if !(width > 0.0) {
        return;
    }
    match polyline.points.as_slice() {
        [] => {}
        [point] => stroke_line(&mut alpha, Line::new(*point, *point), width),
        _ => {
            for line in polyline.lines() {
                stroke_line(&mut alpha, line, width);
            }
        }
    }
}

fn stroke_line(alpha: &mut impl ImageMut<Pixel = u8>, line: Line, width: Scalar) {
    let half_width = width / 2.0;
    let shape = alpha.shape();
    let bbox = line.bbox().inflate(half_width + 1.0);
    let col_min = bbox.min().x().floor().max(0.0) as usize;
    let row_min = bbox.min().y().floor().max(0.0) as usize;
    let col_max = (bbox.max().x().ceil().max(0.0) as usize).min(shape.width);
    let row_max = (bbox.max().y().ceil().max(0.0) as usize).min(shape.height);
    let data = alpha.data_mut();
    for row in row_min..row_max {
        for col in col_min..col_max {
            let center = Point::new(col as Scalar + 0.5, row as Scalar + 0.5);
            let coverage = (half_width + 0.5 - line.distance_to(center)).clamp(0.0, 1.0);
            if coverage <= 0.0 {
                continue;
            }
            let value = (coverage * 255.0).round() as u8;
            let pixel = &mut data[shape.offset(row, col)];
            if value > *pixel {
                *pixel = value;
            }
        }
    }
}

/// Paint `color` through the alpha mask on top of the surface
pub fn composite(
    mut surface: impl ImageMut<Pixel = Rgba8>,
    alpha: impl Image<Pixel = u8>,
    color: Rgba8,
) {
    let shape = surface.shape();
    let data = surface.data_mut();
    for (row, col, coverage) in alpha.enumerate() {
        if *coverage == 0 || row >= shape.height || col >= shape.width {
            continue;
        }
        let pixel = &mut data[shape.offset(row, col)];
        *pixel = pixel.blend_over(color.with_coverage(*coverage));
    }
}

/// Draw stroked polyline on the surface
pub fn draw_polyline(
    mut surface: impl ImageMut<Pixel = Rgba8>,
    polyline: &Polyline,
    width: Scalar,
    color: Rgba8,
) {
    let mut alpha = ImageOwned::new_default(surface.shape().size());
    stroke_polyline(&mut alpha, polyline, width);
    composite(&mut surface, &alpha, color);
}

/// Encode RGBA surface as PNG
#[cfg(feature = "png")]
pub fn write_png(
    surface: impl Image<Pixel = Rgba8>,
    out: impl std::io::Write,
) -> Result<(), png::EncodingError> {
    let shape = surface.shape();
    let mut encoder = png::Encoder::new(out, shape.width as u32, shape.height as u32);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    let mut bytes = Vec::with_capacity(shape.width * shape.height * 4);
    for row in 0..shape.height {
        let offset = shape.offset(row, 0);
        let pixels = &surface.data()[offset..offset + shape.width];
        bytes.extend_from_slice(bytemuck::cast_slice(pixels));
    }
    writer.write_image_data(&bytes)?;
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size(width: usize, height: usize) -> Size {
        Size { width, height }
    }

    #[test]
    fn test_stroke_horizontal() {
        let line = Polyline {
            points: vec![Point::new(5.0, 10.0), Point::new(25.0, 10.0)],
            closed: false,
        };
        let alpha = stroke_alpha(&[line], 5.0, size(30, 20));
        // centerline is fully covered
        assert_eq!(alpha.get(9, 15), Some(&255));
        assert_eq!(alpha.get(10, 15), Some(&255));
        // pixel centers on the stroke edge get half coverage
        assert_eq!(alpha.get(7, 15), Some(&128));
        assert_eq!(alpha.get(12, 15), Some(&128));
        assert_eq!(alpha.get(13, 15), Some(&0));
        // round cap extends beyond the end point
        assert_eq!(alpha.get(9, 26), Some(&255));
        assert_eq!(alpha.get(9, 28), Some(&0));
        // far away
        assert_eq!(alpha.get(0, 0), Some(&0));
    }

    #[test]
    fn test_stroke_clipped_and_dot() {
        let line = Polyline {
            points: vec![Point::new(-10.0, -10.0), Point::new(40.0, 40.0)],
            closed: false,
        };
        let alpha = stroke_alpha(&[line], 2.0, size(8, 8));
        assert_eq!(alpha.get(3, 3), Some(&255));

        let dot = Polyline {
            points: vec![Point::new(4.0, 4.0)],
            closed: false,
        };
        let alpha = stroke_alpha(&[dot], 4.0, size(8, 8));
        assert_eq!(alpha.get(3, 3), Some(&255));
        assert_eq!(alpha.get(0, 0), Some(&0));

        let alpha = stroke_alpha(&[], 4.0, size(8, 8));
        assert!(alpha.data().iter().all(|a| *a == 0));
    }

    #[test]
    fn test_draw_polyline() {
        let mut surface = ImageOwned::new_with(size(10, 10), |_, _| Rgba8::WHITE);
        let line = Polyline {
            points: vec![Point::new(0.0, 5.0), Point::new(10.0, 5.0)],
            closed: false,
        };
        draw_polyline(&mut surface, &line, 2.0, Rgba8::BLACK);
        assert_eq!(surface.get(4, 5), Some(&Rgba8::BLACK));
        assert_eq!(surface.get(0, 5), Some(&Rgba8::WHITE));
    }
}
