use image::{DynamicImage, Rgba, RgbImage, RgbaImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_line_segment_mut};
use routeline_core::{GeoPath, PixelPath, PixelPoint};
use routeline_georef::Transform;
use std::fmt::Write as _;

use crate::RouteResult;

const TRACE_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);
const SNAP_COLOR: Rgba<u8> = Rgba([0, 128, 255, 255]);
const SEED_COLOR: Rgba<u8> = Rgba([0, 200, 0, 255]);
const SEED_RADIUS: i32 = 5;

fn draw_polyline(canvas: &mut RgbaImage, points: &[(f32, f32)], color: Rgba<u8>) {
    for pair in points.windows(2) {
        draw_line_segment_mut(canvas, pair[0], pair[1], color);
    }
}

/// Source image with the traced path, the seed and optionally a snapped track drawn on top.
///
/// The snapped track is mapped back into pixel space through the inverse of `transform`.
pub fn render_overlay(
    img: &RgbImage,
    path: &PixelPath,
    seed: PixelPoint,
    snapped: Option<(&GeoPath, &Transform)>,
) -> RouteResult<RgbaImage> {
    let mut output: RgbaImage = DynamicImage::ImageRgb8(img.clone()).into_rgba8();

    if let Some((track, transform)) = snapped {
        let pixels = track
            .points()
            .iter()
            .map(|g| transform.invert(*g).map(|(x, y)| (x as f32, y as f32)))
            .collect::<Result<Vec<_>, _>>()?;
        draw_polyline(&mut output, &pixels, SNAP_COLOR);
    }

    let pixels: Vec<(f32, f32)> = path.points().iter().map(|p| (p.x as f32, p.y as f32)).collect();
    draw_polyline(&mut output, &pixels, TRACE_COLOR);

    draw_hollow_circle_mut(&mut output, (seed.x as i32, seed.y as i32), SEED_RADIUS, SEED_COLOR);
    Ok(output)
}

/// SVG document of `path` shifted to its bounding box corner, drawn as one black stroke
pub fn path_to_svg(path: &PixelPath, width: u32, height: u32) -> String {
    let normalized = path.normalized();
    let mut d = String::new();
    for (i, p) in normalized.points().iter().enumerate() {
        let command = if i == 0 { "M" } else { " L" };
        let _ = write!(d, "{} {},{}", command, p.x, p.y);
    }

    format!(
        concat!(
            "<?xml version=\"1.0\" encoding=\"utf-8\" ?>\n",
            "<svg xmlns=\"http://www.w3.org/2000/svg\" version=\"1.1\" width=\"{w}\" height=\"{h}\">",
            "<path d=\"{d}\" fill=\"none\" stroke=\"black\" stroke-width=\"2\" />",
            "</svg>\n"
        ),
        w = width,
        h = height,
        d = d
    )
}
