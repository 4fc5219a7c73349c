use image::{Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;
use routeline_cli::gpx_export::write_gpx;
use routeline_cli::overlay::{path_to_svg, render_overlay};
use routeline_cli::{SimilarityMode, TrackSession};
use routeline_core::{GeoPoint, PixelPoint, ReferencePoint};
use routeline_georef::{CorrespondenceSolver, Georeferencer};
use routeline_trace::{simplify, TracerBuilder};
use std::time::Instant;
use time::OffsetDateTime;

/// A map-like test image: grey streets with a red route drawn over them
fn draw_map(width: u32, height: u32) -> RgbImage {
    let mut img = RgbImage::from_pixel(width, height, Rgb([242, 239, 233]));
    for i in (40..width).step_by(120) {
        draw_line_segment_mut(&mut img, (i as f32, 0.0), (i as f32, height as f32), Rgb([200, 200, 200]));
    }
    for j in (40..height).step_by(120) {
        draw_line_segment_mut(&mut img, (0.0, j as f32), (width as f32, j as f32), Rgb([200, 200, 200]));
    }

    let route = [(60.0, 420.0), (60.0, 160.0), (300.0, 160.0), (420.0, 60.0), (560.0, 60.0)];
    for pair in route.windows(2) {
        for offset in -1..=1 {
            let o = offset as f32;
            let (a, b) = (pair[0], pair[1]);
            draw_line_segment_mut(&mut img, (a.0 + o, a.1), (b.0 + o, b.1), Rgb([220, 30, 30]));
            draw_line_segment_mut(&mut img, (a.0, a.1 + o), (b.0, b.1 + o), Rgb([220, 30, 30]));
        }
    }
    img
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("routeline synthetic track demo");
    println!("==============================\n");

    let img = draw_map(640, 480);
    let seed = PixelPoint::new(60, 300);

    println!("Tracer presets:");
    let presets = vec![
        ("Default", TracerBuilder::new()),
        ("Thin line", TracerBuilder::new().preset_thin_line()),
        ("Sketch", TracerBuilder::new().preset_sketch()),
        ("Averaged", TracerBuilder::new().running_average(16).tolerance(60.0)),
    ];
    for (name, builder) in presets {
        println!("   {}: {}", name, builder.summary());
        let tracer = builder.build()?;
        let start = Instant::now();
        let path = tracer.trace(&img, seed)?;
        println!("   • {:.2?}, {} points, {:.0} px", start.elapsed(), path.len(), path.length_px());
    }

    let tracer = TracerBuilder::new().build()?;
    let path = tracer.trace(&img, seed)?;
    let simple = simplify(&path, 1.5);
    println!("\nSimplified {} points to {}", path.len(), simple.len());

    // Two references fix scale and rotation, a third also fixes shear
    let references = [
        ReferencePoint::new(PixelPoint::new(40, 400), GeoPoint::new(60.1640, 24.9300)),
        ReferencePoint::new(PixelPoint::new(520, 40), GeoPoint::new(60.1700, 24.9480)),
        ReferencePoint::new(PixelPoint::new(520, 400), GeoPoint::new(60.1640, 24.9480)),
    ];
    for (name, refs, mode) in [
        ("Similarity", &references[..2], SimilarityMode::Uniform),
        ("Axis aligned", &references[..2], SimilarityMode::AxisAligned),
        ("Affine", &references[..], SimilarityMode::Uniform),
    ] {
        let transform = CorrespondenceSolver::new(mode).solve(refs)?;
        let geo = Georeferencer::new(transform).project(&simple);
        println!("   {}: {:.0} m, rms {:.2} m", name, geo.length_m(), transform.rms_error(&references));
    }

    let mut session = TrackSession::new(tracer, CorrespondenceSolver::default(), references.len())?.with_simplify(1.5);
    session.load_decoded(img.clone());
    session.trace(seed)?;
    for reference in &references {
        session.place_pixel(reference.pixel)?;
        session.place_geo(reference.geo)?;
    }
    println!("\nSession state: {:?}", session.state());

    let track = session.best_track()?;
    std::fs::write("synthetic_track.gpx", write_gpx(track, Some("Synthetic route"), OffsetDateTime::now_utc())?)?;
    std::fs::write("synthetic_track.svg", path_to_svg(&simple, img.width(), img.height()))?;
    render_overlay(&img, &simple, seed, None)?.save("synthetic_track.png")?;
    println!("Saved synthetic_track.gpx, synthetic_track.svg and synthetic_track.png");

    Ok(())
}
