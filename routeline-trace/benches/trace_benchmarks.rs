use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{Rgb, RgbImage};
use routeline_core::PixelPoint;
use routeline_trace::{simplify, PathTracer, TraceConfig, TracerBuilder};

/// Benchmark image with a route drawn in ink, plus the seed to start from
fn create_benchmark_image(width: u32, height: u32, shape: &str) -> (RgbImage, PixelPoint) {
    let mut img = RgbImage::from_pixel(width, height, Rgb([250, 248, 240]));
    let ink = Rgb([200, 30, 40]);
    let (w, h) = (width as i64, height as i64);

    let stamp = |img: &mut RgbImage, x: i64, y: i64, half: i64| {
        for dy in -half..=half {
            for dx in -half..=half {
                let (px, py) = (x + dx, y + dy);
                if px >= 0 && py >= 0 && px < w && py < h {
                    img.put_pixel(px as u32, py as u32, ink);
                }
            }
        }
    };

    match shape {
        "straight" => {
            for y in h / 10..h - h / 10 {
                stamp(&mut img, w / 2, y, 1);
            }
            (img, PixelPoint::new(w / 2, h / 2))
        }
        "zigzag" => {
            // Diagonal legs switching direction every eighth of the width
            let leg = (w / 8).max(1);
            let mut y = h / 2;
            for x in w / 10..w - w / 10 {
                y += if (x / leg) % 2 == 0 { 1 } else { -1 };
                stamp(&mut img, x, y.clamp(0, h - 1), 1);
            }
            (img, PixelPoint::new(w / 10, h / 2 + 1))
        }
        "spiral" => {
            let (cx, cy) = (w as f64 / 2.0, h as f64 / 2.0);
            let turns = 4.0;
            let max_r = (w.min(h) as f64) * 0.45;
            let samples = 20_000;
            for i in 0..samples {
                let t = i as f64 / samples as f64;
                let angle = t * turns * std::f64::consts::TAU;
                let r = 10.0 + t * (max_r - 10.0);
                stamp(&mut img, (cx + r * angle.cos()) as i64, (cy + r * angle.sin()) as i64, 1);
            }
            (img, PixelPoint::new((cx + 10.0) as i64, cy as i64))
        }
        _ => (img, PixelPoint::new(0, 0)),
    }
}

/// Benchmark a full trace for each route shape and image size
fn bench_trace(c: &mut Criterion) {
    let mut group = c.benchmark_group("trace");

    let sizes = vec![(256, 256), (512, 512), (1024, 768)];
    let shapes = vec!["straight", "zigzag", "spiral"];

    for &(width, height) in &sizes {
        for shape in &shapes {
            let tracer = PathTracer::new(TraceConfig::new()).unwrap();
            let (img, seed) = create_benchmark_image(width, height, shape);

            group.bench_with_input(
                BenchmarkId::new(format!("{}x{}", width, height), shape),
                &(tracer, img, seed),
                |b, (tracer, img, seed)| b.iter(|| black_box(tracer.trace(black_box(img), *seed).unwrap())),
            );
        }
    }

    group.finish();
}

/// Compare presets on the same image
fn bench_presets(c: &mut Criterion) {
    let mut group = c.benchmark_group("presets");
    let (img, seed) = create_benchmark_image(512, 512, "spiral");

    let presets = vec![
        ("default", TracerBuilder::new()),
        ("thin_line", TracerBuilder::new().preset_thin_line()),
        ("sketch", TracerBuilder::new().preset_sketch()),
    ];

    for (name, builder) in presets {
        let tracer = builder.build().unwrap();
        group.bench_function(name, |b| b.iter(|| black_box(tracer.trace(black_box(&img), seed).unwrap())));
    }

    group.finish();
}

/// Benchmark Douglas-Peucker on a traced path
fn bench_simplify(c: &mut Criterion) {
    let mut group = c.benchmark_group("simplify");
    let (img, seed) = create_benchmark_image(1024, 768, "spiral");
    let path = PathTracer::new(TraceConfig::new()).unwrap().trace(&img, seed).unwrap();

    for epsilon in [0.5, 2.0, 8.0] {
        group.bench_with_input(BenchmarkId::from_parameter(epsilon), &epsilon, |b, &eps| {
            b.iter(|| black_box(simplify(black_box(&path), eps)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_trace, bench_presets, bench_simplify);
criterion_main!(benches);
