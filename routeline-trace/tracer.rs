use image::RgbImage;
use log::{debug, info};
use routeline_core::{PixelPath, PixelPoint};
use std::collections::VecDeque;

use crate::config::TraceConfig;
use crate::error::TraceResult;
use crate::sampler::RasterSampler;
use crate::types::{Candidate, Color, ReferenceColor, Tangent};

/// Upper bound on the sideways continuation check, in pixels
const MAX_LOOKAHEAD: i64 = 16;

/// Largest tangent window radius tried for strokes wider than the configured window
const MAX_TANGENT_RADIUS: i64 = 64;

const EIGHT: [(i64, i64); 8] = [
    (-1, -1), (0, -1), (1, -1),
    (-1, 0), (1, 0),
    (-1, 1), (0, 1), (1, 1),
];

/// Follows a colored line from a seed pixel in both directions
#[derive(Debug, Clone)]
pub struct PathTracer {
    cfg: TraceConfig,
    neighborhood: Vec<(i64, i64)>,
}

/// Outcome of fitting the seed's region inside one tangent window
enum WindowFit {
    Line(Tangent),
    Widen,
    Reject,
}

/// Visited-pixel bitmap shared by both walk directions of one trace
struct VisitMap {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl VisitMap {
    fn new(width: u32, height: u32) -> Self {
        Self { width, height, bits: vec![false; width as usize * height as usize] }
    }

    fn index(&self, p: PixelPoint) -> Option<usize> {
        p.within(self.width, self.height)
            .then(|| p.y as usize * self.width as usize + p.x as usize)
    }

    fn insert(&mut self, p: PixelPoint) {
        if let Some(i) = self.index(p) {
            self.bits[i] = true;
        }
    }

    fn contains(&self, p: PixelPoint) -> bool {
        self.index(p).is_some_and(|i| self.bits[i])
    }
}

/// Offsets of all rings 1..=radius, inner rings first, row-major within a ring
fn neighborhood_offsets(radius: i64) -> Vec<(i64, i64)> {
    let mut offsets = Vec::new();
    for ring in 1..=radius {
        for dy in -ring..=ring {
            for dx in -ring..=ring {
                if dx.abs().max(dy.abs()) == ring {
                    offsets.push((dx, dy));
                }
            }
        }
    }
    offsets
}

impl PathTracer {
    /// Creates a new tracer with validation
    pub fn new(cfg: TraceConfig) -> TraceResult<Self> {
        cfg.validate()?;
        let neighborhood = neighborhood_offsets(cfg.radius as i64);
        Ok(Self { cfg, neighborhood })
    }

    /// Get tracer configuration
    pub fn config(&self) -> &TraceConfig {
        &self.cfg
    }

    /// Trace the line under `seed`.
    ///
    /// Returns the ordered pixel path from one end of the line to the other,
    /// seed included. When the seed is an endpoint the path starts at the
    /// seed. A seed that is not on a line yields the single-point path
    /// `[seed]`, which is a result, not an error.
    pub fn trace(&self, img: &RgbImage, seed: PixelPoint) -> TraceResult<PixelPath> {
        let sampler = RasterSampler::new(img);
        sampler.check(seed)?;
        let Some(seed_color) = sampler.color(seed) else {
            return Ok(PixelPath::single(seed));
        };

        let Some(tangent) = self.estimate_tangent(&sampler, seed, seed_color) else {
            debug!("no line under seed ({}, {})", seed.x, seed.y);
            return Ok(PixelPath::single(seed));
        };
        debug!(
            "seed ({}, {}): axis=({:.3}, {:.3}), stroke width {:.1}px from {} pixels",
            seed.x, seed.y, tangent.axis.0, tangent.axis.1, tangent.width, tangent.support
        );

        let (width, height) = sampler.dimensions();
        let mut visited = VisitMap::new(width, height);
        visited.insert(seed);

        let lookahead = (tangent.width.round() as i64).clamp(1, MAX_LOOKAHEAD);
        let forward = self.walk(&sampler, seed, seed_color, tangent.axis, lookahead, &mut visited);
        let backward = self.walk(
            &sampler,
            seed,
            seed_color,
            (-tangent.axis.0, -tangent.axis.1),
            lookahead,
            &mut visited,
        );

        let mut points = Vec::with_capacity(forward.len() + backward.len() + 1);
        match (forward.is_empty(), backward.is_empty()) {
            (_, true) => {
                points.push(seed);
                points.extend(forward);
            }
            (true, false) => {
                points.push(seed);
                points.extend(backward);
            }
            (false, false) => {
                points.extend(backward.into_iter().rev());
                points.push(seed);
                points.extend(forward);
            }
        }

        let path = PixelPath::new(points).unwrap_or_else(|| PixelPath::single(seed));
        info!(
            "traced {} points from seed ({}, {}), {:.0}px long",
            path.len(), seed.x, seed.y, path.length_px()
        );
        Ok(path)
    }

    /// Local line direction under `seed`, or `None` when the seed is not on a line
    pub fn tangent_at(&self, img: &RgbImage, seed: PixelPoint) -> TraceResult<Option<Tangent>> {
        let sampler = RasterSampler::new(img);
        sampler.check(seed)?;
        Ok(sampler
            .color(seed)
            .and_then(|color| self.estimate_tangent(&sampler, seed, color)))
    }

    fn matches(&self, sampler: &RasterSampler<'_>, p: PixelPoint, reference: Color) -> bool {
        sampler
            .color(p)
            .is_some_and(|c| self.cfg.metric.distance(c, reference) <= self.cfg.tolerance)
    }

    /// Principal axis of the matching pixels connected to the seed.
    ///
    /// Starts from the configured tangent window and doubles it, up to
    /// `MAX_TANGENT_RADIUS`, while the stroke is too thick for the window.
    fn estimate_tangent(&self, sampler: &RasterSampler<'_>, seed: PixelPoint, seed_color: Color) -> Option<Tangent> {
        let base = self.cfg.tangent_radius as i64;
        let cap = base.max(MAX_TANGENT_RADIUS);
        let mut r = base;
        loop {
            match self.fit_window(sampler, seed, seed_color, r, r > base) {
                WindowFit::Line(tangent) => return Some(tangent),
                WindowFit::Reject => return None,
                WindowFit::Widen if r >= cap => return None,
                WindowFit::Widen => {
                    r = (r * 2).min(cap);
                    debug!("seed ({}, {}): widening tangent window to {}", seed.x, seed.y, r);
                }
            }
        }
    }

    /// Fit the seed's region inside a window of Chebyshev radius `r`.
    ///
    /// A seed is on a line only if the window also holds non-matching pixels,
    /// the connected region is elongated, and it is narrower than `r`. An
    /// enlarged window asks for a region that reaches the window edge and is
    /// narrower than `r / 2`.
    fn fit_window(
        &self,
        sampler: &RasterSampler<'_>,
        seed: PixelPoint,
        seed_color: Color,
        r: i64,
        enlarged: bool,
    ) -> WindowFit {
        let side = (2 * r + 1) as usize;
        let local = |p: PixelPoint| (p.y - seed.y + r) as usize * side + (p.x - seed.x + r) as usize;

        let mut contrast = false;
        'scan: for dy in -r..=r {
            for dx in -r..=r {
                let p = seed.offset(dx, dy);
                if sampler.contains(p) && !self.matches(sampler, p, seed_color) {
                    contrast = true;
                    break 'scan;
                }
            }
        }
        if !contrast {
            return WindowFit::Widen;
        }

        // Breadth-first flood over 8-connected matches, clipped to the window
        let mut seen = vec![false; side * side];
        let mut queue = VecDeque::from([seed]);
        seen[local(seed)] = true;
        let mut members = Vec::new();
        while let Some(p) = queue.pop_front() {
            members.push(p);
            for &(dx, dy) in &EIGHT {
                let q = p.offset(dx, dy);
                if q.chebyshev(&seed) > r || seen[local(q)] {
                    continue;
                }
                seen[local(q)] = true;
                if self.matches(sampler, q, seed_color) {
                    queue.push_back(q);
                }
            }
        }
        if members.len() < 2 {
            return WindowFit::Reject;
        }
        let clipped = members.iter().any(|p| p.chebyshev(&seed) == r);
        if enlarged && !clipped {
            return WindowFit::Reject;
        }

        let n = members.len() as f64;
        let mx = members.iter().map(|p| p.x as f64).sum::<f64>() / n;
        let my = members.iter().map(|p| p.y as f64).sum::<f64>() / n;
        let (mut cxx, mut cyy, mut cxy) = (0.0, 0.0, 0.0);
        for p in &members {
            let (dx, dy) = (p.x as f64 - mx, p.y as f64 - my);
            cxx += dx * dx;
            cyy += dy * dy;
            cxy += dx * dy;
        }
        cxx /= n;
        cyy /= n;
        cxy /= n;

        let mean = 0.5 * (cxx + cyy);
        let spread = (0.25 * (cxx - cyy).powi(2) + cxy * cxy).sqrt();
        let (major, minor) = (mean + spread, (mean - spread).max(0.0));
        if major <= self.cfg.min_elongation * minor {
            return if clipped { WindowFit::Widen } else { WindowFit::Reject };
        }

        // Variance of a uniform stroke of width w is (w^2 - 1) / 12
        let width = (12.0 * minor + 1.0).sqrt();
        let limit = if enlarged { r as f64 / 2.0 } else { r as f64 };
        if width > limit {
            return WindowFit::Widen;
        }

        let theta = 0.5 * (2.0 * cxy).atan2(cxx - cyy);
        WindowFit::Line(Tangent { axis: (theta.cos(), theta.sin()), width, support: members.len() })
    }

    /// Walk away from `start` along `initial_heading` until a termination condition holds
    fn walk(
        &self,
        sampler: &RasterSampler<'_>,
        start: PixelPoint,
        seed_color: Color,
        initial_heading: (f64, f64),
        lookahead: i64,
        visited: &mut VisitMap,
    ) -> Vec<PixelPoint> {
        let color_window = match self.cfg.reference_color {
            ReferenceColor::Seed => 0,
            ReferenceColor::RunningAverage { window } => window,
        };

        let mut out = Vec::new();
        let mut history = VecDeque::with_capacity(self.cfg.history_window + 1);
        history.push_back(start);
        let mut colors: VecDeque<Color> = VecDeque::with_capacity(color_window + 1);
        let mut last_step = None;
        let mut current = start;

        while out.len() < self.cfg.max_steps {
            let reference = Self::reference_color(seed_color, &colors);
            let heading = self.heading(&history, initial_heading);

            let Some(best) = self.best_candidate(sampler, current, last_step, heading, reference, lookahead, &history, visited)
            else {
                debug!("walk stopped at ({}, {}): no matching neighbor", current.x, current.y);
                return out;
            };
            if visited.contains(best.point) {
                debug!("walk stopped at ({}, {}): revisits ({}, {})", current.x, current.y, best.point.x, best.point.y);
                return out;
            }

            visited.insert(best.point);
            if color_window > 0 {
                if let Some(c) = sampler.color(best.point) {
                    colors.push_back(c);
                    if colors.len() > color_window {
                        colors.pop_front();
                    }
                }
            }
            history.push_back(best.point);
            if history.len() > self.cfg.history_window {
                history.pop_front();
            }
            last_step = Some(best.offset);
            current = best.point;
            out.push(current);
        }

        debug!("walk stopped at ({}, {}): step limit {} reached", current.x, current.y, self.cfg.max_steps);
        out
    }

    fn reference_color(seed_color: Color, recent: &VecDeque<Color>) -> Color {
        if recent.is_empty() {
            return seed_color;
        }
        let mut sum = [0.0f32; 3];
        for c in recent {
            sum[0] += c[0];
            sum[1] += c[1];
            sum[2] += c[2];
        }
        let n = recent.len() as f32;
        [sum[0] / n, sum[1] / n, sum[2] / n]
    }

    /// Unit direction over the last `heading_span` steps
    fn heading(&self, history: &VecDeque<PixelPoint>, initial: (f64, f64)) -> (f64, f64) {
        let n = history.len();
        if n < 2 {
            return initial;
        }
        let span = self.cfg.heading_span.min(n - 1);
        let (from, to) = (history[n - 1 - span], history[n - 1]);
        let (dx, dy) = ((to.x - from.x) as f64, (to.y - from.y) as f64);
        let len = dx.hypot(dy);
        if len == 0.0 {
            initial
        } else {
            (dx / len, dy / len)
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn best_candidate(
        &self,
        sampler: &RasterSampler<'_>,
        current: PixelPoint,
        last_step: Option<(i64, i64)>,
        heading: (f64, f64),
        reference: Color,
        lookahead: i64,
        history: &VecDeque<PixelPoint>,
        visited: &VisitMap,
    ) -> Option<Candidate> {
        let mut best: Option<Candidate> = None;

        for &(dx, dy) in &self.neighborhood {
            let point = current.offset(dx, dy);
            let Some(color) = sampler.color(point) else {
                continue;
            };
            let distance = self.cfg.metric.distance(color, reference);
            if distance > self.cfg.tolerance {
                continue;
            }

            match last_step {
                // First step must leave along the requested side of the tangent
                None => {
                    if dx as f64 * heading.0 + dy as f64 * heading.1 <= 1e-9 {
                        continue;
                    }
                }
                Some((sx, sy)) => {
                    let along = dx * sx + dy * sy;
                    if along < 0 {
                        continue;
                    }
                    if along == 0 && !self.continues(sampler, point, (dx, dy), reference, lookahead, visited) {
                        continue;
                    }
                }
            }

            if Self::near_history(point, history) {
                continue;
            }

            let ring = dx.abs().max(dy.abs());
            let norm = ((dx * dx + dy * dy) as f64).sqrt();
            let cos = (dx as f64 * heading.0 + dy as f64 * heading.1) / norm;
            let cost = distance
                + self.cfg.turn_penalty * (1.0 - cos) as f32
                + self.cfg.gap_penalty * (ring - 1) as f32;

            if best.map_or(true, |b| cost < b.cost) {
                best = Some(Candidate { point, offset: (dx, dy), cost });
            }
        }

        best
    }

    /// A sideways step is only worth taking if the line really continues that way
    fn continues(
        &self,
        sampler: &RasterSampler<'_>,
        from: PixelPoint,
        dir: (i64, i64),
        reference: Color,
        lookahead: i64,
        visited: &VisitMap,
    ) -> bool {
        (1..=lookahead).all(|t| {
            let p = from.offset(dir.0 * t, dir.1 * t);
            !visited.contains(p) && self.matches(sampler, p, reference)
        })
    }

    /// Adjacent to a trailing point other than the current point and its predecessor
    fn near_history(point: PixelPoint, history: &VecDeque<PixelPoint>) -> bool {
        let older = history.len().saturating_sub(2);
        history.iter().take(older).any(|h| h.chebyshev(&point) <= 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TracerBuilder;
    use crate::error::TraceError;
    use image::Rgb;
    use proptest::prelude::*;

    const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
    const INK: Rgb<u8> = Rgb([20, 30, 160]);

    fn create_test_tracer() -> PathTracer {
        PathTracer::new(TraceConfig::new()).unwrap()
    }

    fn create_blank_image(width: u32, height: u32) -> RgbImage {
        RgbImage::from_pixel(width, height, WHITE)
    }

    /// Stamp a filled square of side `2 * half + 1` centered on every pixel of the segment
    fn draw_segment(img: &mut RgbImage, from: (i64, i64), to: (i64, i64), half: i64, color: Rgb<u8>) {
        let steps = (to.0 - from.0).abs().max((to.1 - from.1).abs()).max(1);
        for i in 0..=steps {
            let x = from.0 + (to.0 - from.0) * i / steps;
            let y = from.1 + (to.1 - from.1) * i / steps;
            for dy in -half..=half {
                for dx in -half..=half {
                    let (px, py) = (x + dx, y + dy);
                    if px >= 0 && py >= 0 && (px as u32) < img.width() && (py as u32) < img.height() {
                        img.put_pixel(px as u32, py as u32, color);
                    }
                }
            }
        }
    }

    fn create_vertical_line_image(width: u32, height: u32, x: i64, y_top: i64, y_bottom: i64, half: i64) -> RgbImage {
        let mut img = create_blank_image(width, height);
        draw_segment(&mut img, (x, y_top), (x, y_bottom), half, INK);
        img
    }

    #[test]
    fn test_out_of_bounds_seed() {
        let tracer = create_test_tracer();
        let img = create_blank_image(40, 30);

        for seed in [
            PixelPoint::new(-1, 10),
            PixelPoint::new(40, 10),
            PixelPoint::new(10, -1),
            PixelPoint::new(10, 30),
        ] {
            let result = tracer.trace(&img, seed);
            assert!(matches!(result, Err(TraceError::OutOfBounds { .. })), "seed {:?}", seed);
        }
    }

    #[test]
    fn test_uniform_background_gives_single_point() {
        let tracer = create_test_tracer();
        let img = create_blank_image(50, 50);

        let path = tracer.trace(&img, PixelPoint::new(25, 25)).unwrap();
        assert!(path.is_single());
        assert_eq!(path.first(), PixelPoint::new(25, 25));

        let corner = tracer.trace(&img, PixelPoint::new(0, 0)).unwrap();
        assert!(corner.is_single());
    }

    #[test]
    fn test_filled_blob_is_not_a_line() {
        let tracer = create_test_tracer();
        let mut img = create_blank_image(100, 100);
        draw_segment(&mut img, (20, 50), (80, 50), 30, INK);

        let path = tracer.trace(&img, PixelPoint::new(50, 50)).unwrap();
        assert!(path.is_single());
    }

    #[test]
    fn test_vertical_line_from_endpoint() {
        let _ = env_logger::builder().is_test(true).try_init();
        let tracer = create_test_tracer();
        let img = create_vertical_line_image(200, 200, 100, 20, 150, 1);

        let path = tracer.trace(&img, PixelPoint::new(100, 150)).unwrap();
        let points = path.points();

        assert_eq!(path.first(), PixelPoint::new(100, 150));
        assert!(points.windows(2).all(|w| w[1].y < w[0].y), "y must strictly decrease");
        assert!(points.iter().all(|p| (p.x - 100).abs() <= 1));
        assert!(path.last().y <= 21, "ended at {:?}", path.last());
    }

    #[test]
    fn test_thick_line_end_has_no_hook() {
        let tracer = create_test_tracer();
        let img = create_vertical_line_image(200, 200, 100, 20, 150, 2);

        let path = tracer.trace(&img, PixelPoint::new(100, 150)).unwrap();
        let points = path.points();

        assert!(points.windows(2).all(|w| w[1].y < w[0].y));
        assert!(points.iter().all(|p| (p.x - 100).abs() <= 2));
        assert!(path.last().y <= 22);
    }

    #[test]
    fn test_seed_mid_line_walks_both_ways() {
        let tracer = create_test_tracer();
        let mut img = create_blank_image(200, 100);
        draw_segment(&mut img, (20, 50), (180, 50), 1, INK);

        let seed = PixelPoint::new(100, 50);
        let path = tracer.trace(&img, seed).unwrap();
        let xs: Vec<i64> = path.points().iter().map(|p| p.x).collect();

        assert!(path.points().contains(&seed));
        let (first, last) = (xs[0], xs[xs.len() - 1]);
        assert!(first.min(last) <= 21 && first.max(last) >= 179, "ends {} .. {}", first, last);
        // Monotonic one way or the other
        assert!(xs.windows(2).all(|w| w[1] > w[0]) || xs.windows(2).all(|w| w[1] < w[0]));
    }

    #[test]
    fn test_right_angle_turn_on_one_pixel_line() {
        let tracer = create_test_tracer();
        let mut img = create_blank_image(120, 120);
        draw_segment(&mut img, (30, 80), (30, 30), 0, INK);
        draw_segment(&mut img, (30, 30), (90, 30), 0, INK);

        let path = tracer.trace(&img, PixelPoint::new(30, 80)).unwrap();
        assert_eq!(path.first(), PixelPoint::new(30, 80));
        assert_eq!(path.last(), PixelPoint::new(90, 30));
    }

    #[test]
    fn test_closed_loop_terminates() {
        let tracer = create_test_tracer();
        let mut img = create_blank_image(100, 100);
        draw_segment(&mut img, (20, 20), (80, 20), 0, INK);
        draw_segment(&mut img, (80, 20), (80, 80), 0, INK);
        draw_segment(&mut img, (80, 80), (20, 80), 0, INK);
        draw_segment(&mut img, (20, 80), (20, 20), 0, INK);

        let seed = PixelPoint::new(50, 80);
        let path = tracer.trace(&img, seed).unwrap();

        assert!(path.len() > 200 && path.len() <= 240, "loop length {}", path.len());
        assert!(path.last().chebyshev(&seed) <= 1);
    }

    #[test]
    fn test_gap_needs_larger_radius() {
        let mut img = create_blank_image(120, 100);
        draw_segment(&mut img, (10, 50), (100, 50), 0, INK);
        img.put_pixel(50, 50, WHITE);

        let seed = PixelPoint::new(10, 50);
        let short = create_test_tracer().trace(&img, seed).unwrap();
        assert_eq!(short.last(), PixelPoint::new(49, 50));

        let bridging = TracerBuilder::new().radius(2).build().unwrap();
        let long = bridging.trace(&img, seed).unwrap();
        assert_eq!(long.last(), PixelPoint::new(100, 50));
    }

    #[test]
    fn test_running_average_follows_color_drift() {
        let mut img = create_blank_image(200, 100);
        for x in 10..=190u32 {
            let t = (x - 10) as f32 / 180.0;
            let color = Rgb([(200.0 * (1.0 - t)) as u8, 0, (200.0 * t) as u8]);
            img.put_pixel(x, 50, color);
        }
        let seed = PixelPoint::new(10, 50);

        let fixed = TracerBuilder::new().tolerance(30.0).build().unwrap();
        let fixed_path = fixed.trace(&img, seed).unwrap();
        assert!(fixed_path.last().x < 40, "fixed color reached {}", fixed_path.last().x);

        let adaptive = TracerBuilder::new().tolerance(30.0).running_average(8).build().unwrap();
        let adaptive_path = adaptive.trace(&img, seed).unwrap();
        assert_eq!(adaptive_path.last().x, 190);
    }

    #[test]
    fn test_line_touching_image_border() {
        let tracer = create_test_tracer();
        let mut img = create_blank_image(80, 40);
        draw_segment(&mut img, (0, 20), (79, 20), 1, INK);

        let path = tracer.trace(&img, PixelPoint::new(40, 20)).unwrap();
        let xs: Vec<i64> = path.points().iter().map(|p| p.x).collect();
        assert!(xs.contains(&0));
        assert!(xs.contains(&79));
    }

    #[test]
    fn test_step_limit() {
        let tracer = TracerBuilder::new().max_steps(10).build().unwrap();
        let img = create_vertical_line_image(100, 200, 50, 10, 190, 1);

        let path = tracer.trace(&img, PixelPoint::new(50, 190)).unwrap();
        assert_eq!(path.len(), 11);
    }

    fn assert_spans_vertical_line(path: &PixelPath, x: i64, half: i64) {
        let ys: Vec<i64> = path.points().iter().map(|p| p.y).collect();
        assert!(path.len() > 250, "only {} points", path.len());
        assert!(path.points().iter().all(|p| (p.x - x).abs() <= half));
        assert!(ys.iter().min().is_some_and(|&y| y <= 52), "top {:?}", ys.iter().min());
        assert!(ys.iter().max().is_some_and(|&y| y >= 347), "bottom {:?}", ys.iter().max());
    }

    #[test]
    fn test_nine_pixel_stroke_widens_tangent_window() {
        let tracer = create_test_tracer();
        let img = create_vertical_line_image(400, 400, 200, 50, 349, 4);

        let tangent = tracer.tangent_at(&img, PixelPoint::new(200, 200)).unwrap().unwrap();
        assert!((tangent.width - 9.0).abs() < 0.5, "width {}", tangent.width);
        assert!(tangent.axis.0.abs() < 0.05);

        let path = tracer.trace(&img, PixelPoint::new(200, 200)).unwrap();
        assert_spans_vertical_line(&path, 200, 4);
    }

    #[test]
    fn test_thirteen_pixel_stroke_is_traced() {
        let tracer = create_test_tracer();
        let img = create_vertical_line_image(400, 400, 200, 50, 349, 6);

        let path = tracer.trace(&img, PixelPoint::new(200, 200)).unwrap();
        assert_spans_vertical_line(&path, 200, 6);
    }

    #[test]
    fn test_tangent_of_diagonal_line() {
        let tracer = create_test_tracer();
        let mut img = create_blank_image(100, 100);
        draw_segment(&mut img, (10, 10), (90, 90), 1, INK);

        let tangent = tracer.tangent_at(&img, PixelPoint::new(50, 50)).unwrap().unwrap();
        let (ax, ay) = tangent.axis;
        assert!((ax.abs() - ay.abs()).abs() < 0.05);
        assert!(ax * ay > 0.0);
    }

    #[test]
    fn test_deterministic_trace() {
        let tracer = create_test_tracer();
        let mut img = create_blank_image(150, 150);
        draw_segment(&mut img, (20, 120), (70, 40), 1, INK);
        draw_segment(&mut img, (70, 40), (130, 90), 1, INK);

        let seed = PixelPoint::new(45, 80);
        let a = tracer.trace(&img, seed).unwrap();
        let b = tracer.trace(&img, seed).unwrap();
        assert_eq!(a, b);
        assert!(a.len() > 60);
    }

    proptest! {
        #[test]
        fn prop_outside_seeds_rejected(x in -50i64..100, y in -50i64..100) {
            prop_assume!(x < 0 || x >= 40 || y < 0 || y >= 30);
            let tracer = create_test_tracer();
            let img = create_blank_image(40, 30);
            let result = tracer.trace(&img, PixelPoint::new(x, y));
            prop_assert!(
                matches!(result, Err(TraceError::OutOfBounds { .. })),
                "expected OutOfBounds for ({}, {})", x, y
            );
        }

        #[test]
        fn prop_uniform_image_never_traces(x in 0i64..60, y in 0i64..45) {
            let tracer = create_test_tracer();
            let img = create_blank_image(60, 45);
            let path = tracer.trace(&img, PixelPoint::new(x, y)).unwrap();
            prop_assert!(path.is_single());
        }

        #[test]
        fn prop_trace_is_deterministic(x in 0i64..120, y in 0i64..120) {
            let tracer = create_test_tracer();
            let mut img = create_blank_image(120, 120);
            draw_segment(&mut img, (10, 100), (60, 20), 1, INK);
            draw_segment(&mut img, (60, 20), (110, 70), 2, INK);

            let seed = PixelPoint::new(x, y);
            let a = tracer.trace(&img, seed).unwrap();
            let b = tracer.trace(&img, seed).unwrap();
            prop_assert_eq!(a.points(), b.points());
            prop_assert!(a.points().windows(2).all(|w| w[0] != w[1]));
        }
    }
}
