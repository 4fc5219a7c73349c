use routeline_core::{PixelPath, PixelPoint};

/// Ramer-Douglas-Peucker simplification.
///
/// Keeps both endpoints and every vertex farther than `epsilon` pixels from
/// the chord of its span. `epsilon <= 0` returns the path unchanged.
pub fn simplify(path: &PixelPath, epsilon: f64) -> PixelPath {
    let points = path.points();
    if points.len() < 3 || !(epsilon > 0.0) {
        return path.clone();
    }

    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;

    // Explicit stack instead of recursion; traced paths can be long
    let mut spans = vec![(0usize, points.len() - 1)];
    while let Some((start, end)) = spans.pop() {
        if end <= start + 1 {
            continue;
        }
        let (mut far_index, mut far_dist) = (start, 0.0);
        for i in start + 1..end {
            let d = chord_distance(points[i], points[start], points[end]);
            if d > far_dist {
                far_index = i;
                far_dist = d;
            }
        }
        if far_dist > epsilon {
            keep[far_index] = true;
            spans.push((start, far_index));
            spans.push((far_index, end));
        }
    }

    let kept: Vec<PixelPoint> = points
        .iter()
        .zip(&keep)
        .filter_map(|(p, &k)| k.then_some(*p))
        .collect();
    PixelPath::new(kept).unwrap_or_else(|| path.clone())
}

/// Distance from `p` to the segment `a`-`b`
fn chord_distance(p: PixelPoint, a: PixelPoint, b: PixelPoint) -> f64 {
    let (px, py) = (p.x as f64, p.y as f64);
    let (ax, ay) = (a.x as f64, a.y as f64);
    let (bx, by) = (b.x as f64, b.y as f64);
    let (dx, dy) = (bx - ax, by - ay);
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        return (px - ax).hypot(py - ay);
    }
    let t = (((px - ax) * dx + (py - ay) * dy) / len2).clamp(0.0, 1.0);
    (px - (ax + t * dx)).hypot(py - (ay + t * dy))
}
