use crate::detection::BBox;

/// Intersection-over-union of two boxes. Zero when they do not overlap
/// or when the union is empty.
pub fn compute_iou(a: &BBox, b: &BBox) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let inter_area = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.area() + b.area() - inter_area;

    if union <= 0.0 || !union.is_finite() {
        return 0.0;
    }

    (inter_area / union).clamp(0.0, 1.0)
}

/// `1 - cos(a, b)`. `None` when the lengths differ or either vector is zero.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na <= f32::EPSILON || nb <= f32::EPSILON {
        return None;
    }
    Some(1.0 - dot / (na * nb))
}

/// Scale to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_iou_identity_and_disjoint() {
        let a = BBox::new(10.0, 10.0, 50.0, 50.0);
        assert_relative_eq!(compute_iou(&a, &a), 1.0);

        let b = BBox::new(60.0, 60.0, 80.0, 80.0);
        assert_eq!(compute_iou(&a, &b), 0.0);

        // touching edges share no area
        let c = BBox::new(50.0, 10.0, 90.0, 50.0);
        assert_eq!(compute_iou(&a, &c), 0.0);
    }

    #[test]
    fn test_iou_partial_overlap() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(5.0, 0.0, 15.0, 10.0);
        // 50 / 150
        assert_relative_eq!(compute_iou(&a, &b), 1.0 / 3.0, epsilon = 1e-6);
        assert_relative_eq!(compute_iou(&a, &b), compute_iou(&b, &a));
    }

    #[test]
    fn test_iou_bounds_over_grid() {
        let base = BBox::new(20.0, 20.0, 60.0, 60.0);
        for dx in (-50..=50).step_by(7) {
            for dy in (-50..=50).step_by(11) {
                let other = BBox::new(
                    20.0 + dx as f32,
                    20.0 + dy as f32,
                    45.0 + dx as f32,
                    70.0 + dy as f32,
                );
                let iou = compute_iou(&base, &other);
                assert!((0.0..=1.0).contains(&iou), "iou {iou} out of bounds");
            }
        }
    }

    #[test]
    fn test_iou_degenerate_is_zero() {
        let a = BBox::new(5.0, 5.0, 5.0, 5.0);
        assert_eq!(compute_iou(&a, &a), 0.0);
    }

    #[test]
    fn test_cosine_distance() {
        assert_relative_eq!(cosine_distance(&[1.0, 0.0], &[2.0, 0.0]).unwrap(), 0.0);
        assert_relative_eq!(cosine_distance(&[1.0, 0.0], &[0.0, 1.0]).unwrap(), 1.0);
        assert_relative_eq!(cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]).unwrap(), 2.0);
        assert!(cosine_distance(&[1.0], &[1.0, 0.0]).is_none());
        assert!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]).is_none());
    }

    #[test]
    fn test_l2_normalize() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert_relative_eq!(v[0], 0.6);
        assert_relative_eq!(v[1], 0.8);
    }
}
