/// Size of the largest aspect-preserving rectangle that fits inside a container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitRect {
    pub width: f32,
    pub height: f32,
}

impl FitRect {
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Whole-pixel size, the way a toolkit would allocate it.
    pub fn rounded(&self) -> (u32, u32) {
        (
            self.width.max(0.0).round() as u32,
            self.height.max(0.0).round() as u32,
        )
    }
}

/// Computes the largest centered rectangle with aspect ratio `aspect`
/// (width / height) that fits inside `container_width` x `container_height`.
///
/// Portrait content fills the container height first, landscape and square
/// content fill the width first; either is scaled back down if it overflows
/// the other axis. A zero-sized container yields a zero-area rectangle.
pub fn fit(aspect: f32, container_width: f32, container_height: f32) -> FitRect {
    let container_width = container_width.max(0.0);
    let container_height = container_height.max(0.0);
    if container_width == 0.0 || container_height == 0.0 || !(aspect > 0.0) {
        return FitRect {
            width: 0.0,
            height: 0.0,
        };
    }

    let (mut width, mut height);
    if aspect < 1.0 {
        height = container_height;
        width = aspect * height;
        if width > container_width {
            height *= container_width / width;
            width = container_width;
        }
    } else {
        width = container_width;
        height = width / aspect;
        if height > container_height {
            width *= container_height / height;
            height = container_height;
        }
    }

    FitRect { width, height }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_fits(aspect: f32, w: f32, h: f32) {
        let rect = fit(aspect, w, h);
        assert!(rect.width <= w + 1e-3, "{rect:?} wider than {w}");
        assert!(rect.height <= h + 1e-3, "{rect:?} taller than {h}");
        let ratio = rect.width / rect.height;
        assert!(
            (ratio - aspect).abs() <= aspect * 1e-4,
            "ratio {ratio} drifted from {aspect}"
        );
    }

    #[test]
    fn landscape_fills_width() {
        let rect = fit(2.0, 400.0, 400.0);
        assert_eq!(rect, FitRect { width: 400.0, height: 200.0 });
    }

    #[test]
    fn portrait_fills_height() {
        let rect = fit(0.5, 400.0, 400.0);
        assert_eq!(rect, FitRect { width: 200.0, height: 400.0 });
    }

    #[test]
    fn landscape_constrained_by_height() {
        let rect = fit(16.0 / 9.0, 800.0, 300.0);
        assert_eq!(rect.rounded(), (533, 300));
    }

    #[test]
    fn portrait_constrained_by_width() {
        let rect = fit(0.8, 100.0, 400.0);
        assert_eq!(rect.rounded(), (100, 125));
    }

    #[test]
    fn square_in_square() {
        assert_eq!(fit(1.0, 500.0, 500.0).rounded(), (500, 500));
    }

    #[test]
    fn wide_art_in_square_window_rounds_like_a_toolkit() {
        assert_eq!(fit(16.0 / 9.0, 500.0, 500.0).rounded(), (500, 281));
    }

    #[test]
    fn zero_container_is_degenerate() {
        assert!(fit(1.5, 0.0, 300.0).is_empty());
        assert!(fit(0.5, 300.0, 0.0).is_empty());
        assert!(fit(1.0, 0.0, 0.0).is_empty());
    }

    #[test]
    fn always_inside_container() {
        let aspects = [0.1, 0.5, 0.75, 1.0, 1.333, 16.0 / 9.0, 3.0, 12.5];
        let sizes = [(1.0, 1.0), (37.0, 911.0), (640.0, 480.0), (1920.0, 1080.0), (5.0, 4000.0)];
        for &aspect in &aspects {
            for &(w, h) in &sizes {
                assert_fits(aspect, w, h);
            }
        }
    }

    #[test]
    fn deterministic() {
        let first = fit(1.25, 321.0, 123.0);
        for _ in 0..10 {
            assert_eq!(fit(1.25, 321.0, 123.0), first);
        }
    }
}
