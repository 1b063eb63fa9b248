use std::fmt;

/// Aspect ratios closer than this to the target count as "the same shape".
const RATIO_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Resolution { width, height }
    }

    fn area(&self) -> f64 {
        f64::from(self.width) * f64::from(self.height)
    }

    fn ratio(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        f64::from(self.width) / f64::from(self.height)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Picks the supported resolution nearest to `target`.
///
/// Candidates with a similar aspect ratio win on pixel area. When none is
/// similar, the closest aspect ratio wins and area breaks ties.
pub fn closest_resolution(target: Resolution, available: &[Resolution]) -> Option<Resolution> {
    let target_area = target.area();
    let target_ratio = target.ratio();

    #[rustfmt::skip]
    let scored: Vec<(Resolution, f64, f64)> = available
        .iter()
        .map(|res| (
            *res,
            (target_area  - res.area()).abs(),
            (target_ratio - res.ratio()).abs(),
        ))
        .collect();

    let within_ratio = scored
        .iter()
        .filter(|(_, _, ratio_diff)| *ratio_diff <= RATIO_THRESHOLD)
        .min_by(|a, b| a.1.total_cmp(&b.1));

    if let Some((res, _, _)) = within_ratio {
        return Some(*res);
    }

    scored
        .iter()
        .min_by(|a, b| a.2.total_cmp(&b.2).then(a.1.total_cmp(&b.1)))
        .map(|(res, _, _)| *res)
}
