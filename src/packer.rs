use crate::error::{OptimizeError, Result};
use crate::types::Pattern;

/// A stick being filled while packing.
#[derive(Debug, Clone)]
struct StickBin {
    stick_length: f64,
    kerf: f64,
    cuts: Vec<f64>,
    used: f64,
}

impl StickBin {
    fn new(stick_length: f64, kerf: f64) -> Self {
        Self {
            stick_length,
            kerf,
            cuts: Vec::new(),
            used: 0.0,
        }
    }

    /// One kerf is charged per cut already on the stick; the first cut is free.
    fn fits(&self, length: f64) -> bool {
        self.used + self.kerf * self.cuts.len() as f64 + length <= self.stick_length
    }

    fn place(&mut self, length: f64) {
        self.cuts.push(length);
        self.used += length;
    }

    fn drop_length(&self) -> f64 {
        let kerf_loss = match self.cuts.len() {
            0 | 1 => 0.0,
            n => self.kerf * (n - 1) as f64,
        };
        self.stick_length - (self.used + kerf_loss)
    }

    fn into_pattern(self) -> Pattern {
        let drop = self.drop_length();
        Pattern {
            cuts: self.cuts,
            drop,
        }
    }
}

/// First-fit-descending packing of `cuts` onto sticks of `stick_length`.
///
/// Cuts are stable-sorted longest first, then each goes into the first open
/// stick (in creation order) with room for it plus kerf. A new stick is
/// opened only when none fits. Fails if any single cut is longer than a
/// stick.
pub fn pack(cuts: &[f64], stick_length: f64, kerf: f64) -> Result<Vec<Pattern>> {
    if !(stick_length.is_finite() && stick_length > 0.0) {
        return Err(OptimizeError::InvalidStickLength(stick_length));
    }
    if !(kerf.is_finite() && kerf >= 0.0) {
        return Err(OptimizeError::InvalidKerf(kerf));
    }
    if let Some(&length) = cuts.iter().find(|&&c| c > stick_length) {
        return Err(OptimizeError::UnpackableCut {
            length,
            stick_length,
        });
    }

    let mut sorted = cuts.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));

    let mut bins: Vec<StickBin> = Vec::new();
    for length in sorted {
        match bins.iter_mut().find(|bin| bin.fits(length)) {
            Some(bin) => bin.place(length),
            None => {
                let mut bin = StickBin::new(stick_length, kerf);
                bin.place(length);
                bins.push(bin);
            }
        }
    }

    tracing::debug!(
        cuts = cuts.len(),
        sticks = bins.len(),
        stick_length,
        kerf,
        "packed"
    );

    Ok(bins.into_iter().map(StickBin::into_pattern).collect())
}
