use std::borrow::Cow;

/// FBI 9-tap analysis lowpass filter.
pub const LOWPASS_9: [f64; 9] = [
    0.03782845550699546,
    -0.02384946501938000,
    -0.11062440441842342,
    0.37740285561265380,
    0.85269867900940344,
    0.37740285561265380,
    -0.11062440441842342,
    -0.02384946501938000,
    0.03782845550699546,
];

/// FBI 7-tap analysis highpass filter.
pub const HIGHPASS_7: [f64; 7] = [
    0.06453888262893845,
    -0.04068941760955844,
    -0.41809227322221221,
    0.78848561640566439,
    -0.41809227322221221,
    -0.04068941760955844,
    0.06453888262893845,
];

/// Symmetric filter holding all of its taps.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Whole-sample symmetric, odd tap count.
    WSS(Vec<f64>),
    /// Half-sample symmetric, even tap count.
    HSS(Vec<f64>),
}

impl Filter {
    pub fn from_taps(taps: Vec<f64>) -> Self {
        if taps.len() % 2 == 1 {
            Filter::WSS(taps)
        } else {
            Filter::HSS(taps)
        }
    }

    pub fn lowpass() -> Self {
        Filter::from_taps(LOWPASS_9.to_vec())
    }

    pub fn highpass() -> Self {
        Filter::from_taps(HIGHPASS_7.to_vec())
    }

    pub fn taps(&self) -> &[f64] {
        match self {
            Filter::WSS(coefficients) | Filter::HSS(coefficients) => coefficients,
        }
    }

    pub fn len(&self) -> usize {
        self.taps().len()
    }

    pub fn is_empty(&self) -> bool {
        self.taps().is_empty()
    }

    pub fn is_whole_sample(&self) -> bool {
        matches!(self, Filter::WSS(_))
    }

    /// Taps from the centre to the end; the transform table only carries
    /// this half.
    pub fn upper_half(&self) -> &[f64] {
        let taps = self.taps();
        &taps[taps.len() >> 1..]
    }

    /// Taps as used by the analysis pass. A half-sample highpass runs with
    /// its signs flipped; the flip lives on a private copy.
    pub(crate) fn analysis_taps(&self, highpass_of_even_bank: bool) -> Cow<'_, [f64]> {
        if highpass_of_even_bank {
            Cow::Owned(self.taps().iter().map(|c| -c).collect())
        } else {
            Cow::Borrowed(self.taps())
        }
    }
}
