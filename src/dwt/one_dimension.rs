use std::borrow::Cow;

use crate::dwt::filter::Filter;
use crate::dwt::signal::{Line, SignalCursor};

/// Where a batch of parallel lines lives in the source and destination
/// buffers. `pitch` steps from one line to the next, `stride` from one
/// sample to the next within a line.
#[derive(Debug, Clone, Copy)]
pub struct LineLayout {
    pub dst_start: usize,
    pub src_start: usize,
    pub lines: usize,
    pub len: usize,
    pub pitch: usize,
    pub stride: usize,
}

/// Two-channel analysis bank: splits each line into a lowpass and a highpass
/// half, each decimated by two.
#[derive(Debug, Clone)]
pub struct TwoChannelSubbandCoder {
    lowpass: Filter,
    highpass: Filter,
}

impl Default for TwoChannelSubbandCoder {
    fn default() -> Self {
        TwoChannelSubbandCoder::new(Filter::lowpass(), Filter::highpass())
    }
}

impl TwoChannelSubbandCoder {
    pub fn new(lowpass: Filter, highpass: Filter) -> Self {
        Self { lowpass, highpass }
    }

    pub fn lowpass(&self) -> &Filter {
        &self.lowpass
    }

    pub fn highpass(&self) -> &Filter {
        &self.highpass
    }

    /// Analyses every line described by `layout`, reading `src` and writing
    /// `dst`. Without `invert` the lowpass half (the longer one on odd
    /// lengths) is stored first.
    pub fn analysis(&self, dst: &mut [f64], src: &[f64], layout: &LineLayout, invert: bool) {
        let whole_sample = self.lowpass.is_whole_sample();
        let lo = self.lowpass.taps();
        let hi: Cow<'_, [f64]> = self.highpass.analysis_taps(!whole_sample);

        // filter centres and edge repeats
        let (lo_centre, hi_centre, lo_repeat, hi_repeat) = if whole_sample {
            let lo_centre = (lo.len() as isize - 1) / 2;
            let hi_centre = (hi.len() as isize - 1) / 2 - 1;
            (lo_centre, hi_centre, (false, false), (false, false))
        } else {
            let lo_centre = lo.len() as isize / 2 - 2;
            let hi_centre = hi.len() as isize / 2 - 2;
            (
                lo_centre.max(0),
                hi_centre.max(0),
                (lo_centre != -1, true),
                (hi_centre != -1, true),
            )
        };

        let (llen, hlen) = if layout.len % 2 == 1 {
            ((layout.len + 1) / 2, (layout.len - 1) / 2)
        } else {
            (layout.len / 2, layout.len / 2)
        };
        if llen == 0 {
            return;
        }

        let stride = layout.stride;
        for line_no in 0..layout.lines {
            let (mut lo_out, mut hi_out) = if invert {
                let hi_out = layout.dst_start + line_no * layout.pitch;
                (hi_out + hlen * stride, hi_out)
            } else {
                let lo_out = layout.dst_start + line_no * layout.pitch;
                (lo_out, lo_out + llen * stride)
            };

            let first = (layout.src_start + line_no * layout.pitch) as isize;
            let line = Line {
                first,
                last: first + (layout.len as isize - 1) * stride as isize,
                stride: stride as isize,
            };
            let mut lo_cursor = SignalCursor::new(&line, lo_centre, lo_repeat.0, lo_repeat.1);
            let mut hi_cursor = SignalCursor::new(&line, hi_centre, hi_repeat.0, hi_repeat.1);

            for _ in 0..hlen {
                dst[lo_out] = convolve(lo, src, &lo_cursor, &line);
                lo_out += stride;
                dst[hi_out] = convolve(&hi, src, &hi_cursor, &line);
                hi_out += stride;

                for _ in 0..2 {
                    lo_cursor.next_centre(&line);
                    hi_cursor.next_centre(&line);
                }
            }
            if llen > hlen {
                dst[lo_out] = convolve(lo, src, &lo_cursor, &line);
            }
        }
    }
}

/// One filter output centred on `cursor`. Positions outside `signal` (only
/// reachable on lines shorter than the filter) read as zero.
fn convolve(taps: &[f64], signal: &[f64], cursor: &SignalCursor, line: &Line) -> f64 {
    let mut products = taps
        .iter()
        .zip(cursor.taps(line))
        .map(|(c, index)| sample(signal, index) * c);
    let first = products.next().unwrap_or_default();
    products.fold(first, |acc, p| acc + p)
}

fn sample(signal: &[f64], index: isize) -> f64 {
    usize::try_from(index)
        .ok()
        .and_then(|i| signal.get(i))
        .copied()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    fn analyse_row(coder: &TwoChannelSubbandCoder, signal: &[f64], invert: bool) -> Vec<f64> {
        let mut out = vec![0.0; signal.len()];
        let layout = LineLayout {
            dst_start: 0,
            src_start: 0,
            lines: 1,
            len: signal.len(),
            pitch: signal.len(),
            stride: 1,
        };
        coder.analysis(&mut out, signal, &layout, invert);
        out
    }

    #[test]
    fn test_constant_signal() {
        let coder = TwoChannelSubbandCoder::default();
        let lo_gain: f64 = coder.lowpass().taps().iter().sum();
        let hi_gain: f64 = coder.highpass().taps().iter().sum();
        let out = analyse_row(&coder, &[3.0; 12], false);
        for v in &out[..6] {
            assert!((v - 3.0 * lo_gain).abs() < EPSILON);
        }
        for v in &out[6..] {
            assert!((v - 3.0 * hi_gain).abs() < EPSILON);
        }
    }

    #[test]
    fn test_impulse_response() {
        let coder = TwoChannelSubbandCoder::default();
        let mut signal = vec![0.0; 16];
        signal[8] = 1.0;
        let out = analyse_row(&coder, &signal, false);
        // lowpass sample k is centred on 2k, highpass sample k on 2k + 1
        assert!((out[4] - coder.lowpass().taps()[4]).abs() < EPSILON);
        assert!((out[3] - coder.lowpass().taps()[2]).abs() < EPSILON);
        assert!((out[8 + 2] - coder.highpass().taps()[0]).abs() < EPSILON);
        assert!((out[8 + 3] - coder.highpass().taps()[2]).abs() < EPSILON);
        assert!((out[8 + 4] - coder.highpass().taps()[2]).abs() < EPSILON);
    }

    #[test]
    fn test_odd_length_split() {
        let coder = TwoChannelSubbandCoder::default();
        let signal: Vec<f64> = (0..9).map(|i| i as f64).collect();
        let plain = analyse_row(&coder, &signal, false);
        let inverted = analyse_row(&coder, &signal, true);
        // five lowpass samples and four highpass samples
        assert_eq!(&plain[..5], &inverted[4..]);
        assert_eq!(&plain[5..], &inverted[..4]);
    }

    #[test]
    fn test_column_pass_matches_row_pass() {
        let coder = TwoChannelSubbandCoder::default();
        let signal: Vec<f64> = (0..10).map(|i| ((i * 7) % 5) as f64).collect();
        let row = analyse_row(&coder, &signal, false);

        // same signal laid out as the second column of a 3-wide image
        let width = 3;
        let mut image = vec![0.0; width * signal.len()];
        for (i, v) in signal.iter().enumerate() {
            image[i * width + 1] = *v;
        }
        let mut out = vec![0.0; image.len()];
        let layout = LineLayout {
            dst_start: 1,
            src_start: 1,
            lines: 1,
            len: signal.len(),
            pitch: 1,
            stride: width,
        };
        coder.analysis(&mut out, &image, &layout, false);
        for (i, v) in row.iter().enumerate() {
            assert_eq!(out[i * width + 1], *v);
        }
    }

    #[test]
    fn test_short_lines_do_not_panic() {
        let coder = TwoChannelSubbandCoder::default();
        for len in 0..5 {
            let signal = vec![1.0; len];
            let out = analyse_row(&coder, &signal, false);
            assert_eq!(out.len(), len);
        }
    }
}
