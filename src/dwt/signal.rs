//! Symmetric extension of a strided line of samples.
//!
//! Positions are absolute indices into the image buffer. A line runs from
//! `first` to `last` in steps of `stride`; a cursor walking past either end
//! bounces back, visiting the edge sample twice when the matching `repeat`
//! flag is still set (half-sample extension) and once otherwise (whole-sample
//! extension). Each repeat flag is consumed by its first bounce.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line {
    pub first: isize,
    pub last: isize,
    pub stride: isize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalCursor {
    index: isize,
    step: isize,
    repeat_first: bool,
    repeat_last: bool,
}

impl SignalCursor {
    /// Cursor `offset` samples into `line`, initially walking backwards.
    pub fn new(line: &Line, offset: isize, repeat_first: bool, repeat_last: bool) -> Self {
        SignalCursor {
            index: line.first + offset * line.stride,
            step: -line.stride,
            repeat_first,
            repeat_last,
        }
    }

    pub fn index(&self) -> isize {
        self.index
    }

    /// One tap further along the extended signal, turning at either end.
    pub fn next_tap(&mut self, line: &Line) {
        if self.index == line.first {
            self.step = if self.repeat_first {
                self.repeat_first = false;
                0
            } else {
                line.stride
            };
        }
        if self.index == line.last {
            self.step = if self.repeat_last {
                self.repeat_last = false;
                0
            } else {
                -line.stride
            };
        }
        self.index += self.step;
    }

    /// Moves a filter centre by one sample. Centres only ever bounce off
    /// the start of the line.
    pub fn next_centre(&mut self, line: &Line) {
        if self.index == line.first {
            self.step = if self.repeat_first {
                self.repeat_first = false;
                0
            } else {
                line.stride
            };
        }
        self.index += self.step;
    }

    /// Positions visited by the taps of a filter centred on this cursor.
    pub fn taps<'a>(&self, line: &'a Line) -> TapIter<'a> {
        TapIter {
            cursor: *self,
            line,
            started: false,
        }
    }
}

pub struct TapIter<'a> {
    cursor: SignalCursor,
    line: &'a Line,
    started: bool,
}

impl<'a> Iterator for TapIter<'a> {
    type Item = isize;

    fn next(&mut self) -> Option<Self::Item> {
        if self.started {
            self.cursor.next_tap(self.line);
        } else {
            self.started = true;
        }
        Some(self.cursor.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(len: isize, stride: isize) -> Line {
        Line {
            first: 0,
            last: (len - 1) * stride,
            stride,
        }
    }

    #[test]
    fn test_whole_sample_taps() {
        let line = line(4, 1);
        let cursor = SignalCursor::new(&line, 2, false, false);
        let actual = cursor.taps(&line).take(9).collect::<Vec<_>>();
        assert_eq!(actual, vec![2, 1, 0, 1, 2, 3, 2, 1, 0]);
    }

    #[test]
    fn test_half_sample_taps() {
        let line = line(4, 1);
        let cursor = SignalCursor::new(&line, 1, true, true);
        let actual = cursor.taps(&line).take(10).collect::<Vec<_>>();
        assert_eq!(actual, vec![1, 0, 0, 1, 2, 3, 3, 2, 1, 0]);
    }

    #[test]
    fn test_strided_taps() {
        let line = Line {
            first: 5,
            last: 5 + 2 * 10,
            stride: 10,
        };
        let cursor = SignalCursor::new(&line, 1, false, false);
        let actual = cursor.taps(&line).take(6).collect::<Vec<_>>();
        assert_eq!(actual, vec![15, 5, 15, 25, 15, 5]);
    }

    #[test]
    fn test_centre_bounces_at_start_only() {
        let line = line(3, 1);
        let mut cursor = SignalCursor::new(&line, 2, false, false);
        let mut visited = vec![];
        for _ in 0..6 {
            visited.push(cursor.index());
            cursor.next_centre(&line);
        }
        assert_eq!(visited, vec![2, 1, 0, 1, 2, 3]);
    }
}
