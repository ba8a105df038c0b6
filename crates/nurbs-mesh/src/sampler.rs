//! Lazy curve sampling.
//!
//! Adaptive mode walks a bisection tree depth-first with an explicit stack.
//! An interval is split only when its deviation exceeds the tolerance, so the
//! samples for a tolerance are a subset of the samples for any smaller one.

use log::trace;
use nurbs_core::Result;
use nurbs_geometry::Curve;
use nurbs_math::Point3;

use crate::polyline::{interval_deviation, CurveSample, Polyline};
use crate::sampling::Sampling;

#[derive(Debug, Clone, Copy)]
struct Interval {
    t0: f64,
    p0: Point3,
    t1: f64,
    p1: Point3,
    depth: u32,
}

#[derive(Debug)]
enum State {
    Fixed { next: usize, count: usize },
    Adaptive { stack: Vec<Interval>, started: bool },
    Done,
}

/// Finite, restartable sequence of samples along a curve.
///
/// Yields `Err` once and then stops if the curve cannot be evaluated.
pub struct CurveSampler<'a, C: Curve + ?Sized> {
    curve: &'a C,
    sampling: Sampling,
    breakpoints: Vec<f64>,
    state: State,
}

impl<'a, C: Curve + ?Sized> CurveSampler<'a, C> {
    pub fn new(curve: &'a C, sampling: Sampling) -> Result<Self> {
        sampling.validate()?;
        let mut breakpoints = curve.breakpoints();
        breakpoints.dedup();
        if breakpoints.len() < 2 {
            let (t0, t1) = curve.domain();
            breakpoints = vec![t0, t1];
        }
        let mut sampler = Self {
            curve,
            sampling,
            breakpoints,
            state: State::Done,
        };
        sampler.restart();
        Ok(sampler)
    }

    /// Rewind to the first sample.
    pub fn restart(&mut self) {
        self.state = match self.sampling {
            Sampling::Fixed(count) => State::Fixed { next: 0, count },
            Sampling::Adaptive { .. } => State::Adaptive {
                stack: Vec::new(),
                started: false,
            },
        };
    }

    fn sample(&self, t: f64) -> Result<CurveSample> {
        Ok(CurveSample {
            parameter: t,
            point: self.curve.point_at(t)?,
        })
    }

    fn next_fixed(&mut self) -> Option<Result<CurveSample>> {
        let State::Fixed { next, count } = &mut self.state else {
            return None;
        };
        if *next > *count {
            return None;
        }
        let (t0, t1) = self.curve.domain();
        let i = *next;
        let n = *count;
        *next += 1;
        let t = if i == n {
            t1
        } else {
            t0 + (t1 - t0) * i as f64 / n as f64
        };
        Some(self.sample(t))
    }

    fn next_adaptive(&mut self) -> Option<Result<CurveSample>> {
        let Sampling::Adaptive {
            tolerance,
            max_depth,
        } = self.sampling
        else {
            return None;
        };

        if let State::Adaptive { started: false, .. } = self.state {
            return Some(self.start_adaptive());
        }

        loop {
            let State::Adaptive { stack, .. } = &mut self.state else {
                return None;
            };
            let iv = stack.pop()?;
            let step = self.refine(iv, tolerance, max_depth);
            match step {
                Ok(Some(sample)) => return Some(Ok(sample)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }

    /// Evaluate the breakpoints, queue their intervals and yield the first.
    fn start_adaptive(&mut self) -> Result<CurveSample> {
        let points = self
            .breakpoints
            .iter()
            .map(|&t| self.curve.point_at(t))
            .collect::<Result<Vec<_>>>()?;

        // Reverse order so the leftmost interval is popped first
        let stack = (1..self.breakpoints.len())
            .rev()
            .map(|i| Interval {
                t0: self.breakpoints[i - 1],
                p0: points[i - 1],
                t1: self.breakpoints[i],
                p1: points[i],
                depth: 0,
            })
            .collect();
        self.state = State::Adaptive {
            stack,
            started: true,
        };
        Ok(CurveSample {
            parameter: self.breakpoints[0],
            point: points[0],
        })
    }

    /// Accept `iv` and return its end sample, or split it and return `None`.
    fn refine(&mut self, iv: Interval, tolerance: f64, max_depth: u32) -> Result<Option<CurveSample>> {
        let deviation = interval_deviation(self.curve, (iv.t0, iv.p0), (iv.t1, iv.p1))?;
        if deviation <= tolerance || iv.depth >= max_depth {
            if iv.depth >= max_depth && deviation > tolerance {
                trace!("sampler: depth limit at [{}, {}], deviation {}", iv.t0, iv.t1, deviation);
            }
            return Ok(Some(CurveSample {
                parameter: iv.t1,
                point: iv.p1,
            }));
        }

        let tm = 0.5 * (iv.t0 + iv.t1);
        let pm = self.curve.point_at(tm)?;
        if let State::Adaptive { stack, .. } = &mut self.state {
            let depth = iv.depth + 1;
            stack.push(Interval {
                t0: tm,
                p0: pm,
                t1: iv.t1,
                p1: iv.p1,
                depth,
            });
            stack.push(Interval {
                t0: iv.t0,
                p0: iv.p0,
                t1: tm,
                p1: pm,
                depth,
            });
        }
        Ok(None)
    }
}

impl<C: Curve + ?Sized> Iterator for CurveSampler<'_, C> {
    type Item = Result<CurveSample>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = match self.state {
            State::Fixed { .. } => self.next_fixed(),
            State::Adaptive { .. } => self.next_adaptive(),
            State::Done => None,
        };
        if matches!(item, Some(Err(_))) {
            self.state = State::Done;
        }
        item
    }
}

/// Sample `curve` into a polyline.
pub fn tessellate_curve<C: Curve + ?Sized>(curve: &C, sampling: Sampling) -> Result<Polyline> {
    let samples = CurveSampler::new(curve, sampling)?.collect::<Result<Vec<_>>>()?;
    Ok(samples.into_iter().collect())
}
