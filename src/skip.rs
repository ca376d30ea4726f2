//! Geometric skip sampling.
//!
//! Drawing a Bernoulli(p) sample from a population of `N` ballots naively
//! costs one uniform per ballot.  The gaps between successive selected
//! positions are Geometric(p), so the same sample can be produced by drawing
//! one uniform per *selected* ballot and jumping straight to it:
//!
//! ```text
//! gap(u) = floor(1 + ln(u) / ln(1 - p))
//! idx_i  = (gap_1 + ... + gap_i) - 1
//! ```
//!
//! [`SkipSampler`] pre-draws `floor(N·p)` gaps in one batch and then keeps
//! drawing one gap at a time until it runs off the end of the population.
//! Both phases read the stream in the same order, so the output for a given
//! seed is exactly what a fully lazy sampler would emit.

use crate::prng::RandomStream;

/// Inverse-CDF transform of a uniform `u ∈ (0,1)` into a Geometric(p) gap.
///
/// The result is at least 1 and non-increasing in `u`.  A rate of zero
/// never selects anything, so its gap is `u64::MAX`.
pub fn geometric_gap(u: f64, p: f64) -> u64 {
    if p <= 0.0 {
        return u64::MAX;
    }
    let gap = (1.0 + u.ln() / (1.0 - p).ln()).floor();
    if gap < 1.0 {
        1
    } else {
        gap as u64
    }
}

/// Lazy Geometric(p) gaps read from a [`RandomStream`].
#[derive(Debug)]
pub struct GeometricGaps<'s> {
    stream: &'s mut RandomStream,
    p: f64,
}

impl<'s> GeometricGaps<'s> {
    /// Wraps `stream` as an endless source of gaps at inclusion rate `p`.
    pub fn new(stream: &'s mut RandomStream, p: f64) -> Self {
        Self { stream, p }
    }
}

impl Iterator for GeometricGaps<'_> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        Some(geometric_gap(self.stream.next_uniform(), self.p))
    }
}

/// Sample without replacement of population elements, produced by skipping.
///
/// The sampler is finite and cannot be restarted; rebuild it from the same
/// seed to replay a draw.
#[derive(Debug)]
pub struct SkipSampler<'a, T, G> {
    population: &'a [T],
    batch: std::vec::IntoIter<u64>,
    tail: G,
    // Sum of the gaps consumed so far; the last emitted index is `position - 1`.
    position: u64,
    done: bool,
}

impl<'a, 's, T> SkipSampler<'a, T, GeometricGaps<'s>> {
    /// Samples `population` at inclusion rate `p` using gaps drawn from `stream`.
    pub fn new(population: &'a [T], p: f64, stream: &'s mut RandomStream) -> Self {
        let m = (population.len() as f64 * p).floor() as usize;
        let batch = stream
            .next_uniform_batch(m)
            .into_iter()
            .map(|u| geometric_gap(u, p))
            .collect();
        Self::from_gaps(population, batch, GeometricGaps::new(stream, p))
    }
}

impl<'a, T, G> SkipSampler<'a, T, G>
where
    G: Iterator<Item = u64>,
{
    /// Builds a sampler from explicit gaps: `batch` is consumed first, then
    /// `tail` supplies gaps one at a time.
    ///
    /// Gaps of zero are treated as one so the emitted indices stay strictly
    /// increasing.
    pub fn from_gaps(population: &'a [T], batch: Vec<u64>, tail: G) -> Self {
        Self {
            population,
            batch: batch.into_iter(),
            tail,
            position: 0,
            done: false,
        }
    }

    fn len(&self) -> u64 {
        self.population.len() as u64
    }

    fn advance(&mut self, gap: u64) -> Option<&'a T> {
        self.position = self.position.saturating_add(gap.max(1));
        let index = self.position - 1;
        if index < self.len() {
            Some(&self.population[index as usize])
        } else {
            self.done = true;
            None
        }
    }
}

impl<'a, T, G> Iterator for SkipSampler<'a, T, G>
where
    G: Iterator<Item = u64>,
{
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        if self.done {
            return None;
        }
        if let Some(gap) = self.batch.next() {
            return self.advance(gap);
        }
        // The last emitted index is already N - 1 (or the population is empty).
        if self.position >= self.len() {
            self.done = true;
            return None;
        }
        match self.tail.next() {
            Some(gap) => self.advance(gap),
            None => {
                self.done = true;
                None
            }
        }
    }
}

/// Draws a skip sample of `population` at rate `p` from a stream seeded with `seed`.
pub fn skip_sample<T: Clone>(population: &[T], p: f64, seed: u64) -> Vec<T> {
    let mut stream = RandomStream::new(seed);
    SkipSampler::new(population, p, &mut stream)
        .cloned()
        .collect()
}
