// crates/systems/oxid_palm/src/gremlins/rng.rs
//! Gremlin random numbers.
//!
//! The classic C runtime LCG, reimplemented so that a seed produces the same
//! Gremlin on every host. Do not swap in another generator: recorded runs
//! are compared event for event.

const MULTIPLIER: u32 = 214_013;
const INCREMENT: u32 = 2_531_011;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GremlinRng {
    state: u32,
}

impl Default for GremlinRng {
    fn default() -> Self {
        Self::new(1)
    }
}

impl GremlinRng {
    pub const fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    pub fn seed(&mut self, seed: u32) {
        self.state = seed;
    }

    /// Raw generator state, for persistence.
    pub fn state(&self) -> u32 {
        self.state
    }

    /// Next value in `0..=0x7FFF`.
    pub fn next(&mut self) -> u16 {
        self.state = self.state.wrapping_mul(MULTIPLIER).wrapping_add(INCREMENT);
        ((self.state >> 16) & 0x7FFF) as u16
    }

    /// `next() % n`; `n` must be non-zero.
    pub fn below(&mut self, n: u32) -> u32 {
        self.next() as u32 % n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_one_matches_the_reference_sequence() {
        let mut rng = GremlinRng::new(1);
        let got: Vec<u16> = (0..10).map(|_| rng.next()).collect();
        assert_eq!(
            got,
            vec![41, 18467, 6334, 26500, 19169, 15724, 11478, 29358, 26962, 24464]
        );
    }

    #[test]
    fn reseeding_restarts_the_sequence() {
        let mut rng = GremlinRng::new(7);
        let first: Vec<u16> = (0..5).map(|_| rng.next()).collect();
        rng.seed(7);
        let again: Vec<u16> = (0..5).map(|_| rng.next()).collect();
        assert_eq!(first, again);
    }
}
