//! Per-request credential pool
//!
//! A pool is a view over the process-wide credential list that hands out
//! each member at most once. Draws pick uniformly among the members that
//! are left and remove the pick with a swap-remove over an index list, so
//! the shared list is never copied or mutated.

use super::credential::Credential;
use rand::Rng;

/// Draw-without-replacement pool scoped to one inbound request
#[derive(Debug)]
pub struct CredentialPool<'a> {
    credentials: &'a [Credential],
    remaining: Vec<usize>,
}

impl<'a> CredentialPool<'a> {
    /// Create a pool containing every credential in `credentials`
    pub fn new(credentials: &'a [Credential]) -> Self {
        Self {
            credentials,
            remaining: (0..credentials.len()).collect(),
        }
    }

    /// Remove and return a random remaining credential, or `None` once exhausted
    pub fn draw(&mut self) -> Option<&'a Credential> {
        self.draw_with(&mut rand::thread_rng())
    }

    /// Like [`draw`](Self::draw) with a caller-supplied random source
    pub fn draw_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<&'a Credential> {
        if self.remaining.is_empty() {
            return None;
        }
        let pos = rng.gen_range(0..self.remaining.len());
        let idx = self.remaining.swap_remove(pos);
        Some(&self.credentials[idx])
    }

    /// Number of credentials not yet drawn
    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining.is_empty()
    }

    /// Size of the pool when it was created
    pub fn initial_size(&self) -> usize {
        self.credentials.len()
    }
}
