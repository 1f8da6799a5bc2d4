use seasons::{Season, ROTATION_LEN};

/// Broadcast cycle counter. Slot `i` of cycle `n` gets season `(n + i) mod 4`,
/// so clients are staggered instead of synchronized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeasonRotation {
    index: usize,
}

impl SeasonRotation {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Seasons for `clients` slots this cycle; advances the rotation.
    pub fn next_cycle(&mut self, clients: usize) -> Vec<Season> {
        let seasons = (0..clients)
            .map(|slot| Season::from_rotation_index(self.index + slot))
            .collect();
        self.index = (self.index + 1) % ROTATION_LEN;
        seasons
    }
}
