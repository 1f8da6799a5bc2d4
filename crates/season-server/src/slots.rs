use std::net::SocketAddr;

/// Number of clients that receive broadcasts.
pub const MAX_CLIENTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("all {capacity} broadcast slots are taken")]
pub struct SlotExhausted {
    pub capacity: usize,
}

#[derive(Debug)]
pub struct Slot<W> {
    pub index: usize,
    pub peer: SocketAddr,
    pub writer: W,
    /// Bytes of an abandoned write still owed to the peer. They go out ahead
    /// of the next message so names are never cut.
    pub pending: Vec<u8>,
}

/// Append-only, bounded list of broadcast targets in acceptance order.
///
/// A slot index is fixed at admission and never reused, even if the peer
/// disconnects.
#[derive(Debug)]
pub struct SlotTable<W> {
    slots: Vec<Slot<W>>,
    capacity: usize,
}

impl<W> SlotTable<W> {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Takes the next free slot, or hands the writer back when full.
    pub fn try_admit(&mut self, peer: SocketAddr, writer: W) -> Result<usize, (SlotExhausted, W)> {
        if self.is_full() {
            return Err((
                SlotExhausted {
                    capacity: self.capacity,
                },
                writer,
            ));
        }
        let index = self.slots.len();
        self.slots.push(Slot {
            index,
            peer,
            writer,
            pending: Vec::new(),
        });
        Ok(index)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.slots.len() >= self.capacity
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Slot<W>> {
        self.slots.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Slot<W>> {
        self.slots.iter_mut()
    }
}

impl<W> Default for SlotTable<W> {
    fn default() -> Self {
        Self::new(MAX_CLIENTS)
    }
}
