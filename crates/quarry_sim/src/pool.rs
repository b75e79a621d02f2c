/// Stable reference into a [`SlotPool`]. The generation changes every time
/// the slot is released, so a handle kept past its value's lifetime no longer
/// resolves.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PoolHandle {
    index: u32,
    generation: u32,
}

impl PoolHandle {
    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

struct PoolSlot<T> {
    generation: u32,
    occupied: bool,
    value: T,
}

/// Fixed-capacity object pool. Every value is constructed up front and reused,
/// so allocate and release are O(1) and never touch the heap.
pub struct SlotPool<T> {
    slots: Vec<PoolSlot<T>>,
    free: Vec<u32>,
}

impl<T> SlotPool<T> {
    pub fn new(capacity: usize, mut make: impl FnMut() -> T) -> Self {
        let slots = (0..capacity)
            .map(|_| PoolSlot {
                generation: 0,
                occupied: false,
                value: make(),
            })
            .collect();
        // Reversed so the lowest index is handed out first.
        let free = (0..capacity as u32).rev().collect();
        Self { slots, free }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.free.is_empty()
    }

    /// Claims a free slot. The value still holds whatever its previous user
    /// left in it; callers reset it. `None` when the pool is exhausted.
    pub fn allocate(&mut self) -> Option<(PoolHandle, &mut T)> {
        let index = self.free.pop()?;
        let slot = &mut self.slots[index as usize];
        debug_assert!(!slot.occupied, "free list handed out an occupied slot");
        slot.occupied = true;
        Some((
            PoolHandle {
                index,
                generation: slot.generation,
            },
            &mut slot.value,
        ))
    }

    /// Returns the slot to the pool. Releasing a stale handle does nothing.
    pub fn release(&mut self, handle: PoolHandle) -> bool {
        let Some(slot) = self.slots.get_mut(handle.index()) else {
            return false;
        };
        if !slot.occupied || slot.generation != handle.generation {
            return false;
        }
        slot.occupied = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        true
    }

    pub fn contains(&self, handle: PoolHandle) -> bool {
        self.get(handle).is_some()
    }

    pub fn get(&self, handle: PoolHandle) -> Option<&T> {
        let slot = self.slots.get(handle.index())?;
        (slot.occupied && slot.generation == handle.generation).then_some(&slot.value)
    }

    pub fn get_mut(&mut self, handle: PoolHandle) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index())?;
        (slot.occupied && slot.generation == handle.generation).then_some(&mut slot.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PoolHandle, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.occupied.then_some((
                PoolHandle {
                    index: index as u32,
                    generation: slot.generation,
                },
                &slot.value,
            ))
        })
    }

    pub fn handles(&self) -> Vec<PoolHandle> {
        self.iter().map(|(handle, _)| handle).collect()
    }
}
