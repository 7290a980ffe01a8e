/// A fixed array of binding slots with a high-water mark over the populated range. The mark is
/// the count of slots up to and including the highest populated one, which is exactly the table
/// size needed on hardware that tolerates unbound slots.
pub struct BindingSlotArray<T: Copy + PartialEq, const N: usize> {
    slots: [Option<T>; N],
    populated_count: u32,
}

impl<T: Copy + PartialEq, const N: usize> BindingSlotArray<T, N> {
    pub fn new() -> Self {
        BindingSlotArray {
            slots: [None; N],
            populated_count: 0,
        }
    }

    /// Set or clear a slot. Returns false when the slot already held this value, callers use
    /// that to skip dirtying.
    pub fn set(
        &mut self,
        slot: usize,
        value: Option<T>,
    ) -> bool {
        debug_assert!(slot < N);
        if self.slots[slot] == value {
            return false;
        }

        self.slots[slot] = value;
        if value.is_some() {
            self.populated_count = self.populated_count.max(slot as u32 + 1);
        } else if slot as u32 + 1 == self.populated_count {
            // Cleared the highest populated slot, walk the mark back down
            let mut count = self.populated_count;
            while count > 0 && self.slots[count as usize - 1].is_none() {
                count -= 1;
            }
            self.populated_count = count;
        }

        true
    }

    pub fn get(
        &self,
        slot: usize,
    ) -> Option<T> {
        self.slots[slot]
    }

    pub fn populated_count(&self) -> u32 {
        self.populated_count
    }

    /// The slots up to the high-water mark, the range a table would be built from
    pub fn populated_slice(&self) -> &[Option<T>] {
        &self.slots[..self.populated_count as usize]
    }

    pub fn clear(&mut self) {
        self.slots = [None; N];
        self.populated_count = 0;
    }
}

impl<T: Copy + PartialEq, const N: usize> Default for BindingSlotArray<T, N> {
    fn default() -> Self {
        Self::new()
    }
}
