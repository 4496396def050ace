/// Allocates and recycles unique `u32` identifiers from a bounded range.
///
/// Used for mesh picking ids: ids start at `first`, never reach `limit`,
/// and freed ids are handed out again before fresh ones.
///
/// # Example
///
/// ```ignore
/// let mut ids = SlotAllocator::new(1, 4);
/// let a = ids.alloc();  // Some(1)
/// let b = ids.alloc();  // Some(2)
/// ids.free(1);          // 1 is available again
/// let c = ids.alloc();  // Some(1) (recycled)
/// ```
#[derive(Debug, Clone)]
pub struct SlotAllocator {
    free_list: Vec<u32>,
    next_id: u32,
    first: u32,
    limit: u32,
    len: u32,
}

impl SlotAllocator {
    /// Allocator handing out ids in `first..limit`
    pub fn new(first: u32, limit: u32) -> Self {
        Self { free_list: Vec::new(), next_id: first, first, limit: limit.max(first), len: 0 }
    }

    /// Next available id, `None` once the range is exhausted
    pub fn alloc(&mut self) -> Option<u32> {
        let id = match self.free_list.pop() {
            Some(id) => id,
            None if self.next_id < self.limit => {
                let id = self.next_id;
                self.next_id += 1;
                id
            }
            None => return None,
        };
        self.len += 1;
        Some(id)
    }

    /// Return an id to the pool; ids never handed out are ignored
    pub fn free(&mut self, id: u32) {
        if id < self.first || id >= self.next_id || self.free_list.contains(&id) {
            return;
        }
        self.len -= 1;
        self.free_list.push(id);
    }

    /// Highest id ever allocated + 1
    pub fn high_water_mark(&self) -> u32 {
        self.next_id
    }

    /// Number of ids the range can hold
    pub fn capacity(&self) -> u32 {
        self.limit - self.first
    }

    /// Number of currently allocated ids
    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
#[path = "slot_allocator_tests.rs"]
mod tests;
