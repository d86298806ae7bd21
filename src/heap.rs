use crate::error::{LispError, LispResult};
use crate::value::{Obj, ObjId, SymbolId};

/// A single registry slot. The mark bit belongs to the collector: set
/// during the mark phase, cleared again by the sweep.
struct Slot {
    obj: Obj,
    mark: bool,
}

/// The object heap: the process-wide live-object registry. Every value the
/// reader or evaluator constructs is allocated here; ObjId is an index into
/// `slots`. Liveness, not scope exit, governs when a slot is released.
pub struct Heap {
    slots: Vec<Slot>,
    free_list: Vec<ObjId>,
    capacity: usize,
}

impl Heap {
    pub fn new(capacity: usize) -> Self {
        Heap {
            slots: Vec::with_capacity(1024),
            free_list: Vec::new(),
            capacity,
        }
    }

    /// Allocate a new object. Returns Err(HeapOverflow) if capacity is
    /// exceeded and no swept slot is free for reuse.
    pub fn alloc(&mut self, obj: Obj) -> LispResult<ObjId> {
        if let Some(id) = self.free_list.pop() {
            let slot = &mut self.slots[id.0 as usize];
            slot.obj = obj;
            slot.mark = false;
            return Ok(id);
        }

        if self.slots.len() >= self.capacity {
            return Err(LispError::HeapOverflow);
        }

        let id = ObjId(self.slots.len() as u32);
        self.slots.push(Slot { obj, mark: false });
        Ok(id)
    }

    // Allocation shorthands. Nil and True are allocated fresh per result,
    // like every other value, so they participate in the registry count.

    pub fn nil(&mut self) -> LispResult<ObjId> {
        self.alloc(Obj::Nil)
    }

    pub fn truth(&mut self) -> LispResult<ObjId> {
        self.alloc(Obj::True)
    }

    pub fn int(&mut self, n: i64) -> LispResult<ObjId> {
        self.alloc(Obj::Int(n))
    }

    pub fn sym(&mut self, id: SymbolId) -> LispResult<ObjId> {
        self.alloc(Obj::Sym(id))
    }

    pub fn pair(&mut self, first: ObjId, rest: ObjId) -> LispResult<ObjId> {
        self.alloc(Obj::Pair(first, rest))
    }

    /// Look up an object by id.
    #[inline]
    pub fn get(&self, id: ObjId) -> &Obj {
        &self.slots[id.0 as usize].obj
    }

    /// The first/rest slots of a pair, or None for any other shape.
    pub fn pair_parts(&self, id: ObjId) -> Option<(ObjId, ObjId)> {
        match self.get(id) {
            Obj::Pair(first, rest) => Some((*first, *rest)),
            _ => None,
        }
    }

    /// Overwrite an Int slot in place (the `for` counter is a mutable
    /// Integer shared with the loop scope).
    pub fn set_int(&mut self, id: ObjId, n: i64) {
        self.slots[id.0 as usize].obj = Obj::Int(n);
    }

    /// Build a proper list from a slice of values.
    pub fn list(&mut self, values: &[ObjId]) -> LispResult<ObjId> {
        let mut result = self.nil()?;
        for &val in values.iter().rev() {
            result = self.pair(val, result)?;
        }
        Ok(result)
    }

    /// Returns true if this value is a proper list (a Pair chain ending
    /// in Nil, or Nil itself).
    pub fn is_proper_list(&self, id: ObjId) -> bool {
        let mut current = id;
        loop {
            match self.get(current) {
                Obj::Nil => return true,
                Obj::Pair(_, rest) => current = *rest,
                _ => return false,
            }
        }
    }

    /// Collect a proper list into a Vec of element ids.
    /// Returns None if iteration runs past a non-Pair, non-Nil tail.
    pub fn list_to_vec(&self, id: ObjId) -> Option<Vec<ObjId>> {
        let mut result = Vec::new();
        let mut current = id;
        loop {
            match self.get(current) {
                Obj::Nil => return Some(result),
                Obj::Pair(first, rest) => {
                    result.push(*first);
                    current = *rest;
                }
                _ => return None,
            }
        }
    }

    /// Number of live registry objects: allocated and not yet swept.
    /// This is what `number-of-objects` reports.
    pub fn live_count(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }

    /// Total slots ever allocated (including free-listed ones).
    pub fn total_slots(&self) -> usize {
        self.slots.len()
    }

    // === GC primitives (driven by the collector in gc.rs) ===

    /// Mark a slot. Returns true if it was not already marked this cycle,
    /// i.e. the caller should trace its children.
    pub fn mark(&mut self, id: ObjId) -> bool {
        let slot = &mut self.slots[id.0 as usize];
        if slot.mark {
            false
        } else {
            slot.mark = true;
            true
        }
    }

    pub fn is_marked(&self, id: ObjId) -> bool {
        self.slots[id.0 as usize].mark
    }

    /// Sweep: release every unmarked slot to the free list and clear the
    /// mark on every survivor. Returns the number of slots released.
    pub fn sweep(&mut self) -> usize {
        self.free_list.clear();
        let mut released = 0;
        for i in 0..self.slots.len() {
            let slot = &mut self.slots[i];
            if slot.mark {
                slot.mark = false;
            } else {
                // Poison the slot so stale ObjIds read as Nil, not as
                // whatever used to live here.
                slot.obj = Obj::Nil;
                self.free_list.push(ObjId(i as u32));
                released += 1;
            }
        }
        released
    }
}
