use std::collections::HashMap;

use crate::value::{ObjId, SymbolId};

/// Index into the environment arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct EnvId(pub u32);

/// One lexical frame: a mutable name -> value map plus a link to the
/// enclosing scope. Frames are collected alongside heap objects, so they
/// carry a mark bit too.
struct Frame {
    vars: HashMap<SymbolId, ObjId>,
    parent: Option<EnvId>,
    mark: bool,
}

/// Arena of environment frames. Scope entry allocates a frame; scope exit
/// merely unlinks it from the active chain. A frame retained by a closure
/// outlives its scope and is only released when a sweep proves it
/// unreachable.
pub struct EnvArena {
    frames: Vec<Frame>,
    free_list: Vec<EnvId>,
}

impl EnvArena {
    pub fn new() -> Self {
        EnvArena {
            frames: Vec::new(),
            free_list: Vec::new(),
        }
    }

    /// Allocate a new frame under the given parent (None for the root).
    pub fn alloc(&mut self, parent: Option<EnvId>) -> EnvId {
        if let Some(id) = self.free_list.pop() {
            let frame = &mut self.frames[id.0 as usize];
            frame.vars.clear();
            frame.parent = parent;
            frame.mark = false;
            return id;
        }
        let id = EnvId(self.frames.len() as u32);
        self.frames.push(Frame {
            vars: HashMap::new(),
            parent,
            mark: false,
        });
        id
    }

    pub fn parent(&self, env: EnvId) -> Option<EnvId> {
        self.frames[env.0 as usize].parent
    }

    /// Create or overwrite a binding in the local frame only.
    pub fn define(&mut self, env: EnvId, name: SymbolId, val: ObjId) {
        self.frames[env.0 as usize].vars.insert(name, val);
    }

    /// Resolve a name against the nearest frame that defines it.
    pub fn lookup(&self, env: EnvId, name: SymbolId) -> Option<ObjId> {
        let mut current = Some(env);
        while let Some(id) = current {
            let frame = &self.frames[id.0 as usize];
            if let Some(&val) = frame.vars.get(&name) {
                return Some(val);
            }
            current = frame.parent;
        }
        None
    }

    /// Assignment semantics: walk outward from the local frame; if any
    /// frame already defines the name, mutate that binding in place.
    /// Only when no frame in the chain defines it is a new binding
    /// created, and it is created in the local frame. This asymmetry is
    /// what makes `setq` inside a nested scope visible to the enclosing
    /// scope.
    pub fn assign(&mut self, env: EnvId, name: SymbolId, val: ObjId) {
        let mut current = Some(env);
        while let Some(id) = current {
            let frame = &mut self.frames[id.0 as usize];
            if let Some(slot) = frame.vars.get_mut(&name) {
                *slot = val;
                return;
            }
            current = frame.parent;
        }
        self.define(env, name, val);
    }

    /// Snapshot of the values bound in one frame (for the mark phase).
    pub fn bound_values(&self, env: EnvId) -> Vec<ObjId> {
        self.frames[env.0 as usize].vars.values().copied().collect()
    }

    /// Number of frames allocated and not yet swept.
    pub fn live_count(&self) -> usize {
        self.frames.len() - self.free_list.len()
    }

    // === GC primitives ===

    /// Mark a frame. Returns true if it was not already marked this cycle.
    pub fn mark(&mut self, env: EnvId) -> bool {
        let frame = &mut self.frames[env.0 as usize];
        if frame.mark {
            false
        } else {
            frame.mark = true;
            true
        }
    }

    /// Release every unmarked frame and clear surviving marks.
    /// Returns the number of frames released.
    pub fn sweep(&mut self) -> usize {
        self.free_list.clear();
        let mut released = 0;
        for i in 0..self.frames.len() {
            let frame = &mut self.frames[i];
            if frame.mark {
                frame.mark = false;
            } else {
                frame.vars.clear();
                frame.parent = None;
                self.free_list.push(EnvId(i as u32));
                released += 1;
            }
        }
        released
    }
}

impl Default for EnvArena {
    fn default() -> Self {
        EnvArena::new()
    }
}
