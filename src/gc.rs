use log::debug;

use crate::env::{EnvArena, EnvId};
use crate::heap::Heap;
use crate::value::{Obj, ObjId};

/// Outcome of one collection cycle.
#[derive(Debug, Clone, Copy)]
pub struct GcStats {
    pub objects_released: usize,
    pub frames_released: usize,
    pub objects_live: usize,
    pub frames_live: usize,
}

/// Run a full mark-and-sweep cycle.
///
/// The root set is the environment chain reachable from `root` — the
/// currently active environment at the moment `gc` runs — and nothing
/// else. Values held only by suspended Rust stack frames or by bindings
/// outside that chain are not rooted; this narrower liveness guarantee is
/// deliberate and matches the reference behavior.
///
/// Mark bits double as the cycle's visited set, so reference cycles
/// (a closure holding the environment that holds it) terminate cleanly.
pub fn collect(heap: &mut Heap, envs: &mut EnvArena, root: EnvId) -> GcStats {
    let mut env_work: Vec<EnvId> = vec![root];
    let mut obj_work: Vec<ObjId> = Vec::new();

    loop {
        if let Some(env) = env_work.pop() {
            if envs.mark(env) {
                if let Some(parent) = envs.parent(env) {
                    env_work.push(parent);
                }
                obj_work.extend(envs.bound_values(env));
            }
            continue;
        }
        let Some(id) = obj_work.pop() else { break };
        if !heap.mark(id) {
            continue;
        }
        match heap.get(id) {
            Obj::Pair(first, rest) => {
                let (first, rest) = (*first, *rest);
                obj_work.push(first);
                obj_work.push(rest);
            }
            Obj::Closure(c) => {
                obj_work.push(c.params);
                obj_work.push(c.body);
                env_work.push(c.env);
            }
            Obj::Macro(m) => {
                obj_work.push(m.params);
                obj_work.push(m.body);
            }
            _ => {}
        }
    }

    let objects_released = heap.sweep();
    let frames_released = envs.sweep();
    let stats = GcStats {
        objects_released,
        frames_released,
        objects_live: heap.live_count(),
        frames_live: envs.live_count(),
    };
    debug!(
        "gc: released {} objects and {} frames, {} objects live",
        stats.objects_released, stats.frames_released, stats.objects_live
    );
    stats
}
