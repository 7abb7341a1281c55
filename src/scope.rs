use crate::value::Value;
use std::collections::HashMap;

pub(crate) type ScopeId = usize;

/// Position of the current element within a `<#list>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LoopState {
    pub index: usize,
    pub length: usize,
}

impl LoopState {
    pub fn has_next(&self) -> bool {
        self.index + 1 < self.length
    }
}

#[derive(Debug, Default)]
struct Frame {
    vars: HashMap<String, Value>,
    loops: HashMap<String, LoopState>,
    parent: Option<ScopeId>,
}

/// Scope chain stored as an arena. Frame 0 holds the globals; every loop
/// iteration pushes a child frame and pops it once its body is rendered.
#[derive(Debug)]
pub(crate) struct ScopeArena {
    frames: Vec<Frame>,
}

impl ScopeArena {
    pub const ROOT: ScopeId = 0;

    pub fn new(globals: HashMap<String, Value>) -> Self {
        Self {
            frames: vec![Frame {
                vars: globals,
                ..Frame::default()
            }],
        }
    }

    pub fn push(&mut self, parent: ScopeId) -> ScopeId {
        self.frames.push(Frame {
            parent: Some(parent),
            ..Frame::default()
        });
        self.frames.len() - 1
    }

    /// Drop `id` and everything pushed after it. The root frame stays.
    pub fn pop(&mut self, id: ScopeId) {
        debug_assert_eq!(id + 1, self.frames.len(), "frames are popped in LIFO order");
        self.frames.truncate(id.max(1));
    }

    pub fn set(&mut self, id: ScopeId, name: impl Into<String>, value: Value) {
        if let Some(frame) = self.frames.get_mut(id) {
            frame.vars.insert(name.into(), value);
        }
    }

    pub fn set_loop(&mut self, id: ScopeId, name: impl Into<String>, state: LoopState) {
        if let Some(frame) = self.frames.get_mut(id) {
            frame.loops.insert(name.into(), state);
        }
    }

    fn chain(&self, id: ScopeId) -> impl Iterator<Item = &Frame> + '_ {
        std::iter::successors(self.frames.get(id), |frame| {
            frame.parent.and_then(|p| self.frames.get(p))
        })
    }

    /// Innermost binding of `name`; `null` counts as unbound.
    pub fn lookup(&self, id: ScopeId, name: &str) -> Option<&Value> {
        self.chain(id)
            .find_map(|frame| frame.vars.get(name))
            .filter(|v| !v.is_null())
    }

    pub fn loop_state(&self, id: ScopeId, name: &str) -> Option<LoopState> {
        self.chain(id).find_map(|frame| frame.loops.get(name).copied())
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}
