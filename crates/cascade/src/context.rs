//! Per-invocation cascade state.

use softdel_core::{EntityRef, StatusMode};

/// State threaded through one recursive cascade.
///
/// Each call receives its own value. The trail is copied on extension, so it
/// only ever holds the root-to-current path: siblings never see each other.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CascadeContext {
    mode: StatusMode,
    root_ref: Option<EntityRef>,
    trail: Vec<EntityRef>,
}

impl CascadeContext {
    /// Context for a fresh cascade with no anchor and an empty trail.
    pub fn new(mode: StatusMode) -> Self {
        Self {
            mode,
            root_ref: None,
            trail: Vec::new(),
        }
    }

    /// Context anchored on an already-chosen ledger root.
    pub fn anchored(mode: StatusMode, root_ref: EntityRef) -> Self {
        Self {
            mode,
            root_ref: Some(root_ref),
            trail: Vec::new(),
        }
    }

    pub fn mode(&self) -> StatusMode {
        self.mode
    }

    pub fn root_ref(&self) -> Option<&EntityRef> {
        self.root_ref.as_ref()
    }

    pub fn trail(&self) -> &[EntityRef] {
        &self.trail
    }

    /// Ledger key for `current`: the anchor if set, else `current` itself.
    pub fn ledger_key(&self, current: &EntityRef) -> EntityRef {
        self.root_ref.clone().unwrap_or_else(|| current.clone())
    }

    /// Context handed to dependents of `current`.
    ///
    /// `rebook` is `Some(key)` when `current` just booked `key` in the
    /// ledger; the anchor then becomes `key`. Mode and the extended trail are
    /// carried either way.
    pub fn forward(&self, current: &EntityRef, rebook: Option<EntityRef>) -> Self {
        let mut trail = Vec::with_capacity(self.trail.len() + 1);
        trail.extend_from_slice(&self.trail);
        trail.push(current.clone());
        Self {
            mode: self.mode,
            root_ref: rebook.or_else(|| self.root_ref.clone()),
            trail,
        }
    }
}
