use super::AccessPolicy;
use std::any::TypeId;
use std::sync::Arc;
use strum_macros::{Display, EnumString};
use uuid::Uuid;

/// Whether a singleton slot currently holds an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum SlotState {
    Vacant,
    Live,
}

/// Snapshot of one singleton slot
///
/// `generation` grows every time a new instance is installed in the slot,
/// so two handles with the same `type_id` and different generations always
/// describe different instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceHandle {
    pub type_id: TypeId,
    pub type_name: &'static str,
    pub policy: AccessPolicy,
    pub state: SlotState,
    pub instance_id: Option<Uuid>,
    pub generation: u64,
}

impl ServiceHandle {
    pub fn is_live(&self) -> bool {
        self.state == SlotState::Live
    }
}

/// An installed instance together with its identity
pub(crate) struct SlotEntry<T> {
    pub(crate) instance: Arc<T>,
    pub(crate) id: Uuid,
    pub(crate) generation: u64,
}

impl<T> SlotEntry<T> {
    pub(crate) fn new(instance: Arc<T>, generation: u64) -> Self {
        Self {
            instance,
            id: Uuid::new_v4(),
            generation,
        }
    }

    pub(crate) fn holds(&self, ptr: *const T) -> bool {
        std::ptr::eq(Arc::as_ptr(&self.instance), ptr)
    }
}
