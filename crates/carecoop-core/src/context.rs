use carecoop_types::{Address, BlockHeight};

/// Who is calling, and at what height.
///
/// The caller identity is trusted as given; authentication happens
/// before a context is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    pub caller: Address,
    pub height: BlockHeight,
}

impl CallContext {
    pub fn new(caller: Address, height: BlockHeight) -> Self {
        Self { caller, height }
    }

    /// Same height, different caller.
    pub fn with_caller(&self, caller: Address) -> Self {
        Self { caller, ..*self }
    }
}
