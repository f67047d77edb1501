use std::fmt;

use crate::CodeLocation;

/// A call-site scope marker.
///
/// Pushing a token onto an expression (or a whole abstract state) moves every
/// variable one scope outward, hiding it from the callee's namespace; popping
/// the same token restores it. Variables popped with a token they were never
/// pushed with fall out of scope and are dropped by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeToken {
    call_site: CodeLocation,
}

impl ScopeToken {
    pub fn new(call_site: CodeLocation) -> Self {
        ScopeToken { call_site }
    }

    pub fn call_site(&self) -> CodeLocation {
        self.call_site
    }
}

impl fmt::Display for ScopeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.call_site)
    }
}
