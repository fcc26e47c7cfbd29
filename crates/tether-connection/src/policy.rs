//! Application policy hooks consulted by the connection machine.

/// Answers the two questions the connection machine can't decide alone.
///
/// Both methods are called from the machine's task at the moment the
/// answer is needed, so an implementation may change its mind between
/// calls (e.g. a device that becomes too busy to host).
pub trait ConnectionPolicy: Send + Sync + 'static {
    /// Opaque bytes sent with every client start. The host sees them in
    /// its relay's connect approval.
    fn connect_payload(&self) -> Vec<u8> {
        Vec::new()
    }

    /// Whether this peer may take over as host when the current host
    /// disappears or a client start fails.
    fn can_act_as_fallback_host(&self) -> bool {
        true
    }
}

/// Empty payload, always eligible.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPolicy;

impl ConnectionPolicy for DefaultPolicy {}

/// A fixed payload and eligibility flag.
#[derive(Debug, Clone, Default)]
pub struct StaticPolicy {
    pub payload: Vec<u8>,
    pub eligible: bool,
}

impl StaticPolicy {
    /// A policy that never takes over hosting.
    pub fn ineligible() -> Self {
        Self {
            payload: Vec::new(),
            eligible: false,
        }
    }
}

impl ConnectionPolicy for StaticPolicy {
    fn connect_payload(&self) -> Vec<u8> {
        self.payload.clone()
    }

    fn can_act_as_fallback_host(&self) -> bool {
        self.eligible
    }
}
