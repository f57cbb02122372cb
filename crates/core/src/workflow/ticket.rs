use crate::domain::session::{SessionId, SessionTicket};

/// Issues and checks the tickets attached to asynchronous effects.
///
/// The generation moves whenever the controller's state is replaced
/// wholesale; a new session starts again at generation zero.
#[derive(Clone, Debug)]
pub struct TicketIssuer {
    session_id: SessionId,
    generation: u64,
}

impl Default for TicketIssuer {
    fn default() -> Self {
        Self::new(SessionId::new())
    }
}

impl TicketIssuer {
    pub fn new(session_id: SessionId) -> Self {
        Self { session_id, generation: 0 }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn issue(&self) -> SessionTicket {
        SessionTicket { session_id: self.session_id, generation: self.generation }
    }

    pub fn is_current(&self, ticket: &SessionTicket) -> bool {
        ticket.session_id == self.session_id && ticket.generation == self.generation
    }

    pub fn bump(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    /// Switches to a brand-new session; returns the retired identity.
    pub fn renew(&mut self) -> SessionId {
        let retired = self.session_id;
        self.session_id = SessionId::new();
        self.generation = 0;
        retired
    }
}
