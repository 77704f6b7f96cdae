//! The incoming IP-T session's proxy state machine (§4.3), lifted into an
//! explicit `transition(state, event) -> (state, Vec<Effect>)` function —
//! unit-testable without a socket, a thread, or a timer. Illegal
//! transitions are no-ops that emit a single warning effect rather than
//! panicking; a misbehaving device should not be able to take the proxy
//! down.
use crate::message::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    Local,
    Remote,
    Task,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyState {
    Idle,
    Authorized,
    WaitOpenRes,
    WaitCloseRes,
    Connected(ConnectionKind),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProxyEvent {
    LoginOk,
    LoginFailed,
    GatekeeperTimeout,
    OpenConnectionRequested,
    OpenConnectionResolved { success: bool, kind: ConnectionKind },
    OpenConnectionTimeout,
    SmlMessage(Message),
    CloseConnectionRequested,
    CloseConnectionResolved,
    CloseConnectionTimeout,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    SendLoginResponse { accepted: bool },
    ForwardOpenConnection,
    HandleSmlMessage(Message),
    ForwardCloseConnection,
    SendCloseResponse,
    LogWarning(String),
    Close,
}

/// Drives one state transition. Returns the next state and the effects the
/// caller should carry out — the function itself performs no I/O.
pub fn transition(state: ProxyState, event: ProxyEvent) -> (ProxyState, Vec<Effect>) {
    match (state, event) {
        (ProxyState::Idle, ProxyEvent::LoginOk) => (
            ProxyState::Authorized,
            vec![Effect::SendLoginResponse { accepted: true }],
        ),
        (ProxyState::Idle, ProxyEvent::LoginFailed) => (
            ProxyState::Idle,
            vec![Effect::SendLoginResponse { accepted: false }],
        ),
        (ProxyState::Idle, ProxyEvent::GatekeeperTimeout) => (ProxyState::Idle, vec![Effect::Close]),

        (ProxyState::Authorized, ProxyEvent::OpenConnectionRequested) => {
            (ProxyState::WaitOpenRes, vec![Effect::ForwardOpenConnection])
        }
        (ProxyState::Authorized, ProxyEvent::SmlMessage(msg)) => {
            (ProxyState::Authorized, vec![Effect::HandleSmlMessage(msg)])
        }

        (ProxyState::WaitOpenRes, ProxyEvent::OpenConnectionResolved { success: true, kind }) => {
            (ProxyState::Connected(kind), vec![])
        }
        (ProxyState::WaitOpenRes, ProxyEvent::OpenConnectionResolved { success: false, .. }) => {
            (ProxyState::Authorized, vec![])
        }
        (ProxyState::WaitOpenRes, ProxyEvent::OpenConnectionTimeout) => (
            ProxyState::Authorized,
            vec![Effect::LogWarning("open-connection timed out".into())],
        ),

        (ProxyState::Connected(ConnectionKind::Remote), ProxyEvent::SmlMessage(msg)) => {
            (ProxyState::Connected(ConnectionKind::Remote), vec![Effect::HandleSmlMessage(msg)])
        }
        (ProxyState::Connected(_), ProxyEvent::CloseConnectionRequested) => {
            (ProxyState::WaitCloseRes, vec![Effect::ForwardCloseConnection])
        }

        (ProxyState::WaitCloseRes, ProxyEvent::CloseConnectionResolved) => {
            (ProxyState::Authorized, vec![Effect::SendCloseResponse])
        }
        (ProxyState::WaitCloseRes, ProxyEvent::CloseConnectionTimeout) => (
            ProxyState::Authorized,
            vec![Effect::LogWarning("close-connection timed out".into())],
        ),

        (other, event) => (
            other,
            vec![Effect::LogWarning(format!(
                "illegal sml proxy transition: {event:?} in state {other:?}"
            ))],
        ),
    }
}
