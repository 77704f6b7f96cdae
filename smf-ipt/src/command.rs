//! The closed IP-T command set (§4.2 selection table). Redesign note §9
//! ("dynamic dispatch by opcode → closed enum"): unlike the cluster bus,
//! IP-T's opcode is a numeric code, so the closed enum *is* the wire
//! format — `Command::from_code`/`code` are the whole codec.
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    LoginPublicReq,
    LoginScrambledReq,
    LoginPublicRes,
    LoginScrambledRes,
    RegisterPushTargetReq,
    RegisterPushTargetRes,
    OpenPushChannelReq,
    OpenPushChannelRes,
    ClosePushChannelReq,
    ClosePushChannelRes,
    TransferPushDataReq,
    TransferPushDataRes,
    OpenConnectionReq,
    OpenConnectionRes,
    CloseConnectionReq,
    CloseConnectionRes,
    TransmitDataReq,
    TransmitDataRes,
    WatchdogReq,
    WatchdogRes,
    Unknown(u16),
}

impl Command {
    pub fn from_code(code: u16) -> Command {
        match code {
            0xC001 => Command::LoginPublicReq,
            0xC002 => Command::LoginScrambledReq,
            0x4001 => Command::LoginPublicRes,
            0x4002 => Command::LoginScrambledRes,
            0xC005 => Command::RegisterPushTargetReq,
            0x4005 => Command::RegisterPushTargetRes,
            0x9000 => Command::OpenPushChannelReq,
            0x1000 => Command::OpenPushChannelRes,
            0x9001 => Command::ClosePushChannelReq,
            0x1001 => Command::ClosePushChannelRes,
            0x9002 => Command::TransferPushDataReq,
            0x1002 => Command::TransferPushDataRes,
            0x9003 => Command::OpenConnectionReq,
            0x1003 => Command::OpenConnectionRes,
            0x9004 => Command::CloseConnectionReq,
            0x1004 => Command::CloseConnectionRes,
            0x900B => Command::TransmitDataReq,
            0x100B => Command::TransmitDataRes,
            0xC008 => Command::WatchdogReq,
            0x4008 => Command::WatchdogRes,
            other => Command::Unknown(other),
        }
    }

    pub fn code(self) -> u16 {
        match self {
            Command::LoginPublicReq => 0xC001,
            Command::LoginScrambledReq => 0xC002,
            Command::LoginPublicRes => 0x4001,
            Command::LoginScrambledRes => 0x4002,
            Command::RegisterPushTargetReq => 0xC005,
            Command::RegisterPushTargetRes => 0x4005,
            Command::OpenPushChannelReq => 0x9000,
            Command::OpenPushChannelRes => 0x1000,
            Command::ClosePushChannelReq => 0x9001,
            Command::ClosePushChannelRes => 0x1001,
            Command::TransferPushDataReq => 0x9002,
            Command::TransferPushDataRes => 0x1002,
            Command::OpenConnectionReq => 0x9003,
            Command::OpenConnectionRes => 0x1003,
            Command::CloseConnectionReq => 0x9004,
            Command::CloseConnectionRes => 0x1004,
            Command::TransmitDataReq => 0x900B,
            Command::TransmitDataRes => 0x100B,
            Command::WatchdogReq => 0xC008,
            Command::WatchdogRes => 0x4008,
            Command::Unknown(code) => code,
        }
    }

    /// True for the commands either side may originate as a request
    /// (`seq != 0`) — the rest are responses correlated against a pending
    /// request by `seq`.
    pub fn is_request(self) -> bool {
        self.code() & 0x8000 != 0 || matches!(self, Command::LoginPublicReq | Command::LoginScrambledReq | Command::WatchdogReq)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}(0x{:04X})", self, self.code())
    }
}
