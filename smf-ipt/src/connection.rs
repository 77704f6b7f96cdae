//! Transparent connection payloads (§4.2). `open.connection(number)` asks
//! the server to route to a named callee by number; once established,
//! `transmit.data` shuttles bytes unchanged in either direction.
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenConnectionRequest {
    pub number: u32,
}

impl OpenConnectionRequest {
    pub fn to_payload(&self) -> Vec<u8> {
        self.number.to_le_bytes().to_vec()
    }

    pub fn from_payload(payload: &[u8]) -> io::Result<OpenConnectionRequest> {
        let bytes: [u8; 4] = payload
            .get(0..4)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "truncated connection number"))?
            .try_into()
            .unwrap();
        Ok(OpenConnectionRequest {
            number: u32::from_le_bytes(bytes),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenConnectionResponse {
    pub success: bool,
}

impl OpenConnectionResponse {
    pub fn to_payload(&self) -> Vec<u8> {
        vec![self.success as u8]
    }

    pub fn from_payload(payload: &[u8]) -> io::Result<OpenConnectionResponse> {
        let byte = *payload
            .first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "empty open-connection response"))?;
        Ok(OpenConnectionResponse { success: byte != 0 })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseConnectionRequest;

impl CloseConnectionRequest {
    pub fn to_payload(&self) -> Vec<u8> {
        Vec::new()
    }

    pub fn from_payload(_payload: &[u8]) -> io::Result<CloseConnectionRequest> {
        Ok(CloseConnectionRequest)
    }
}

/// `transmit.data` payload is the raw connection bytes, unwrapped and
/// unparsed — the IP-T layer never looks inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransmitData(pub Vec<u8>);

impl TransmitData {
    pub fn to_payload(&self) -> Vec<u8> {
        self.0.clone()
    }

    pub fn from_payload(payload: &[u8]) -> TransmitData {
        TransmitData(payload.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_connection_request_round_trips() {
        let req = OpenConnectionRequest { number: 4242 };
        assert_eq!(
            OpenConnectionRequest::from_payload(&req.to_payload()).unwrap(),
            req
        );
    }

    #[test]
    fn open_connection_response_carries_success_flag() {
        let ok = OpenConnectionResponse { success: true };
        assert_eq!(
            OpenConnectionResponse::from_payload(&ok.to_payload()).unwrap(),
            ok
        );
        let fail = OpenConnectionResponse { success: false };
        assert_eq!(
            OpenConnectionResponse::from_payload(&fail.to_payload()).unwrap(),
            fail
        );
    }

    #[test]
    fn transmit_data_carries_bytes_verbatim() {
        let data = TransmitData(vec![9, 8, 7, 6]);
        assert_eq!(TransmitData::from_payload(&data.to_payload()), data);
    }
}
