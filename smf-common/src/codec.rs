//! Shared binary wire-codec traits, in the manner of the teacher's
//! `SerializeRIP`/`DeserializeRIP` pair (`redis_node::internal_protocol::protocol_trait`):
//! every frame format in this workspace (the cluster-bus command record, the
//! IP-T frame, the SML TLV envelope) implements `Encode`/`Decode` rather than
//! going through a general-purpose serde derive — these are fixed,
//! externally-specified binary layouts, not a domain model to be stored
//! generically.
use std::io::{self, Read};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

pub trait Encode {
    fn encode(&self, out: &mut Vec<u8>);

    fn encode_to_vec(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode(&mut out);
        out
    }
}

pub trait Decode: Sized {
    fn decode<R: Read>(input: &mut R) -> io::Result<Self>;
}

pub fn read_exact<const N: usize, R: Read>(input: &mut R) -> io::Result<[u8; N]> {
    let mut buf = [0u8; N];
    input.read_exact(&mut buf)?;
    Ok(buf)
}

pub fn read_u8<R: Read>(input: &mut R) -> io::Result<u8> {
    Ok(read_exact::<1, _>(input)?[0])
}

pub fn read_u16_be<R: Read>(input: &mut R) -> io::Result<u16> {
    Ok(u16::from_be_bytes(read_exact(input)?))
}

pub fn read_u32_be<R: Read>(input: &mut R) -> io::Result<u32> {
    Ok(u32::from_be_bytes(read_exact(input)?))
}

pub fn read_u64_be<R: Read>(input: &mut R) -> io::Result<u64> {
    Ok(u64::from_be_bytes(read_exact(input)?))
}

impl Encode for SocketAddr {
    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            SocketAddr::V4(a) => {
                out.push(4);
                out.extend_from_slice(&a.ip().octets());
                out.extend_from_slice(&a.port().to_be_bytes());
            }
            SocketAddr::V6(a) => {
                out.push(6);
                out.extend_from_slice(&a.ip().octets());
                out.extend_from_slice(&a.port().to_be_bytes());
            }
        }
    }
}

impl Decode for SocketAddr {
    fn decode<R: Read>(input: &mut R) -> io::Result<Self> {
        match read_u8(input)? {
            4 => {
                let ip = Ipv4Addr::from(read_exact::<4, _>(input)?);
                let port = read_u16_be(input)?;
                Ok(SocketAddr::new(IpAddr::V4(ip), port))
            }
            6 => {
                let ip = Ipv6Addr::from(read_exact::<16, _>(input)?);
                let port = read_u16_be(input)?;
                Ok(SocketAddr::new(IpAddr::V6(ip), port))
            }
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown socket address family tag {other}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn socket_addr_v4_round_trips() {
        let addr: SocketAddr = "192.168.1.10:8080".parse().unwrap();
        let bytes = addr.encode_to_vec();
        let mut cursor = Cursor::new(bytes);
        assert_eq!(SocketAddr::decode(&mut cursor).unwrap(), addr);
    }

    #[test]
    fn socket_addr_v6_round_trips() {
        let addr: SocketAddr = "[::1]:12345".parse().unwrap();
        let bytes = addr.encode_to_vec();
        let mut cursor = Cursor::new(bytes);
        assert_eq!(SocketAddr::decode(&mut cursor).unwrap(), addr);
    }

    #[test]
    fn read_exact_advances_cursor() {
        let data = vec![0u8, 1, 2, 3, 4, 5];
        let mut cursor = Cursor::new(data.clone());
        let first = read_exact::<3, _>(&mut cursor).unwrap();
        let second = read_exact::<3, _>(&mut cursor).unwrap();
        assert_eq!(&data[0..3], &first);
        assert_eq!(&data[3..6], &second);
    }
}
