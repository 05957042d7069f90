//! Listener bindings
//!
//! A listener owns one UDP socket bound to a DHCPv6 server address and the
//! marks it stamps on every request it produces. It is the crate's wire
//! boundary: raw datagrams are decoded here on the way in and encoded
//! replies transmitted here on the way out; the pipeline itself only ever
//! sees the decoded types.

use std::net::{Ipv6Addr, SocketAddr, SocketAddrV6};

use tokio::net::UdpSocket;
use tracing::debug;

use crate::config::ListenerConfig;
use crate::error::{Result, ServerError};
use crate::message::RequestInfo;

/// UDP port servers and relay agents listen on (RFC 8415)
pub const SERVER_PORT: u16 = 547;

/// UDP port clients listen on (RFC 8415)
pub const CLIENT_PORT: u16 = 546;

/// The All_DHCP_Relay_Agents_and_Servers multicast group
pub const ALL_DHCP_RELAY_AGENTS_AND_SERVERS: Ipv6Addr =
    Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 1, 2);

/// One transport endpoint feeding the dispatcher
pub struct Listener {
    name: String,
    initial_marks: Vec<String>,
    multicast: bool,
    socket: UdpSocket,
}

impl Listener {
    /// Bind the listener's socket and join the server multicast group if
    /// configured
    pub async fn bind(config: &ListenerConfig) -> Result<Self> {
        let bind_addr = SocketAddrV6::new(config.address, config.port, 0, 0);
        let socket = create_socket(bind_addr)?;

        if config.multicast {
            // Membership is best-effort: a unicast-only interface still
            // serves relayed traffic.
            if let Err(e) = socket.join_multicast_v6(&ALL_DHCP_RELAY_AGENTS_AND_SERVERS, 0) {
                debug!(listener = %config.name, error = %e, "could not join multicast group");
            }
        }

        Ok(Self {
            name: config.name.clone(),
            initial_marks: config.initial_marks(),
            multicast: config.multicast,
            socket,
        })
    }

    /// The listener's configured name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The address the socket is actually bound to
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Marks stamped on every request this listener produces: its own
    /// name, then any configured extras
    pub fn initial_marks(&self) -> Vec<String> {
        self.initial_marks.clone()
    }

    /// Wait for the next datagram
    pub async fn receive(&self, buf: &mut [u8]) -> std::io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf).await
    }

    /// Decode a received datagram into a request tagged with this
    /// listener's metadata
    pub fn decode(&self, data: &[u8], source: SocketAddr) -> Result<RequestInfo> {
        RequestInfo::decode(data, source, &self.name, self.multicast)
    }

    /// Transmit an encoded reply
    pub async fn send(&self, bytes: &[u8], dest: SocketAddr) -> Result<()> {
        self.socket.send_to(bytes, dest).await?;
        Ok(())
    }
}

/// Create and configure the UDP socket
fn create_socket(bind_addr: SocketAddrV6) -> Result<UdpSocket> {
    let socket = socket2::Socket::new(
        socket2::Domain::IPV6,
        socket2::Type::DGRAM,
        Some(socket2::Protocol::UDP),
    )
    .map_err(|e| ServerError::BindFailed {
        addr: bind_addr.into(),
        source: e,
    })?;

    // Allow address reuse
    socket.set_reuse_address(true).ok();

    // Keep this socket IPv6-only; DHCPv6 never speaks IPv4
    socket.set_only_v6(true).ok();

    // Bind to address
    socket
        .bind(&SocketAddr::from(bind_addr).into())
        .map_err(|e| ServerError::BindFailed {
            addr: bind_addr.into(),
            source: e,
        })?;

    // Set non-blocking for tokio
    socket
        .set_nonblocking(true)
        .map_err(|e| ServerError::BindFailed {
            addr: bind_addr.into(),
            source: e,
        })?;

    // Convert to tokio socket
    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket).map_err(|e| ServerError::BindFailed {
        addr: bind_addr.into(),
        source: e,
    })
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("name", &self.name)
            .field("initial_marks", &self.initial_marks)
            .field("multicast", &self.multicast)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dhcproto::v6::{Message, MessageType};
    use dhcproto::Encodable;

    fn loopback_config(name: &str) -> ListenerConfig {
        ListenerConfig {
            name: name.to_string(),
            address: Ipv6Addr::LOCALHOST,
            port: 0,
            multicast: false,
            marks: vec!["untrusted".to_string()],
        }
    }

    #[tokio::test]
    async fn test_bind_on_loopback() {
        let listener = Listener::bind(&loopback_config("eth0")).await.unwrap();

        assert_eq!(listener.name(), "eth0");
        assert_eq!(listener.initial_marks(), vec!["eth0", "untrusted"]);
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn test_decode_tags_listener_metadata() {
        let listener = Listener::bind(&loopback_config("eth0")).await.unwrap();

        let message = Message::new_with_id(MessageType::Solicit, [1, 2, 3]);
        let bytes = message.to_vec().unwrap();
        let source = SocketAddr::new(Ipv6Addr::LOCALHOST.into(), CLIENT_PORT);

        let request = listener.decode(&bytes, source).unwrap();
        assert_eq!(request.listener(), "eth0");
        assert_eq!(request.message_type(), MessageType::Solicit);
        assert!(!request.received_over_multicast());
    }

    #[tokio::test]
    async fn test_decode_garbage_fails() {
        let listener = Listener::bind(&loopback_config("eth0")).await.unwrap();
        let source = SocketAddr::new(Ipv6Addr::LOCALHOST.into(), CLIENT_PORT);

        assert!(matches!(
            listener.decode(&[0xde, 0xad], source),
            Err(ServerError::DecodeFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_send_and_receive_roundtrip() {
        let a = Listener::bind(&loopback_config("a")).await.unwrap();
        let b = Listener::bind(&loopback_config("b")).await.unwrap();

        let payload = b"hello";
        a.send(payload, b.local_addr().unwrap()).await.unwrap();

        let mut buf = [0u8; 64];
        let (len, from) = b.receive(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], payload);
        assert_eq!(from.port(), a.local_addr().unwrap().port());
    }
}
