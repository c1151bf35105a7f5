// zmote discovery wire format
//
// Devices answer a `SENDAMXB` datagram sent to the AMX beacon multicast
// group with an `AMXB<-Key=Value>...` record. Tags are matched one by one,
// so their order in the record does not matter.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tracing::{debug, warn};

use crate::error::Error;

/// Multicast group devices listen on for discovery requests.
pub const MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 250, 250);
/// Port discovery requests are sent to.
pub const REQUEST_PORT: u16 = 9130;
/// Port announcements and periodic beacons arrive on.
pub const RESPONSE_PORT: u16 = 9131;
/// Payload of a discovery request.
pub const REQUEST_PAYLOAD: &[u8] = b"SENDAMXB";
/// Every announcement starts with this marker.
pub const RESPONSE_PREFIX: &str = "AMXB";
/// Largest announcement we accept.
pub const MAX_DATAGRAM: usize = 512;

/// `<-Make=...>` value of a zmote device.
pub const ZMOTE_MAKE: &str = "zmote.io";
/// `<-Type=...>` value of a zmote device.
pub const ZMOTE_TYPE: &str = "ZMT2";

static TAG_MAKE: LazyLock<Regex> = LazyLock::new(|| tag_pattern("Make", ""));
static TAG_MODEL: LazyLock<Regex> = LazyLock::new(|| tag_pattern("Model", ""));
static TAG_REVISION: LazyLock<Regex> = LazyLock::new(|| tag_pattern("Revision", ""));
static TAG_TYPE: LazyLock<Regex> = LazyLock::new(|| tag_pattern("Type", ""));
static TAG_URL: LazyLock<Regex> = LazyLock::new(|| tag_pattern("Config-URL", "http"));
static TAG_UUID: LazyLock<Regex> = LazyLock::new(|| tag_pattern("UUID", "CI"));

fn tag_pattern(key: &str, value_prefix: &str) -> Regex {
    Regex::new(&format!(r"(?i)<-{key}=({value_prefix}[^>]+)>")).expect("invalid tag pattern")
}

fn capture(re: &Regex, msg: &str) -> Option<String> {
    re.captures(msg)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_owned())
        .filter(|v| !v.is_empty())
}

// ── Announcement ─────────────────────────────────────────────────────

/// Raw tag values of a discovery announcement. Every tag is optional on
/// the wire; acceptance rules live in `zmote-core`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Announcement {
    pub make: Option<String>,
    pub device_type: Option<String>,
    pub model: Option<String>,
    pub revision: Option<String>,
    pub url: Option<String>,
    pub uuid: Option<String>,
}

impl Announcement {
    /// Parse an announcement. Returns `None` for anything that is not an
    /// AMX beacon record.
    pub fn parse(msg: &str) -> Option<Self> {
        if !msg.starts_with(RESPONSE_PREFIX) {
            return None;
        }

        Some(Self {
            make: capture(&TAG_MAKE, msg),
            device_type: capture(&TAG_TYPE, msg),
            model: capture(&TAG_MODEL, msg),
            revision: capture(&TAG_REVISION, msg),
            url: capture(&TAG_URL, msg),
            uuid: capture(&TAG_UUID, msg),
        })
    }

    /// Parse a raw datagram.
    pub fn from_datagram(bytes: &[u8]) -> Option<Self> {
        Self::parse(&String::from_utf8_lossy(bytes))
    }

    /// `true` if make and type identify a zmote device.
    pub fn is_zmote(&self) -> bool {
        self.make
            .as_deref()
            .is_some_and(|m| m.eq_ignore_ascii_case(ZMOTE_MAKE))
            && self
                .device_type
                .as_deref()
                .is_some_and(|t| t.eq_ignore_ascii_case(ZMOTE_TYPE))
    }
}

// ── Socket ───────────────────────────────────────────────────────────

/// Where discovery requests go and where announcements are received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryEndpoint {
    pub group: Ipv4Addr,
    pub request_port: u16,
    /// Local port to bind. `0` picks an ephemeral port, which only
    /// receives direct replies, not periodic beacons.
    pub listen_port: u16,
}

impl Default for DiscoveryEndpoint {
    fn default() -> Self {
        Self {
            group: MULTICAST_GROUP,
            request_port: REQUEST_PORT,
            listen_port: RESPONSE_PORT,
        }
    }
}

/// A bound discovery socket.
///
/// Dropping it closes the socket, which is how a pending receive is
/// abandoned when a scan is stopped.
pub struct DiscoverySocket {
    socket: UdpSocket,
    endpoint: DiscoveryEndpoint,
}

impl DiscoverySocket {
    /// Bind the listen port with `SO_REUSEADDR` and join the group.
    ///
    /// Failing to join the group is logged, not fatal: direct replies to
    /// the request still arrive on the bound port. Must be called from
    /// within a tokio runtime.
    pub fn open(endpoint: DiscoveryEndpoint) -> Result<Self, Error> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.set_nonblocking(true)?;

        let local = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, endpoint.listen_port);
        socket.bind(&local.into())?;

        if endpoint.group.is_multicast() {
            match socket.join_multicast_v4(&endpoint.group, &Ipv4Addr::UNSPECIFIED) {
                Ok(()) => debug!(group = %endpoint.group, "joined discovery group"),
                Err(e) => warn!(group = %endpoint.group, error = %e, "failed to join discovery group"),
            }
            if let Err(e) = socket.set_multicast_ttl_v4(1) {
                debug!(error = %e, "failed to set multicast TTL");
            }
        }

        let std_socket: std::net::UdpSocket = socket.into();
        Ok(Self {
            socket: UdpSocket::from_std(std_socket)?,
            endpoint,
        })
    }

    /// The locally bound address.
    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.socket.local_addr()?)
    }

    /// Send the discovery request to the group's request port.
    pub async fn send_request(&self) -> Result<(), Error> {
        let target = SocketAddrV4::new(self.endpoint.group, self.endpoint.request_port);
        debug!(%target, "sending discovery request");
        self.socket.send_to(REQUEST_PAYLOAD, target).await?;
        Ok(())
    }

    /// Receive one datagram into `buf`.
    pub async fn recv(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), Error> {
        Ok(self.socket.recv_from(buf).await?)
    }
}
