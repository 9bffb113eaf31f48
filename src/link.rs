//! Network interface lookup via rtnetlink.
//!
//! Resolves the configured interface to its index (for transmission), its
//! MAC address (source of the reply frames) and its MTU (to warn when the
//! advertised MTU would not clamp anything).

use crate::wire::MacAddr;
use futures::TryStreamExt;
use netlink_packet_route::link::{LinkAttribute, LinkMessage};
use rtnetlink::new_connection;
use thiserror::Error;
use tracing::debug;

/// Errors from interface lookup.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("netlink connection failed: {0}")]
    Connection(std::io::Error),

    #[error("netlink error: {0}")]
    Netlink(#[from] rtnetlink::Error),

    #[error("interface not found: {0}")]
    NotFound(String),
}

/// What we need to know about the egress interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkInfo {
    pub name: String,
    pub index: u32,
    /// Hardware address, if the link has a 6-byte one.
    pub mac: Option<MacAddr>,
    pub mtu: Option<u32>,
}

impl LinkInfo {
    fn from_message(name: &str, msg: LinkMessage) -> Self {
        let mut info = LinkInfo {
            name: name.to_string(),
            index: msg.header.index,
            mac: None,
            mtu: None,
        };
        for attr in msg.attributes {
            match attr {
                LinkAttribute::Address(bytes) => info.mac = MacAddr::from_slice(&bytes),
                LinkAttribute::Mtu(mtu) => info.mtu = Some(mtu),
                _ => {}
            }
        }
        info
    }
}

/// Look up an interface by name.
pub async fn resolve_interface(name: &str) -> Result<LinkInfo, LinkError> {
    let (connection, handle, _) = new_connection().map_err(LinkError::Connection)?;
    tokio::spawn(connection);

    let mut links = handle.link().get().match_name(name.to_string()).execute();

    if let Some(link) = links.try_next().await? {
        let info = LinkInfo::from_message(name, link);
        debug!(
            name,
            index = info.index,
            mac = ?info.mac,
            mtu = ?info.mtu,
            "Resolved interface"
        );
        Ok(info)
    } else {
        Err(LinkError::NotFound(name.to_string()))
    }
}
