//! Node identifier resolution.

use log::debug;

/// Mask of the 48-bit node field.
pub const MAX_NODE: u64 = (1 << 48) - 1;

/// The multicast bit of an IEEE 802 address, set on synthesized node identifiers so that they
/// never collide with a genuine hardware address.
pub const MULTICAST_BIT: u64 = 1 << 40;

/// A source of the hardware network address that becomes the node identifier.
pub trait NodeSource {
    /// Returns the 6-byte hardware address, or `None` if unavailable.
    fn hardware_address(&self) -> Option<[u8; 6]>;
}

impl<F: Fn() -> Option<[u8; 6]>> NodeSource for F {
    fn hardware_address(&self) -> Option<[u8; 6]> {
        self()
    }
}

/// Looks up the address of the first network interface of the host.
///
/// Without the `hardware` crate feature, this source never finds an address.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct SystemNodeSource;

impl NodeSource for SystemNodeSource {
    #[cfg(feature = "hardware")]
    fn hardware_address(&self) -> Option<[u8; 6]> {
        match mac_address::get_mac_address() {
            Ok(found) => found.map(|addr| addr.bytes()),
            Err(err) => {
                debug!("hardware address lookup failed: {err}");
                None
            }
        }
    }

    #[cfg(not(feature = "hardware"))]
    fn hardware_address(&self) -> Option<[u8; 6]> {
        None
    }
}

/// Resolves the node identifier from `source`, or synthesizes a random one with the multicast bit
/// set when no usable address is available. An all-zero address counts as unavailable.
pub fn resolve_node_id(source: &impl NodeSource) -> u64 {
    match source.hardware_address() {
        Some(bytes) if bytes != [0; 6] => bytes.iter().fold(0, |acc, &b| (acc << 8) | b as u64),
        _ => {
            let node = random_node_id();
            debug!("no hardware address; using synthesized node id {node:012x}");
            node
        }
    }
}

fn random_node_id() -> u64 {
    (rand::random::<u64>() & MAX_NODE) | MULTICAST_BIT
}
