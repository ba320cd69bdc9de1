//! # Bus addressing primitives.
//!
//! The addressing scheme packs a message kind, a target, a source and (for
//! unicast) a port into a single 29-bit extended CAN identifier. These types
//! describe that bit pattern and provide checked assembly plus unchecked
//! parsing of identifiers.

use bitfield::bitfield;
use num_traits::FromPrimitive;

/// Highest valid source address (11 bits).
pub const SOURCE_MAX: u16 = 0x7FF;
/// Highest valid unicast target address (11 bits).
pub const NODE_TARGET_MAX: u16 = 0x7FF;
/// Highest valid port number (5 bits).
pub const PORT_MAX: u8 = 0x1F;

bitfield! {
    /// Structure declaring bitfields of the 29-bit addressing scheme.
    ///
    /// The wide target and the port deliberately overlap: for unicast frames
    /// the upper bits of the 16-bit target range are reinterpreted as the
    /// port field and the target shrinks to 11 bits. This is an address-space
    /// optimization inherited from the wire format, not an accident.
    #[derive(Copy, Clone, Debug)]
    pub struct CanAddress(u32);
    /// Extended-frame marker.
    pub bool, extended, set_extended: 31;
    /// Message kind discriminator.
    pub u8, kind, set_kind: 29, 28;
    /// Port number, unicast only.
    pub u8, port, set_port: 27, 23;
    /// Target address for broadcast/multicast (16 bits).
    pub u16, wide_target, set_wide_target: 26, 11;
    /// Target address for unicast (11 bits).
    pub u16, node_target, set_node_target: 21, 11;
    /// Source address.
    pub u16, source, set_source: 10, 0;
}

/// Message kind carried in the top two address bits.
///
/// Every 2-bit pattern maps to a variant, so invalid kinds are
/// unrepresentable.
#[derive(Copy, Clone, Debug, PartialEq, Eq, num_derive::FromPrimitive, num_derive::ToPrimitive)]
pub enum MessageKind {
    Broadcast = 0,
    Multicast = 1,
    Reserved = 2,
    Unicast = 3,
}

/// Errors from assembling an identifier out of address fields.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AddressError {
    /// Source address above [`SOURCE_MAX`].
    SourceOutOfRange,
    /// Unicast target above [`NODE_TARGET_MAX`].
    TargetOutOfRange,
    /// Port above [`PORT_MAX`].
    PortOutOfRange,
    /// Unicast address without a port.
    PortMissing,
}

/// Decoded identifier metadata.
///
/// Constructed per frame and immutable afterwards. `target` holds 11
/// meaningful bits for unicast and 16 for broadcast/multicast; `port` is
/// `None` for everything but unicast.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AddressMeta {
    pub kind: MessageKind,
    pub target: u16,
    pub source: u16,
    pub port: Option<u8>,
}

impl AddressMeta {
    /// Address every node on the bus.
    pub fn broadcast(target: u16, source: u16) -> Self {
        Self {
            kind: MessageKind::Broadcast,
            target,
            source,
            port: None,
        }
    }

    /// Address a group of nodes.
    pub fn multicast(target: u16, source: u16) -> Self {
        Self {
            kind: MessageKind::Multicast,
            target,
            source,
            port: None,
        }
    }

    /// Address a single node on one of its ports.
    pub fn unicast(target: u16, source: u16, port: u8) -> Self {
        Self {
            kind: MessageKind::Unicast,
            target,
            source,
            port: Some(port),
        }
    }

    /// Parse an identifier into its metadata fields.
    ///
    /// Parsing never fails: malformed input yields plausible-looking but
    /// meaningless fields. Callers must not treat this as validation.
    pub fn decode(id: u32) -> Self {
        let raw = CanAddress(id);
        // Two-bit field, every pattern is covered.
        let kind = MessageKind::from_u8(raw.kind()).unwrap_or(MessageKind::Reserved);

        if kind == MessageKind::Unicast {
            Self {
                kind,
                target: raw.node_target(),
                source: raw.source(),
                port: Some(raw.port()),
            }
        } else {
            Self {
                kind,
                target: raw.wide_target(),
                source: raw.source(),
                port: None,
            }
        }
    }

    /// Assemble the 29-bit identifier, with the extended-frame marker set.
    ///
    /// Fails when any field is outside its documented range. Broadcast and
    /// multicast targets use the full 16-bit field, so their upper bound is
    /// enforced by the type.
    pub fn encode(&self) -> Result<u32, AddressError> {
        if self.source > SOURCE_MAX {
            return Err(AddressError::SourceOutOfRange);
        }

        let mut raw = CanAddress(0);
        raw.set_extended(true);
        raw.set_kind(self.kind as u8);

        match self.kind {
            MessageKind::Unicast => {
                if self.target > NODE_TARGET_MAX {
                    return Err(AddressError::TargetOutOfRange);
                }
                let port = self.port.ok_or(AddressError::PortMissing)?;
                if port > PORT_MAX {
                    return Err(AddressError::PortOutOfRange);
                }
                raw.set_port(port);
                raw.set_node_target(self.target);
            }
            _ => raw.set_wide_target(self.target),
        }

        raw.set_source(self.source);
        Ok(raw.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unicast_identifier_layout() {
        let meta = AddressMeta::unicast(0x10, 0x05, 3);
        let id = meta.encode().unwrap();
        assert_eq!(id, 0x8000_0000 | (3 << 28) | (3 << 23) | (0x10 << 11) | 0x05);
    }

    #[test]
    fn unicast_round_trip() {
        let meta = AddressMeta::unicast(0x10, 0x05, 3);
        let id = meta.encode().unwrap();
        assert_eq!(AddressMeta::decode(id), meta);
    }

    #[test]
    fn broadcast_round_trip_keeps_wide_target() {
        let meta = AddressMeta::broadcast(0xFFFF, 0x7FF);
        let id = meta.encode().unwrap();
        assert_eq!(AddressMeta::decode(id), meta);
    }

    #[test]
    fn multicast_round_trip() {
        let meta = AddressMeta::multicast(0xBEEF, 0x123);
        let id = meta.encode().unwrap();
        assert_eq!(AddressMeta::decode(id), meta);
    }

    #[test]
    fn extended_marker_always_set() {
        let id = AddressMeta::broadcast(0, 0).encode().unwrap();
        assert!(CanAddress(id).extended());
    }

    #[test]
    fn source_bounds() {
        assert!(AddressMeta::broadcast(0, SOURCE_MAX).encode().is_ok());
        assert_eq!(
            AddressMeta::broadcast(0, SOURCE_MAX + 1).encode(),
            Err(AddressError::SourceOutOfRange)
        );
    }

    #[test]
    fn unicast_target_bounds() {
        assert!(AddressMeta::unicast(NODE_TARGET_MAX, 1, 0).encode().is_ok());
        assert_eq!(
            AddressMeta::unicast(NODE_TARGET_MAX + 1, 1, 0).encode(),
            Err(AddressError::TargetOutOfRange)
        );
    }

    #[test]
    fn port_bounds() {
        assert!(AddressMeta::unicast(1, 1, PORT_MAX).encode().is_ok());
        assert_eq!(
            AddressMeta::unicast(1, 1, PORT_MAX + 1).encode(),
            Err(AddressError::PortOutOfRange)
        );
    }

    #[test]
    fn unicast_without_port_rejected() {
        let meta = AddressMeta {
            kind: MessageKind::Unicast,
            target: 1,
            source: 1,
            port: None,
        };
        assert_eq!(meta.encode(), Err(AddressError::PortMissing));
    }

    #[test]
    fn port_ignored_outside_unicast() {
        let meta = AddressMeta {
            kind: MessageKind::Broadcast,
            target: 0x1234,
            source: 2,
            port: Some(7),
        };
        let id = meta.encode().unwrap();
        assert_eq!(AddressMeta::decode(id).port, None);
    }

    #[test]
    fn decode_never_fails() {
        let meta = AddressMeta::decode(0);
        assert_eq!(meta.kind, MessageKind::Broadcast);
        assert_eq!(meta.target, 0);
        assert_eq!(meta.source, 0);
        assert_eq!(meta.port, None);
    }

    // The port range doubles as the top of the wide target range. A unicast
    // decode must re-mask the target to 11 bits, not report the port bits as
    // part of it.
    #[test]
    fn unicast_target_masked_under_port_bits() {
        let id = AddressMeta::unicast(0x10, 0x05, 0x1F).encode().unwrap();
        let meta = AddressMeta::decode(id);
        assert_eq!(meta.target, 0x10);
        assert_eq!(meta.port, Some(0x1F));
    }
}
