//! # canlink
//!
//! Driver-layer protocol for a compact bus-addressing scheme on top of CAN,
//! built for battery-powered nodes.
//!
//! A 29-bit extended identifier carries the message kind, target, source and
//! (for unicast) a port number; [`AddressMeta`] packs and unpacks it. Around
//! that codec the crate provides the power policy battery nodes need —
//! autosleep after an idle window, wake-on-activity via an interrupt-driven
//! flag, transceiver standby control, and an optional wakeup handshake
//! before each transmission — plus suppression of the duplicate frames that
//! arrive while a sleeping receiver is still coming up.
//!
//! The CAN controller chip itself is an external collaborator behind the
//! [`CanController`] trait, so the whole core runs against simulated
//! hardware in tests. Time comes from an `embedded_time::Clock`; pins and
//! delays use `embedded-hal` traits.
//!
//! [`LinkDriver`] ties the pieces together: its `send` path encodes, wakes,
//! optionally handshakes and transmits; its `receive` path consumes the
//! interrupt notification, polls the controller, filters retransmissions and
//! hands decoded [`Packet`]s to the caller. Everything that can fail returns
//! a `Result`; "nothing received" and "duplicate dropped" are `Ok(None)`,
//! not errors.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod activity;
pub mod address;
pub mod controller;
pub mod dedup;
pub mod link;
pub mod power;
pub mod time;

#[cfg(test)]
pub(crate) mod mocks;

pub use activity::BusActivity;
pub use address::{AddressError, AddressMeta, CanAddress, MessageKind};
pub use controller::{BusTiming, CanController, ControllerMode, Frame, PinDirection, PinLevel, MTU};
pub use dedup::{DuplicateFilter, DUPLICATE_WINDOW};
pub use link::{LinkDriver, Packet, CMD_WAKE, DEFAULT_HANDSHAKE_DELAY};
pub use power::{NoStandbyPin, PowerController, StandbyLine, DEFAULT_KEEP_AWAKE};

#[cfg(feature = "std")]
pub use time::StdClock;

/// Failures from the power paths.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PowerError<CE, PE> {
    /// The controller refused a mode change or pin operation.
    Controller(CE),
    /// The host-routed standby pin could not be driven.
    StandbyPin(PE),
}

/// Failures from sending or receiving over the link.
#[derive(Debug, PartialEq)]
pub enum LinkError<CE, PE> {
    /// Address fields out of range at encode time.
    Address(AddressError),
    /// The controller reported a failure.
    Controller(CE),
    /// The host-routed standby pin could not be driven.
    StandbyPin(PE),
    /// The clock could not produce an instant.
    Clock(embedded_time::clock::Error),
    /// Payload longer than the CAN MTU.
    PayloadTooLarge,
}

impl<CE, PE> From<AddressError> for LinkError<CE, PE> {
    fn from(e: AddressError) -> Self {
        LinkError::Address(e)
    }
}

impl<CE, PE> From<PowerError<CE, PE>> for LinkError<CE, PE> {
    fn from(e: PowerError<CE, PE>) -> Self {
        match e {
            PowerError::Controller(e) => LinkError::Controller(e),
            PowerError::StandbyPin(e) => LinkError::StandbyPin(e),
        }
    }
}
