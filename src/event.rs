//! Event kinds and the two key shapes bindings are stored under.
//!
//! A [`GlobalKey`] matches every occurrence of an event kind; an [`EntryKey`]
//! narrows it to one discriminator such as a packet opcode.

use std::fmt;
use std::hash::Hash;

use crate::error::{HookError, Result};
use crate::world::NUM_MSG_TYPES;

/// What a dispatch reads back from each callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultContract {
    /// Pure notification; results are ignored.
    Notify,
    /// First result may veto with `false`.
    Allow,
    /// As `Allow`, and a second result may replace the payload.
    AllowWithPayload,
}

impl ResultContract {
    /// Result slots each invocation declares.
    pub fn result_count(self) -> usize {
        match self {
            ResultContract::Notify => 0,
            ResultContract::Allow => 1,
            ResultContract::AllowWithPayload => 2,
        }
    }
}

/// A tag identifying a class of engine event.
pub trait EventKind: Copy + Eq + Hash + fmt::Debug + Send + 'static {
    /// Key space the kind belongs to, used in errors and logs.
    const FAMILY: &'static str;

    /// Numeric id scripts register with; also the first callback argument.
    fn id(self) -> u32;

    fn from_id(id: u32) -> Result<Self>;

    fn contract(self) -> ResultContract;

    /// Arguments pushed after the event id.
    fn arity(self) -> usize;

    /// Whether `entry` is a meaningful discriminator for this kind.
    fn accepts_entry(_entry: u32) -> bool {
        true
    }
}

/// A key that can be validated before it is stored.
pub trait BindingKey: Copy + Eq + Hash + fmt::Debug + Send + 'static {
    fn validate(&self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalKey<E> {
    pub event: E,
}

impl<E: EventKind> GlobalKey<E> {
    pub fn new(event: E) -> Self {
        Self { event }
    }
}

impl<E: EventKind> BindingKey for GlobalKey<E> {
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryKey<E> {
    pub event: E,
    pub entry: u32,
}

impl<E: EventKind> EntryKey<E> {
    pub fn new(event: E, entry: u32) -> Self {
        Self { event, entry }
    }
}

impl<E: EventKind> BindingKey for EntryKey<E> {
    fn validate(&self) -> Result<()> {
        if E::accepts_entry(self.entry) {
            Ok(())
        } else {
            Err(HookError::invalid_key(
                E::FAMILY,
                format!("entry {} is out of range for {:?}", self.entry, self.event),
            ))
        }
    }
}

/// Server-wide events, registered without a discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerEvent {
    PacketReceive = 5,
    PacketSend = 7,
}

impl EventKind for ServerEvent {
    const FAMILY: &'static str = "server";

    fn id(self) -> u32 {
        self as u32
    }

    fn from_id(id: u32) -> Result<Self> {
        match id {
            5 => Ok(ServerEvent::PacketReceive),
            7 => Ok(ServerEvent::PacketSend),
            _ => Err(HookError::invalid_key(Self::FAMILY, format!("unknown event {}", id))),
        }
    }

    fn contract(self) -> ResultContract {
        match self {
            ServerEvent::PacketReceive => ResultContract::AllowWithPayload,
            ServerEvent::PacketSend => ResultContract::Allow,
        }
    }

    fn arity(self) -> usize {
        2
    }
}

/// Packet events, registered per opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketEvent {
    Receive = 5,
    Send = 7,
}

impl EventKind for PacketEvent {
    const FAMILY: &'static str = "packet";

    fn id(self) -> u32 {
        self as u32
    }

    fn from_id(id: u32) -> Result<Self> {
        match id {
            5 => Ok(PacketEvent::Receive),
            7 => Ok(PacketEvent::Send),
            _ => Err(HookError::invalid_key(Self::FAMILY, format!("unknown event {}", id))),
        }
    }

    fn contract(self) -> ResultContract {
        match self {
            PacketEvent::Receive => ResultContract::AllowWithPayload,
            PacketEvent::Send => ResultContract::Allow,
        }
    }

    fn arity(self) -> usize {
        2
    }

    fn accepts_entry(entry: u32) -> bool {
        entry < u32::from(NUM_MSG_TYPES)
    }
}

/// Vehicle lifecycle notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VehicleEvent {
    Install = 1,
    Uninstall = 2,
    InstallAccessory = 4,
    AddPassenger = 5,
    RemovePassenger = 6,
}

impl EventKind for VehicleEvent {
    const FAMILY: &'static str = "vehicle";

    fn id(self) -> u32 {
        self as u32
    }

    fn from_id(id: u32) -> Result<Self> {
        match id {
            1 => Ok(VehicleEvent::Install),
            2 => Ok(VehicleEvent::Uninstall),
            4 => Ok(VehicleEvent::InstallAccessory),
            5 => Ok(VehicleEvent::AddPassenger),
            6 => Ok(VehicleEvent::RemovePassenger),
            _ => Err(HookError::invalid_key(Self::FAMILY, format!("unknown event {}", id))),
        }
    }

    fn contract(self) -> ResultContract {
        ResultContract::Notify
    }

    fn arity(self) -> usize {
        match self {
            VehicleEvent::Install | VehicleEvent::Uninstall => 1,
            VehicleEvent::InstallAccessory | VehicleEvent::RemovePassenger => 2,
            VehicleEvent::AddPassenger => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_ids_are_invalid_keys() {
        assert!(matches!(
            ServerEvent::from_id(6),
            Err(HookError::InvalidKey { family: "server", .. })
        ));
        assert!(PacketEvent::from_id(0).is_err());
        assert!(VehicleEvent::from_id(3).is_err());
    }

    #[test]
    fn test_ids_round_trip() {
        for id in [1, 2, 4, 5, 6] {
            assert_eq!(VehicleEvent::from_id(id).unwrap().id(), id);
        }
        assert_eq!(ServerEvent::from_id(7).unwrap(), ServerEvent::PacketSend);
    }

    #[test]
    fn test_only_receive_may_replace_payload() {
        assert_eq!(ServerEvent::PacketSend.contract(), ResultContract::Allow);
        assert_eq!(PacketEvent::Send.contract(), ResultContract::Allow);
        assert_eq!(
            PacketEvent::Receive.contract(),
            ResultContract::AllowWithPayload
        );
        assert_eq!(VehicleEvent::AddPassenger.contract().result_count(), 0);
    }

    #[test]
    fn test_entry_key_checks_opcode_range() {
        let max = u32::from(NUM_MSG_TYPES);
        assert!(EntryKey::new(PacketEvent::Send, max - 1).validate().is_ok());
        assert!(EntryKey::new(PacketEvent::Send, max).validate().is_err());
        assert!(GlobalKey::new(VehicleEvent::Install).validate().is_ok());
    }
}
