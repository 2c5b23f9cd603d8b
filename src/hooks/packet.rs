//! Packet hooks.
//!
//! Server-wide listeners (`RegisterServerEvent`) run first, then listeners for
//! the packet's opcode (`RegisterPacketEvent`). Callbacks are called as
//! `(event, packet, player)` where `packet` is a private copy and `player` is
//! nil when the session has none.

use std::sync::Arc;

use crate::event::{EntryKey, GlobalKey, PacketEvent, ServerEvent};
use crate::world::{Player, WorldPacket, WorldSession};

use super::{AggregateDecision, DispatchPlan, HookEngine, IndexKey};

impl HookEngine {
    /// The engine is about to send `packet`. Returns `false` to suppress it.
    pub fn on_packet_send(&self, session: Option<&WorldSession>, packet: &WorldPacket) -> bool {
        let player = session.and_then(WorldSession::player);
        self.dispatch_packet_send(player, packet).allowed()
    }

    /// The engine received `packet`. Returns `false` to drop it; a hook may
    /// also rewrite it before the engine handles it.
    pub fn on_packet_receive(&self, session: Option<&WorldSession>, packet: &mut WorldPacket) -> bool {
        let player = session.and_then(WorldSession::player);
        let decision = self.dispatch_packet_receive(player, packet);
        let allowed = decision.allowed();
        if let Some(replacement) = decision.into_payload() {
            *packet = replacement;
        }
        allowed
    }

    /// Send hooks may only veto; a returned packet is ignored.
    pub fn dispatch_packet_send(
        &self,
        player: Option<&Arc<Player>>,
        packet: &WorldPacket,
    ) -> AggregateDecision<WorldPacket> {
        self.dispatch_packet(ServerEvent::PacketSend, PacketEvent::Send, player, packet)
    }

    /// Receive hooks may veto and replace the packet; the last replacement wins.
    pub fn dispatch_packet_receive(
        &self,
        player: Option<&Arc<Player>>,
        packet: &WorldPacket,
    ) -> AggregateDecision<WorldPacket> {
        self.dispatch_packet(ServerEvent::PacketReceive, PacketEvent::Receive, player, packet)
    }

    fn dispatch_packet(
        &self,
        server_event: ServerEvent,
        packet_event: PacketEvent,
        player: Option<&Arc<Player>>,
        packet: &WorldPacket,
    ) -> AggregateDecision<WorldPacket> {
        debug_assert_eq!(server_event as u32, packet_event as u32);
        let opcode = u32::from(packet.opcode());
        let global = GlobalKey::new(server_event);
        let entry = EntryKey::new(packet_event, opcode);

        self.shared.dispatch(
            DispatchPlan::of(packet_event),
            &[IndexKey::Server(server_event), IndexKey::Packet(packet_event, opcode)],
            |bindings| {
                vec![
                    bindings.server.take_for_dispatch(&global),
                    bindings.packet.take_for_dispatch(&entry),
                ]
            },
            |context, lease| {
                context.push_copy(packet)?;
                context.push_optional_object(player, lease)
            },
        )
    }
}
