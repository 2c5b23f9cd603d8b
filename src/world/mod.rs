//! Engine-side objects that hooks hand to scripts.
//!
//! Only the fields the hooks read are modelled; the game logic behind them
//! belongs to the engine.

pub mod guid;
pub mod handle;
pub mod packet;
pub mod unit;
pub mod vehicle;

pub use guid::ObjectGuid;
pub use handle::{Handle, Lease, ScriptObject};
pub use packet::{WorldPacket, NUM_MSG_TYPES};
pub use unit::{Creature, Player, Unit, WorldSession};
pub use vehicle::Vehicle;
