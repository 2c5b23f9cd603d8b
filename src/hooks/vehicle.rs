//! Vehicle lifecycle notifications.
//!
//! These fire after the engine has acted, so nothing a callback returns is
//! read back.

use std::sync::Arc;

use crate::event::{GlobalKey, VehicleEvent};
use crate::lua::ExecutionContext;
use crate::world::{Creature, Lease, Unit, Vehicle};

use super::{AggregateDecision, DispatchPlan, HookEngine, IndexKey};

impl HookEngine {
    pub fn on_install(&self, vehicle: &Arc<Vehicle>) {
        self.notify_vehicle(VehicleEvent::Install, |context, lease| {
            context.push_object(vehicle, lease)
        });
    }

    pub fn on_uninstall(&self, vehicle: &Arc<Vehicle>) {
        self.notify_vehicle(VehicleEvent::Uninstall, |context, lease| {
            context.push_object(vehicle, lease)
        });
    }

    pub fn on_install_accessory(&self, vehicle: &Arc<Vehicle>, accessory: &Arc<Creature>) {
        self.notify_vehicle(VehicleEvent::InstallAccessory, |context, lease| {
            context.push_object(vehicle, lease)?;
            context.push_object(accessory, lease)
        });
    }

    pub fn on_add_passenger(&self, vehicle: &Arc<Vehicle>, passenger: &Arc<Unit>, seat_id: i8) {
        self.notify_vehicle(VehicleEvent::AddPassenger, |context, lease| {
            context.push_object(vehicle, lease)?;
            context.push_object(passenger, lease)?;
            context.push(seat_id)
        });
    }

    pub fn on_remove_passenger(&self, vehicle: &Arc<Vehicle>, passenger: &Arc<Unit>) {
        self.notify_vehicle(VehicleEvent::RemovePassenger, |context, lease| {
            context.push_object(vehicle, lease)?;
            context.push_object(passenger, lease)
        });
    }

    fn notify_vehicle<F>(&self, event: VehicleEvent, push_args: F)
    where
        F: Fn(&ExecutionContext, &Lease) -> mlua::Result<()>,
    {
        let key = GlobalKey::new(event);
        let _: AggregateDecision<()> = self.shared.dispatch(
            DispatchPlan::of(event),
            &[IndexKey::Vehicle(event)],
            |bindings| vec![bindings.vehicle.take_for_dispatch(&key)],
            push_args,
        );
    }
}
