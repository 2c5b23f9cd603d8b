//! The generic dispatch loop shared by every hook family.

use crate::binding::Binding;
use crate::event::{EventKind, ResultContract};
use crate::lua::ExecutionContext;
use crate::world::{Lease, WorldPacket};

use super::fault::CallbackFault;
use super::EngineState;

/// Folded outcome of one dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateDecision<P> {
    allow: bool,
    payload: Option<P>,
}

impl<P> AggregateDecision<P> {
    pub fn allowed(&self) -> bool {
        self.allow
    }

    pub fn payload(&self) -> Option<&P> {
        self.payload.as_ref()
    }

    pub fn into_payload(self) -> Option<P> {
        self.payload
    }

    /// Only ever moves allow from true to false.
    fn deny(&mut self) {
        self.allow = false;
    }

    fn replace_payload(&mut self, payload: P) {
        self.payload = Some(payload);
    }
}

impl<P> Default for AggregateDecision<P> {
    fn default() -> Self {
        Self {
            allow: true,
            payload: None,
        }
    }
}

/// A value a callback may hand back in place of the event payload.
pub trait Payload: Sized {
    fn read(context: &ExecutionContext, slot: usize) -> Option<Self>;
}

impl Payload for WorldPacket {
    fn read(context: &ExecutionContext, slot: usize) -> Option<Self> {
        context.read_object::<WorldPacket>(slot)
    }
}

/// Families whose events carry no payload.
impl Payload for () {
    fn read(_context: &ExecutionContext, _slot: usize) -> Option<Self> {
        None
    }
}

/// Static facts about one dispatch, derived from its event kind.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DispatchPlan {
    pub event_id: u32,
    pub contract: ResultContract,
    pub arity: usize,
}

impl DispatchPlan {
    pub fn of<E: EventKind>(event: E) -> Self {
        Self {
            event_id: event.id(),
            contract: event.contract(),
            arity: event.arity(),
        }
    }
}

impl EngineState {
    /// Run every sequence in order and fold the results. The caller has
    /// already taken the lock and the snapshot; `sequences` holds global
    /// listeners followed by entry ones, none of them empty.
    ///
    /// Each sequence gets freshly marshalled arguments, so whatever one
    /// sequence does to its packet copy is invisible to the next.
    pub(crate) fn run<P, F>(&self, plan: &DispatchPlan, sequences: &[Vec<Binding>], push_args: F) -> AggregateDecision<P>
    where
        P: Payload,
        F: Fn(&ExecutionContext, &Lease) -> mlua::Result<()>,
    {
        let context = &self.context;
        let frame = context.open_frame();
        let mut decision = AggregateDecision::default();
        let result_count = plan.contract.result_count();

        for (index, sequence) in sequences.iter().enumerate() {
            if index > 0 {
                context.clear_frame(frame.len());
            }

            let marshalled = context
                .push(plan.event_id)
                .and_then(|()| push_args(context, frame.lease()));
            if let Err(err) = marshalled {
                tracing::error!(
                    target: "hooks",
                    event = plan.event_id,
                    error = %err,
                    "failed to marshal hook arguments"
                );
                return decision;
            }

            let arg_count = frame.len();
            debug_assert_eq!(arg_count, plan.arity + 1, "argument count differs from event arity");

            for binding in sequence {
                self.invoke_one(plan, binding, arg_count, &mut decision);
                context.clear_frame(result_count);
            }
        }

        drop(frame);
        decision
    }

    /// Invoke one binding against the top `arg_count` slots and fold its
    /// results into `decision`. Leaves the result slots for the caller to pop.
    fn invoke_one<P: Payload>(
        &self,
        plan: &DispatchPlan,
        binding: &Binding,
        arg_count: usize,
        decision: &mut AggregateDecision<P>,
    ) {
        let context = &self.context;
        let call = context.invoke(binding.function(), arg_count, plan.contract.result_count());

        if let Err(err) = call.status {
            self.report_fault(CallbackFault {
                event: plan.event_id,
                binding: binding.id(),
                message: err.to_string(),
            });
        }

        match plan.contract {
            ResultContract::Notify => {}
            ResultContract::Allow => {
                if context.read_bool(call.base) == Some(false) {
                    decision.deny();
                }
            }
            ResultContract::AllowWithPayload => {
                if context.read_bool(call.base) == Some(false) {
                    decision.deny();
                }
                if let Some(payload) = P::read(context, call.base + 1) {
                    decision.replace_payload(payload);
                }
            }
        }
    }
}
