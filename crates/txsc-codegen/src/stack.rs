//! The virtual stack maintained during lowering.
//!
//! Each slot records where its value came from: a named assumption, a
//! pushed literal, or a computed result. The stack is updated after every
//! emitted opcode using the per-opcode arity metadata, with dedicated
//! transitions for the depth-parameterized shuffles (`pick`, `roll`).
//! Depths count from the top (0 = top), matching `OP_PICK`/`OP_ROLL`
//! operand semantics.

use txsc_core::opcode::Opcode;

/// Provenance of a stack slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotOrigin {
    /// Named by an `assume` statement; present at script entry.
    Assumed(String),
    /// Pushed literal.
    Literal,
    /// Result of an opcode.
    Computed,
}

/// One slot of the virtual stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackSlot {
    pub origin: SlotOrigin,
}

/// Underflow during simulation -- the user's stack discipline is wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackUnderflow;

/// The simulated stack; the end of the vector is the top.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VirtualStack {
    slots: Vec<StackSlot>,
}

impl VirtualStack {
    pub fn new() -> Self {
        VirtualStack::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Pushes an assumption slot (script-entry value).
    pub fn assume(&mut self, name: &str) {
        self.slots.push(StackSlot {
            origin: SlotOrigin::Assumed(name.to_string()),
        });
    }

    pub fn push_literal(&mut self) {
        self.slots.push(StackSlot {
            origin: SlotOrigin::Literal,
        });
    }

    pub fn push_computed(&mut self) {
        self.slots.push(StackSlot {
            origin: SlotOrigin::Computed,
        });
    }

    pub fn pop(&mut self) -> Result<StackSlot, StackUnderflow> {
        self.slots.pop().ok_or(StackUnderflow)
    }

    /// Pops `n` slots.
    pub fn popn(&mut self, n: usize) -> Result<(), StackUnderflow> {
        if self.slots.len() < n {
            return Err(StackUnderflow);
        }
        self.slots.truncate(self.slots.len() - n);
        Ok(())
    }

    /// Current depth of the slot assuming `name`, counted from the top.
    pub fn depth_of(&self, name: &str) -> Option<usize> {
        self.slots
            .iter()
            .rev()
            .position(|slot| matches!(&slot.origin, SlotOrigin::Assumed(n) if n == name))
    }

    /// Copies the slot at `depth` to the top. The copy is `Computed`; the
    /// original keeps its identity.
    pub fn pick(&mut self, depth: usize) -> Result<(), StackUnderflow> {
        if depth >= self.slots.len() {
            return Err(StackUnderflow);
        }
        self.push_computed();
        Ok(())
    }

    /// Moves the slot at `depth` to the top, keeping its origin.
    pub fn roll(&mut self, depth: usize) -> Result<(), StackUnderflow> {
        if depth >= self.slots.len() {
            return Err(StackUnderflow);
        }
        let index = self.slots.len() - 1 - depth;
        let slot = self.slots.remove(index);
        self.slots.push(slot);
        Ok(())
    }

    /// Applies a fixed-arity opcode: consumes its inputs, produces
    /// `Computed` outputs. Must not be called for `OP_PICK`/`OP_ROLL`/
    /// `OP_CHECKMULTISIG*` (their arity is operand-dependent).
    pub fn apply_opcode(&mut self, op: Opcode) -> Result<(), StackUnderflow> {
        let (inputs, outputs) = op.arity().ok_or(StackUnderflow)?;
        self.popn(inputs as usize)?;
        for _ in 0..outputs {
            self.push_computed();
        }
        Ok(())
    }

    /// Merges the exit stacks of two balanced branches: slots identical in
    /// both survive, diverging slots become `Computed`. `None` when the
    /// shapes differ (imbalanced branches).
    pub fn reconcile(then_stack: &VirtualStack, else_stack: &VirtualStack) -> Option<VirtualStack> {
        if then_stack.len() != else_stack.len() {
            return None;
        }
        let slots = then_stack
            .slots
            .iter()
            .zip(&else_stack.slots)
            .map(|(a, b)| {
                if a == b {
                    a.clone()
                } else {
                    StackSlot {
                        origin: SlotOrigin::Computed,
                    }
                }
            })
            .collect();
        Some(VirtualStack { slots })
    }

    /// Downgrades every assumption slot to `Computed`; used after
    /// imbalanced branches, where recorded depths are no longer
    /// trustworthy.
    pub fn scrubbed(&self) -> VirtualStack {
        let slots = self
            .slots
            .iter()
            .map(|slot| match slot.origin {
                SlotOrigin::Assumed(_) => StackSlot {
                    origin: SlotOrigin::Computed,
                },
                _ => slot.clone(),
            })
            .collect();
        VirtualStack { slots }
    }
}
