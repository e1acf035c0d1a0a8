//! Ordered hook chains resolving packet fields.
//!
//! Every field of a packet — source and destination identifiers, path
//! fields, interfaces, transport header, payload, and the routing decision
//! itself — is resolved by walking an ordered chain of registered
//! callbacks. A callback either fails the field, finishes it with a
//! definitive value, or defers to the next callback in the chain.
//!
//! Chains are appended to only during single-threaded startup. Once the
//! router is serving traffic they are iterated read-only behind an `Arc`,
//! so dispatch takes no locks on the hot path.

use std::fmt;

use crate::error::HookError;
use crate::packet::RouterPacket;
use crate::path::{HopField, InfoField};
use crate::types::{Dir, HostAddr, InterfaceId, IsdAs, L4Header};

/// What a hook decided about the field it was asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookResult<T> {
    /// Defer to the next hook in the chain.
    Continue,
    /// Definitive answer; no further hooks in the chain run.
    Finish(T),
}

/// What one hook invocation returns.
pub type HookCall<T> = Result<HookResult<T>, HookError>;

/// Packet fields that are resolved through hook chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    SrcIa,
    SrcHost,
    DstIa,
    DstHost,
    InfoField,
    HopField,
    UpFlag,
    IfCurr,
    IfNext,
    Validate,
    L4,
    Payload,
    Process,
    Route,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::SrcIa => "src_ia",
            Field::SrcHost => "src_host",
            Field::DstIa => "dst_ia",
            Field::DstHost => "dst_host",
            Field::InfoField => "info_field",
            Field::HopField => "hop_field",
            Field::UpFlag => "up_flag",
            Field::IfCurr => "if_curr",
            Field::IfNext => "if_next",
            Field::Validate => "validate",
            Field::L4 => "l4",
            Field::Payload => "payload",
            Field::Process => "process",
            Field::Route => "route",
        };
        f.write_str(name)
    }
}

type HookFn<T> = Box<dyn Fn(&mut RouterPacket) -> HookCall<T> + Send + Sync>;
type IfaceHookFn = Box<dyn Fn(&mut RouterPacket, bool, Dir, Dir) -> HookCall<InterfaceId> + Send + Sync>;

/// An ordered chain of hooks for one field.
pub struct HookChain<T> {
    field: Field,
    hooks: Vec<HookFn<T>>,
}

impl<T> HookChain<T> {
    fn new(field: Field) -> Self {
        Self {
            field,
            hooks: Vec::new(),
        }
    }

    /// Append a hook. Only valid during single-threaded startup; chains are
    /// frozen before the first packet is processed.
    pub fn register<F>(&mut self, hook: F)
    where
        F: Fn(&mut RouterPacket) -> HookCall<T> + Send + Sync + 'static,
    {
        self.hooks.push(Box::new(hook));
    }

    pub fn field(&self) -> Field {
        self.field
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Walk the chain in registration order. The first error aborts
    /// resolution of the field; the first `Finish` wins and no later hook
    /// runs. An exhausted chain leaves the field unresolved (`Ok(None)`) and
    /// the caller applies its default/absence policy.
    pub fn dispatch(&self, pkt: &mut RouterPacket) -> Result<Option<T>, HookError> {
        for hook in &self.hooks {
            match hook(pkt)? {
                HookResult::Continue => {}
                HookResult::Finish(v) => return Ok(Some(v)),
            }
        }
        Ok(None)
    }
}

/// Chain for interface resolution. These hooks additionally receive the
/// traversal direction, since the current/next interface depends on which
/// way the path is being walked.
pub struct IfaceChain {
    field: Field,
    hooks: Vec<IfaceHookFn>,
}

impl IfaceChain {
    fn new(field: Field) -> Self {
        Self {
            field,
            hooks: Vec::new(),
        }
    }

    pub fn register<F>(&mut self, hook: F)
    where
        F: Fn(&mut RouterPacket, bool, Dir, Dir) -> HookCall<InterfaceId> + Send + Sync + 'static,
    {
        self.hooks.push(Box::new(hook));
    }

    pub fn field(&self) -> Field {
        self.field
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn dispatch(
        &self,
        pkt: &mut RouterPacket,
        up: bool,
        dir_from: Dir,
        dir_to: Dir,
    ) -> Result<Option<InterfaceId>, HookError> {
        for hook in &self.hooks {
            match hook(pkt, up, dir_from, dir_to)? {
                HookResult::Continue => {}
                HookResult::Finish(v) => return Ok(Some(v)),
            }
        }
        Ok(None)
    }
}

/// All hook chains, one per packet field.
///
/// Built during startup — extension modules and the router's own defaults
/// append handlers in registration order — then shared read-only.
pub struct HookRegistry {
    pub src_ia: HookChain<IsdAs>,
    pub src_host: HookChain<HostAddr>,
    pub dst_ia: HookChain<IsdAs>,
    pub dst_host: HookChain<HostAddr>,
    pub info_field: HookChain<InfoField>,
    pub hop_field: HookChain<HopField>,
    pub up_flag: HookChain<bool>,
    pub if_curr: IfaceChain,
    pub if_next: IfaceChain,
    pub validate: HookChain<()>,
    pub l4: HookChain<L4Header>,
    pub payload: HookChain<Vec<u8>>,
    pub process: HookChain<()>,
    pub route: HookChain<()>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self {
            src_ia: HookChain::new(Field::SrcIa),
            src_host: HookChain::new(Field::SrcHost),
            dst_ia: HookChain::new(Field::DstIa),
            dst_host: HookChain::new(Field::DstHost),
            info_field: HookChain::new(Field::InfoField),
            hop_field: HookChain::new(Field::HopField),
            up_flag: HookChain::new(Field::UpFlag),
            if_curr: IfaceChain::new(Field::IfCurr),
            if_next: IfaceChain::new(Field::IfNext),
            validate: HookChain::new(Field::Validate),
            l4: HookChain::new(Field::L4),
            payload: HookChain::new(Field::Payload),
            process: HookChain::new(Field::Process),
            route: HookChain::new(Field::Route),
        }
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}
