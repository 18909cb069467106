//! Cross-core mailbox channel.
//!
//! Every ordered pair of cores owns one mailbox: a header word with a busy
//! bit, a type field and a short parameter, plus one extension word and a
//! done flag. A sender fills both words and raises busy; the receiving
//! core's interrupt path masks the peer's busy interrupt, copies the words
//! into a per-core receive slot and arms a deadline-scheduled task to run
//! the handler out of interrupt context, since a handler such as a
//! component trigger takes coherency locks. When the handler finishes, the
//! busy bit is cleared, done is set and the interrupt re-armed; a blocking
//! sender polls done against a bounded timeout.
//!
//! Messages are not acknowledged beyond busy/done: an unrecognized type is
//! logged and dropped.

use crate::component::TriggerCommand;

/// Busy bit of the header word.
pub const HEADER_BUSY: u32 = 1 << 31;
/// Message type field, bits 30..24 of the header.
pub const HEADER_TYPE_SHIFT: u32 = 24;
const HEADER_TYPE_MASK: u32 = 0x7f;
/// Short parameter, bits 23..0 of the header.
const HEADER_PARAM_MASK: u32 = 0x00ff_ffff;

const TYPE_POWER_DOWN: u32 = 0x01;
const TYPE_NOTIFY: u32 = 0x02;
const TYPE_PPL_TRIGGER: u32 = 0x03;
const TYPE_COMP_CMD: u32 = 0x04;
const TYPE_IPC_RELAY: u32 = 0x05;

const ACTION_PREPARE: u32 = 0x00;
const ACTION_RESET: u32 = 0x01;
const ACTION_TRIGGER: u32 = 0x10; // cmd code in the low nibble

/// Command addressed to a single remote component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentAction {
    /// Run the component's prepare path and arm its pipeline task.
    Prepare,
    /// Reset the component subtree.
    Reset,
    /// Deliver a trigger command locally on the component's core.
    Trigger(TriggerCommand),
}

/// Decoded cross-core message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdcMessage {
    /// Ask the target core to go offline.
    PowerDown,
    /// Fire-and-forget notification payload.
    Notify(u32),
    /// Trigger a pipeline that lives on the target core.
    PipelineTrigger {
        /// Host id of the pipeline.
        pipeline: u32,
        /// Command to deliver.
        cmd: TriggerCommand,
    },
    /// Drive one component that lives on the target core.
    ComponentCommand {
        /// Host id of the component.
        component: u32,
        /// What to do with it.
        action: ComponentAction,
    },
    /// Relay an IPC payload to the target core's handler.
    IpcRelay {
        /// Opaque payload word.
        payload: u32,
    },
}

fn cmd_code(cmd: TriggerCommand) -> u32 {
    match cmd {
        TriggerCommand::Reset => 0,
        TriggerCommand::Prepare => 1,
        TriggerCommand::PreStart => 2,
        TriggerCommand::Start => 3,
        TriggerCommand::Release => 4,
        TriggerCommand::PreRelease => 5,
        TriggerCommand::Pause => 6,
        TriggerCommand::Stop => 7,
        TriggerCommand::Xrun => 8,
    }
}

fn cmd_from_code(code: u32) -> Option<TriggerCommand> {
    Some(match code {
        0 => TriggerCommand::Reset,
        1 => TriggerCommand::Prepare,
        2 => TriggerCommand::PreStart,
        3 => TriggerCommand::Start,
        4 => TriggerCommand::Release,
        5 => TriggerCommand::PreRelease,
        6 => TriggerCommand::Pause,
        7 => TriggerCommand::Stop,
        8 => TriggerCommand::Xrun,
        _ => return None,
    })
}

impl IdcMessage {
    /// Pack into (header, extension); the header carries the busy bit.
    pub fn encode(&self) -> (u32, u32) {
        let (ty, param, ext) = match *self {
            IdcMessage::PowerDown => (TYPE_POWER_DOWN, 0, 0),
            IdcMessage::Notify(payload) => (TYPE_NOTIFY, 0, payload),
            IdcMessage::PipelineTrigger { pipeline, cmd } => {
                (TYPE_PPL_TRIGGER, cmd_code(cmd), pipeline)
            }
            IdcMessage::ComponentCommand { component, action } => {
                let param = match action {
                    ComponentAction::Prepare => ACTION_PREPARE,
                    ComponentAction::Reset => ACTION_RESET,
                    ComponentAction::Trigger(cmd) => ACTION_TRIGGER | cmd_code(cmd),
                };
                (TYPE_COMP_CMD, param, component)
            }
            IdcMessage::IpcRelay { payload } => (TYPE_IPC_RELAY, 0, payload),
        };
        (
            HEADER_BUSY | (ty << HEADER_TYPE_SHIFT) | (param & HEADER_PARAM_MASK),
            ext,
        )
    }

    /// Unpack from (header, extension). `None` for an unknown type.
    pub fn decode(header: u32, extension: u32) -> Option<Self> {
        let ty = (header >> HEADER_TYPE_SHIFT) & HEADER_TYPE_MASK;
        let param = header & HEADER_PARAM_MASK;
        Some(match ty {
            TYPE_POWER_DOWN => IdcMessage::PowerDown,
            TYPE_NOTIFY => IdcMessage::Notify(extension),
            TYPE_PPL_TRIGGER => IdcMessage::PipelineTrigger {
                pipeline: extension,
                cmd: cmd_from_code(param)?,
            },
            TYPE_COMP_CMD => {
                let action = if param & ACTION_TRIGGER != 0 {
                    ComponentAction::Trigger(cmd_from_code(param & 0xf)?)
                } else if param == ACTION_RESET {
                    ComponentAction::Reset
                } else {
                    ComponentAction::Prepare
                };
                IdcMessage::ComponentCommand {
                    component: extension,
                    action,
                }
            }
            TYPE_IPC_RELAY => IdcMessage::IpcRelay { payload: extension },
            _ => return None,
        })
    }
}

/// One direction of one core pair.
#[derive(Debug, Default, Clone)]
struct Mailbox {
    header: u32,
    extension: u32,
    done: bool,
    int_masked: bool,
}

/// A message parked for out-of-interrupt handling on its target core.
#[derive(Debug, Clone, Copy)]
pub struct ReceiveSlot {
    /// Core that sent the message.
    pub from: usize,
    /// The decoded message.
    pub msg: IdcMessage,
}

/// All mailboxes plus one receive slot per core.
#[derive(Debug)]
pub struct IdcBus {
    cores: usize,
    mailboxes: Vec<Mailbox>,
    slots: Vec<Option<ReceiveSlot>>,
}

impl IdcBus {
    /// Create the mailbox matrix for `cores` cores.
    pub fn new(cores: usize) -> Self {
        Self {
            cores,
            mailboxes: vec![Mailbox::default(); cores * cores],
            slots: vec![None; cores],
        }
    }

    fn mbox_mut(&mut self, from: usize, to: usize) -> &mut Mailbox {
        &mut self.mailboxes[from * self.cores + to]
    }

    /// Write a message into the `from -> to` mailbox and raise busy.
    pub fn post(&mut self, from: usize, to: usize, msg: &IdcMessage) {
        let (header, extension) = msg.encode();
        let mbox = self.mbox_mut(from, to);
        mbox.header = header;
        mbox.extension = extension;
        mbox.done = false;
    }

    /// Whether the `from -> to` mailbox has its busy bit raised.
    pub fn busy(&self, from: usize, to: usize) -> bool {
        self.mailboxes[from * self.cores + to].header & HEADER_BUSY != 0
    }

    /// Whether the `from -> to` transaction has completed.
    pub fn done(&self, from: usize, to: usize) -> bool {
        self.mailboxes[from * self.cores + to].done
    }

    /// Interrupt entry on core `to`: capture the pending message from
    /// `from` into the receive slot and mask the peer's busy interrupt.
    ///
    /// Returns false when the message failed to decode; the transaction is
    /// completed on the spot so the sender never hangs on garbage.
    pub fn capture(&mut self, from: usize, to: usize) -> bool {
        let mbox = self.mbox_mut(from, to);
        mbox.int_masked = true;
        let (header, extension) = (mbox.header, mbox.extension);
        match IdcMessage::decode(header, extension) {
            Some(msg) => {
                self.slots[to] = Some(ReceiveSlot { from, msg });
                true
            }
            None => {
                tracing::warn!(from, to, header, "unknown idc message type, dropped");
                self.complete(from, to);
                false
            }
        }
    }

    /// Take the message parked on `core`, if any.
    pub fn take_slot(&mut self, core: usize) -> Option<ReceiveSlot> {
        self.slots[core].take()
    }

    /// Handler finished: clear busy, set done, re-arm the busy interrupt.
    pub fn complete(&mut self, from: usize, to: usize) {
        let mbox = self.mbox_mut(from, to);
        mbox.header &= !HEADER_BUSY;
        mbox.done = true;
        mbox.int_masked = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let msgs = [
            IdcMessage::PowerDown,
            IdcMessage::Notify(0xdead_beef),
            IdcMessage::PipelineTrigger {
                pipeline: 7,
                cmd: TriggerCommand::PreStart,
            },
            IdcMessage::ComponentCommand {
                component: 12,
                action: ComponentAction::Trigger(TriggerCommand::Stop),
            },
            IdcMessage::ComponentCommand {
                component: 3,
                action: ComponentAction::Prepare,
            },
            IdcMessage::IpcRelay { payload: 42 },
        ];
        for msg in msgs {
            let (h, e) = msg.encode();
            assert!(h & HEADER_BUSY != 0);
            assert_eq!(IdcMessage::decode(h, e), Some(msg));
        }
    }

    #[test]
    fn test_unknown_type_decodes_to_none() {
        let header = HEADER_BUSY | (0x7f << HEADER_TYPE_SHIFT);
        assert_eq!(IdcMessage::decode(header, 0), None);
    }

    #[test]
    fn test_busy_done_protocol() {
        let mut bus = IdcBus::new(2);
        bus.post(0, 1, &IdcMessage::Notify(1));
        assert!(bus.busy(0, 1));
        assert!(!bus.done(0, 1));
        assert!(bus.capture(0, 1));
        let slot = bus.take_slot(1).unwrap();
        assert_eq!(slot.from, 0);
        bus.complete(0, 1);
        assert!(!bus.busy(0, 1));
        assert!(bus.done(0, 1));
    }

    #[test]
    fn test_garbage_header_completes_without_slot() {
        let mut bus = IdcBus::new(2);
        bus.post(0, 1, &IdcMessage::Notify(1));
        // corrupt the type field in place
        bus.mbox_mut(0, 1).header = HEADER_BUSY | (0x6e << HEADER_TYPE_SHIFT);
        assert!(!bus.capture(0, 1));
        assert!(bus.take_slot(1).is_none());
        assert!(bus.done(0, 1));
    }
}
