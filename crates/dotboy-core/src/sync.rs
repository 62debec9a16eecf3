//! Single-slot frame handshake between the emulator thread and a
//! presenter.
//!
//! The producer publishes at VBlank and blocks until the previous frame
//! was consumed, so a slow presenter stalls the core by whole VBlanks —
//! which is exactly the pacing a fixed-rate panel wants. `stop` trips the
//! shared running flag and wakes both sides.

use std::sync::{Condvar, Mutex};

use crate::ppu::{Framebuffer, FRAMEBUFFER_LEN};

struct Slot {
    frame: Box<Framebuffer>,
    full: bool,
    running: bool,
}

pub struct FrameChannel {
    slot: Mutex<Slot>,
    frame_available: Condvar,
    frame_consumed: Condvar,
}

impl FrameChannel {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                frame: Box::new([0; FRAMEBUFFER_LEN]),
                full: false,
                running: true,
            }),
            frame_available: Condvar::new(),
            frame_consumed: Condvar::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.slot.lock().expect("frame channel poisoned").running
    }

    /// Wake both sides and refuse all further traffic.
    pub fn stop(&self) {
        let mut slot = self.slot.lock().expect("frame channel poisoned");
        slot.running = false;
        drop(slot);
        self.frame_available.notify_all();
        self.frame_consumed.notify_all();
    }

    /// Producer side: copy `frame` into the slot, waiting for the
    /// previous one to be consumed first. Returns false when stopped.
    pub fn publish(&self, frame: &Framebuffer) -> bool {
        let mut slot = self.slot.lock().expect("frame channel poisoned");
        while slot.full && slot.running {
            slot = self
                .frame_consumed
                .wait(slot)
                .expect("frame channel poisoned");
        }
        if !slot.running {
            return false;
        }
        slot.frame.copy_from_slice(frame);
        slot.full = true;
        drop(slot);
        self.frame_available.notify_one();
        true
    }

    /// Consumer side: wait for a frame and copy it out. Returns false
    /// when stopped.
    pub fn consume(&self, dst: &mut Framebuffer) -> bool {
        let mut slot = self.slot.lock().expect("frame channel poisoned");
        while !slot.full && slot.running {
            slot = self
                .frame_available
                .wait(slot)
                .expect("frame channel poisoned");
        }
        if !slot.full {
            return false;
        }
        dst.copy_from_slice(slot.frame.as_ref());
        slot.full = false;
        drop(slot);
        self.frame_consumed.notify_one();
        true
    }
}

impl Default for FrameChannel {
    fn default() -> Self {
        Self::new()
    }
}
