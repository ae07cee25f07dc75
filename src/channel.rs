//! The per-competitor shared-memory channel.
//!
//! A [`Channel`] is one fixed-layout region mediating one competitor's turn
//! handshake. The `running` flag is the only synchronization primitive:
//! the orchestrator stores true to grant the turn, the competitor stores
//! false to hand it back, and both sides spin-poll it. `instruction_count`
//! is monotonically increased by the competitor's instrumentation and only
//! ever read by the orchestrator. The snapshot bytes are written by exactly
//! one side at a time as a side effect of the same handshake, so plain byte
//! copies ordered by the Release/Acquire edges on `running` are safe.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::error::{ChannelError, ChannelResult};
use crate::shm::ShmRegion;
use crate::transfer::{TransferState, wire};

/// One competitor's channel, either the creator (orchestrator) or an
/// attacher (competitor process) handle.
pub struct Channel {
    region: ShmRegion,
}

impl Channel {
    /// Create and publish a channel, writing magic, version, and the
    /// initial snapshot. Flags and the instruction counter start at zero.
    ///
    /// # Errors
    ///
    /// [`ChannelError::AlreadyExists`] if a channel of this name is live,
    /// or any [`ChannelError`] from the region layer.
    pub fn create(name: &str, initial: &TransferState) -> ChannelResult<Self> {
        let region = ShmRegion::create(name, wire::REGION_BYTES)?;
        let channel = Self { region };
        unsafe {
            let base = channel.region.as_ptr();
            std::ptr::copy_nonoverlapping(
                wire::MAGIC.as_ptr(),
                base.add(wire::MAGIC_OFF),
                wire::MAGIC.len(),
            );
            std::ptr::copy_nonoverlapping(
                wire::VERSION.to_le_bytes().as_ptr(),
                base.add(wire::VERSION_OFF),
                4,
            );
        }
        channel.write_snapshot(initial);
        Ok(channel)
    }

    /// Attach to a channel some creator has already published, validating
    /// magic and layout version.
    ///
    /// # Errors
    ///
    /// [`ChannelError::NotFound`] before the creator publishes,
    /// [`ChannelError::Incompatible`] on a magic/version mismatch, or any
    /// [`ChannelError`] from the region layer.
    pub fn attach(name: &str) -> ChannelResult<Self> {
        let region = ShmRegion::attach(name, wire::REGION_BYTES)?;
        let channel = Self { region };

        let mut magic = [0u8; 8];
        let mut version_bytes = [0u8; 4];
        unsafe {
            let base = channel.region.as_ptr();
            std::ptr::copy_nonoverlapping(
                base.add(wire::MAGIC_OFF),
                magic.as_mut_ptr(),
                magic.len(),
            );
            std::ptr::copy_nonoverlapping(
                base.add(wire::VERSION_OFF),
                version_bytes.as_mut_ptr(),
                4,
            );
        }
        let version = u32::from_le_bytes(version_bytes);
        if magic != wire::MAGIC || version != wire::VERSION {
            let found = if magic == wire::MAGIC { version } else { 0 };
            return Err(ChannelError::Incompatible {
                name: name.to_string(),
                found,
            });
        }
        Ok(channel)
    }

    /// Name the channel was published under.
    #[must_use]
    pub fn name(&self) -> &str {
        self.region.name()
    }

    /// Whether this handle created (and will unpublish) the region.
    #[must_use]
    pub fn is_creator(&self) -> bool {
        self.region.is_creator()
    }

    /// Grant the turn (orchestrator side). Release-ordered so the snapshot
    /// written beforehand is visible to the competitor's Acquire load.
    pub fn set_running(&self) {
        self.running_flag().store(1, Ordering::Release);
    }

    /// Hand the turn back (competitor side). Release-ordered so the orders
    /// written beforehand are visible to the orchestrator's Acquire load.
    pub fn clear_running(&self) {
        self.running_flag().store(0, Ordering::Release);
    }

    /// Poll the turn-grant flag.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running_flag().load(Ordering::Acquire) != 0
    }

    /// Mark the match over so the competitor's poll loop exits cleanly.
    pub fn set_halted(&self) {
        self.halted_flag().store(1, Ordering::Release);
    }

    /// Poll the match-over flag.
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.halted_flag().load(Ordering::Acquire) != 0
    }

    /// Cumulative instructions the competitor has executed this match.
    #[must_use]
    pub fn instruction_count(&self) -> u64 {
        self.instruction_counter().load(Ordering::Acquire)
    }

    /// The counting capability handed to the competitor's instrumentation.
    #[must_use]
    pub fn meter(&self) -> InstructionMeter<'_> {
        InstructionMeter {
            counter: self.instruction_counter(),
        }
    }

    /// Write a snapshot into the region.
    ///
    /// Caller must hold the write side of the handshake: the orchestrator
    /// writes only while `running` is false, the competitor only while it
    /// is true.
    pub fn write_snapshot(&self, state: &TransferState) {
        let mut buf = vec![0u8; wire::SNAPSHOT_BYTES];
        state.encode(&mut buf);
        unsafe {
            std::ptr::copy_nonoverlapping(
                buf.as_ptr(),
                self.region.as_ptr().add(wire::SNAPSHOT_OFF),
                wire::SNAPSHOT_BYTES,
            );
        }
    }

    /// Read the snapshot out of the region. Same handshake discipline as
    /// [`Channel::write_snapshot`].
    #[must_use]
    pub fn read_snapshot(&self) -> TransferState {
        let mut buf = vec![0u8; wire::SNAPSHOT_BYTES];
        unsafe {
            std::ptr::copy_nonoverlapping(
                self.region.as_ptr().add(wire::SNAPSHOT_OFF),
                buf.as_mut_ptr(),
                wire::SNAPSHOT_BYTES,
            );
        }
        TransferState::decode(&buf)
    }

    fn running_flag(&self) -> &AtomicU32 {
        // Offset is 4-aligned within a page-aligned mapping.
        unsafe { &*self.region.as_ptr().add(wire::RUNNING_OFF).cast::<AtomicU32>() }
    }

    fn halted_flag(&self) -> &AtomicU32 {
        unsafe { &*self.region.as_ptr().add(wire::HALTED_OFF).cast::<AtomicU32>() }
    }

    fn instruction_counter(&self) -> &AtomicU64 {
        // Offset is 8-aligned within a page-aligned mapping.
        unsafe { &*self.region.as_ptr().add(wire::INSTRUCTIONS_OFF).cast::<AtomicU64>() }
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.region.name())
            .field("creator", &self.region.is_creator())
            .field("running", &self.is_running())
            .field("halted", &self.is_halted())
            .field("instructions", &self.instruction_count())
            .finish_non_exhaustive()
    }
}

/// Injected capability for the competitor-side instrumentation to account
/// executed instructions against the channel's shared counter.
///
/// The counter is monotone: it only ever increases, and the orchestrator
/// derives per-turn deltas by differencing successive reads.
#[derive(Clone, Copy)]
pub struct InstructionMeter<'a> {
    counter: &'a AtomicU64,
}

impl InstructionMeter<'_> {
    /// Account `n` more executed instructions.
    pub fn add(&self, n: u64) {
        self.counter.fetch_add(n, Ordering::AcqRel);
    }

    /// Current cumulative count.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.counter.load(Ordering::Acquire)
    }
}

impl fmt::Debug for InstructionMeter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstructionMeter")
            .field("count", &self.count())
            .finish_non_exhaustive()
    }
}
