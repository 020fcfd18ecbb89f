//! Engine-side transactions
//!
//! A transaction is a slot in the arena holding two command buffers: the
//! mutations buffered since `begin`, and the records published on commit.
//! Nothing touches the scene until commit. Released slots are zeroed, so a
//! discarded transaction leaves the arena exactly as it was before `begin`.

use std::mem::size_of;

use strata_abi::{Command, CommandReader, CommandWriter, RawTransaction};

use crate::state::Engine;

/// Transactions that may be open at the same time
pub const MAX_TRANSACTIONS: usize = 4;

/// Bytes per command buffer, size prefix included
pub const TRANSACTION_BUFFER_SIZE: usize = 16 * 1024;

#[repr(C)]
pub struct TransactionSlot {
    pub in_use: u32,
    pub _reserved: u32,
    pub pending: [u8; TRANSACTION_BUFFER_SIZE],
    pub published: [u8; TRANSACTION_BUFFER_SIZE],
}

impl TransactionSlot {
    fn release(&mut self) {
        self.in_use = 0;
        self.pending.fill(0);
        self.published.fill(0);
    }
}

impl<'a> Engine<'a> {
    /// Open a transaction, or return null when every slot is taken
    pub fn begin_transaction(&mut self) -> *mut RawTransaction {
        let Some(slot) = self.state.transactions.iter_mut().find(|s| s.in_use == 0) else {
            log_platform!(
                self.platform,
                Warn,
                "All {} transaction slots are in use",
                MAX_TRANSACTIONS
            );
            return std::ptr::null_mut();
        };

        slot.in_use = 1;
        if let Err(e) = CommandWriter::new(&mut slot.pending) {
            log_platform!(self.platform, Error, "Failed to start transaction buffer: {}", e);
        }
        slot as *mut TransactionSlot as *mut RawTransaction
    }

    /// Index of the open slot behind a handle
    fn active_slot(&self, tx: *mut RawTransaction) -> Option<usize> {
        let base = self.state.transactions.as_ptr() as usize;
        let addr = tx as usize;
        let index = addr
            .checked_sub(base)
            .filter(|delta| delta % size_of::<TransactionSlot>() == 0)
            .map(|delta| delta / size_of::<TransactionSlot>())
            .filter(|&index| index < MAX_TRANSACTIONS && self.state.transactions[index].in_use != 0);

        if index.is_none() {
            log_platform!(self.platform, Error, "Invalid or closed transaction handle {:p}", tx);
        }
        index
    }

    /// Buffer a mutation until commit
    pub fn buffer_mutation(&mut self, tx: *mut RawTransaction, command: Command) {
        let Some(index) = self.active_slot(tx) else {
            return;
        };
        let result = CommandWriter::resume(&mut self.state.transactions[index].pending)
            .and_then(|mut writer| writer.push_command(&command));
        if let Err(e) = result {
            log_platform!(self.platform, Error, "Dropped {:?}: {}", command.kind(), e);
        }
    }

    /// Forget buffered mutations, keeping the transaction open
    pub fn clear_transaction(&mut self, tx: *mut RawTransaction) {
        let Some(index) = self.active_slot(tx) else {
            return;
        };
        if let Ok(mut writer) = CommandWriter::resume(&mut self.state.transactions[index].pending) {
            writer.clear();
        }
    }

    /// Close a transaction without applying or publishing anything
    pub fn discard_transaction(&mut self, tx: *mut RawTransaction) {
        if let Some(index) = self.active_slot(tx) {
            self.state.transactions[index].release();
        }
    }

    /// Apply every buffered mutation in order and publish what was applied
    ///
    /// Publishes exactly once, even when nothing was applied.
    pub fn commit_transaction(&mut self, tx: *mut RawTransaction) {
        let Some(index) = self.active_slot(tx) else {
            return;
        };
        let platform = self.platform;

        platform.timed("commit_transaction", || {
            let state = &mut *self.state;
            let slot = &mut state.transactions[index];

            let pending = match CommandReader::new(&slot.pending).and_then(|r| r.decode_all()) {
                Ok(pending) => pending,
                Err(e) => {
                    log_platform!(platform, Error, "Corrupt transaction buffer: {}", e);
                    Vec::new()
                }
            };

            let mut writer = match CommandWriter::new(&mut slot.published) {
                Ok(writer) => writer,
                Err(e) => {
                    log_platform!(platform, Error, "Cannot publish transaction: {}", e);
                    return;
                }
            };

            for command in &pending {
                match state.scene.apply(command) {
                    Ok(applied) => {
                        if let Err(e) = writer.push_command(&applied) {
                            log_platform!(platform, Error, "Publish buffer overflow: {}", e);
                        }
                    }
                    Err(e) => {
                        log_platform!(platform, Warn, "Skipped {:?}: {}", command.kind(), e);
                    }
                }
            }

            log_platform!(
                platform,
                Debug,
                "Committed transaction: {} of {} mutations applied",
                CommandReader::new(writer.as_bytes()).map(|r| r.count()).unwrap_or(0),
                pending.len()
            );
            (platform.publish_transaction)(platform.host, writer.as_bytes().as_ptr());
        });

        self.state.transactions[index].release();
    }
}
