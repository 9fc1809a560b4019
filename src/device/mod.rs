//! Accelerator abstraction layer
//!
//! This module provides the trait the codec submits jobs through, plus the
//! descriptor, completion record and AECS types those jobs exchange.

pub mod aecs;
pub mod completion;
pub mod descriptor;

use std::fmt;
use std::sync::Arc;

use log::{debug, trace};

use crate::config::WaitMode;
use crate::error::{AccelError, Result, StatusCode};

pub use aecs::{AecsPair, CodeTable, CompressAecs, DecompressAecs, Histogram};
pub use completion::CompletionRecord;
pub use descriptor::{
    AecsRegion, CompressionFlags, DecompressionFlags, Descriptor, DescriptorFlags, Destination,
    Opcode,
};

/// Synchronous job submission to an accelerator work queue.
///
/// Implementations block until the completion record is written and return
/// its status. They choose the hardware queue; the codec never does.
pub trait Submitter: Send + Sync {
    /// Submit a job and wait for completion
    fn submit(&self, desc: &mut Descriptor<'_>, record: &mut CompletionRecord) -> StatusCode;

    /// Submit a job and spin on the completion record
    fn submit_busy_poll(
        &self,
        desc: &mut Descriptor<'_>,
        record: &mut CompletionRecord,
    ) -> StatusCode {
        self.submit(desc, record)
    }

    /// Largest source or destination size a single job may use
    fn max_transfer_size(&self) -> u32;

    /// Whether a usable device is present
    fn ready(&self) -> bool {
        true
    }
}

/// Check whether a submitter has a usable device behind it
pub fn ready(submitter: &dyn Submitter) -> bool {
    submitter.ready()
}

/// Shared handle to an accelerator, passed to every stream constructor.
#[derive(Clone)]
pub struct Accelerator {
    submitter: Arc<dyn Submitter>,
}

impl Accelerator {
    /// Wrap a submitter, failing when it reports no device
    pub fn new(submitter: Arc<dyn Submitter>) -> Result<Self> {
        if !ready(submitter.as_ref()) {
            debug!("accelerator not ready");
            return Err(AccelError::NoHardwareDeviceDetected);
        }
        debug!(
            "accelerator ready, max transfer size {}",
            submitter.max_transfer_size()
        );
        Ok(Self { submitter })
    }

    pub fn max_transfer_size(&self) -> u32 {
        self.submitter.max_transfer_size()
    }

    pub(crate) fn submit(
        &self,
        desc: &mut Descriptor<'_>,
        record: &mut CompletionRecord,
        mode: WaitMode,
    ) -> StatusCode {
        record.reset();
        trace!(
            "submit {} src1={} dst={}",
            desc,
            desc.src1.len(),
            desc.dst.capacity()
        );
        let status = match mode {
            WaitMode::Blocking => self.submitter.submit(desc, record),
            WaitMode::BusyPoll => self.submitter.submit_busy_poll(desc, record),
        };
        trace!("completed {record}");
        status
    }
}

impl fmt::Debug for Accelerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accelerator")
            .field("max_transfer_size", &self.max_transfer_size())
            .finish()
    }
}
