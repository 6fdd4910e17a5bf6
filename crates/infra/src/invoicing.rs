//! Invoicing collaborator seam.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use innkeep_billing::InvoiceLine;
use innkeep_core::{BookingId, InvoiceId};

use crate::error::InvoicingError;

/// Receives the reconciled lines of a booking and returns the invoice they landed on.
pub trait InvoicingClient: Send + Sync {
    fn submit(&self, booking_id: BookingId, lines: &[InvoiceLine]) -> Result<InvoiceId, InvoicingError>;
}

impl<C> InvoicingClient for Arc<C>
where
    C: InvoicingClient + ?Sized,
{
    fn submit(&self, booking_id: BookingId, lines: &[InvoiceLine]) -> Result<InvoiceId, InvoicingError> {
        (**self).submit(booking_id, lines)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub invoice_id: InvoiceId,
    pub booking_id: BookingId,
    pub lines: Vec<InvoiceLine>,
}

/// Records submissions; can be switched to fail for tests.
#[derive(Debug, Default)]
pub struct InMemoryInvoicingClient {
    submissions: Mutex<Vec<Submission>>,
    failing: AtomicBool,
}

impl InMemoryInvoicingClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl InvoicingClient for InMemoryInvoicingClient {
    fn submit(&self, booking_id: BookingId, lines: &[InvoiceLine]) -> Result<InvoiceId, InvoicingError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(InvoicingError::Unavailable("invoicing switched off".to_string()));
        }
        let invoice_id = InvoiceId::new();
        self.submissions
            .lock()
            .map_err(|_| InvoicingError::Unavailable("lock poisoned".to_string()))?
            .push(Submission {
                invoice_id,
                booking_id,
                lines: lines.to_vec(),
            });
        Ok(invoice_id)
    }
}
