//! Domain events emitted as bookings and wallets change.
//!
//! The engine hands events to an [`EventSink`] and knows nothing about
//! delivery; the notification and real-time layers subscribe on their side.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::booking::BookingId;
use crate::wallet::{Money, UserId};

/// Events that occur as bookings move through their lifecycle.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum DomainEvent {
    BookingCreated {
        booking_id: BookingId,
        booking_code: String,
    },
    BookingConfirmed {
        booking_id: BookingId,
    },
    BookingCheckedIn {
        booking_id: BookingId,
    },
    BookingCancelled {
        booking_id: BookingId,
        refund_amount: Money,
    },
    WalletRefunded {
        user_id: UserId,
        amount: Money,
    },
}

impl fmt::Display for DomainEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BookingCreated {
                booking_id,
                booking_code,
            } => write!(f, "booking:created id={booking_id} code={booking_code}"),
            Self::BookingConfirmed { booking_id } => {
                write!(f, "booking:confirmed id={booking_id}")
            }
            Self::BookingCheckedIn { booking_id } => {
                write!(f, "booking:checked_in id={booking_id}")
            }
            Self::BookingCancelled {
                booking_id,
                refund_amount,
            } => write!(
                f,
                "booking:cancelled id={booking_id} refund={refund_amount}"
            ),
            Self::WalletRefunded { user_id, amount } => {
                write!(f, "wallet:refunded user={user_id} amount={amount}")
            }
        }
    }
}

/// Where the engine hands finished events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: DomainEvent);
}

/// Default sink: writes events to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn emit(&self, event: DomainEvent) {
        log::info!("{event}");
    }
}
