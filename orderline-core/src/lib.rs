//! orderline Core - Order Record Types
//!
//! Pure data structures, the wire codec and the error taxonomy shared by the
//! storage and API crates. No I/O lives here.

use chrono::{DateTime, Utc};

pub mod codec;
pub mod entities;
pub mod error;

pub use codec::{decode, encode, truncate_to_seconds};
pub use entities::{Delivery, Item, Order, Payment};
pub use error::{DecodeError, StorageError, SubEntity, ValidationError};

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;
