//! Networking Layer
//!
//! Everything between the socket and the game: the point-to-point
//! transport, the secure channel bootstrapped on top of it, the wire
//! message schema, and the tagged-message bus the session speaks through.

pub mod bus;
pub mod protocol;
pub mod secure;
pub mod transport;

pub use bus::MessageBus;
pub use protocol::{Header, PartnerRequestKind, WireMessage};
pub use secure::{AuthFailure, SecureChannel, SessionCipher};
pub use transport::{ReceiveTimeout, Role, Transport};
