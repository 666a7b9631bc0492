//! Named broadcast channels for mirroring app state between TUI instances.
//!
//! A participant opens a channel by name and broadcasts snapshots to every
//! other participant on that name. Delivery is best-effort and fire-and-forget:
//! there is no acknowledgement, no replay for late joiners, and a missing
//! medium degrades to a silent no-op instead of an error.
//!
//! # Transports
//!
//! - **[`Bus`]**: in-process medium; each [`MirrorChannel`] is one participant
//! - **[`SocketChannel`]**: Unix domain socket relay between processes on one host
//!
//! Both implement [`Transport`], so producers and consumers can be handed
//! either one.

pub mod bus;
pub mod error;
pub mod socket;
pub mod transport;

pub use bus::{Bus, MirrorChannel};
pub use error::{MirrorError, MirrorResult};
pub use socket::{channel_socket_path, SocketChannel};
pub use transport::{Listener, Subscription, Transport};
