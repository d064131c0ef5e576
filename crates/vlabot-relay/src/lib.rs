//! `vlabot-relay` – filesystem coordination between the robot processes.
//!
//! The controller, the inference service and the operator console share no
//! memory and hold no connection to each other.  They agree on "latest
//! image" and "current command batch" through two locations in a shared
//! exchange directory:
//!
//! - the **image channel**: `<prefix>_<unix-seconds>.<ext>` files; the
//!   current frame is the one with the largest embedded timestamp.
//! - the **command channel**: one JSON file, `{"commands": ...}`, replaced
//!   whole on every write; readers act on a strictly later modification
//!   time.
//!
//! Every write goes through [`atomic::write_atomic`] so no reader ever
//! sees a partial file.  Delivery is at most once per change, and the two
//! channels are polled independently: a command batch carries no link to
//! the frame it was generated from, so it may execute against a newer
//! frame than the one the operator saw.
//!
//! # Modules
//!
//! - [`atomic`] – write-then-rename helper.
//! - [`bmp`] – bit-exact uncompressed BMP encoding of raw camera buffers.
//! - [`frame_channel`] – [`FrameChannel`]: publish and discover frames.
//! - [`mailbox`] – [`CommandMailbox`]: poll the command file; [`write_batch`].
//! - [`watcher`] – [`FrameWatcher`]: cancellable timer task that streams
//!   new frames over an mpsc channel.

pub mod atomic;
pub mod bmp;
pub mod frame_channel;
pub mod mailbox;
pub mod watcher;

pub use atomic::write_atomic;
pub use frame_channel::{FRAME_EXTENSIONS, FrameChannel, ObservedFrame};
pub use mailbox::{CommandDocument, CommandMailbox, CommandPayload, write_batch};
pub use watcher::FrameWatcher;
