//! Exclusive CDP tracing sessions with chunked handoff to a profiler page.
//!
//! One [`SessionController`] owns the single tracing session of the process:
//! it attaches to a target, records with `Tracing.start`, and on stop reads
//! the buffered trace back through [`StreamAssembler`]. The finished
//! [`Payload`] is handed to a [`DeliveryWorker`], which moves it into a
//! receiving context piece by piece with [`ChunkedTransfer`].
//!
//! The browser is reached through the [`DebugChannel`] seam; [`CdpChannel`]
//! implements it over a `pw-trace-runtime` connection.

pub mod channel;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod payload;
pub mod presenter;
pub mod session;
pub mod stream;
pub mod subscription;
pub mod target;
pub mod transfer;

pub use channel::{CdpChannel, ChannelEvent, DebugChannel};
pub use config::{HostSettings, TraceSettings, TransferSettings};
pub use error::{AssemblyError, Error, Result, TransferError};
pub use orchestrator::{Intent, Orchestrator};
pub use payload::Payload;
pub use presenter::{Indicator, LogPresenter, Presenter};
pub use session::{Outcome, SessionController, SessionSnapshot, SessionState};
pub use stream::StreamAssembler;
pub use subscription::OneShot;
pub use target::TargetId;
pub use transfer::{ChunkedTransfer, DeliveryReport, DeliveryWorker, ReceiverContext, ReceiverLauncher};
