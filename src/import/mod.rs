//! Cross-profile import engine.
//!
//! The pipeline has three workers and one coordinator:
//!
//! - [`reader`] - opens the source profile read-only and runs searches
//! - [`resolver`] - decides duplicate / media-collision / note-type fate
//!   for every found note
//! - [`writer`] - commits accepted candidates as one atomic unit of work
//! - [`session`] - the state machine tying them together and owning the
//!   source handle and the cancellation token
//!
//! Supporting modules: [`hash`] (cross-store note identity) and [`types`]
//! (candidates and the import report).
//!
//! # Example
//!
//! ```ignore
//! use crossdeck::config::ImportOptions;
//! use crossdeck::import::session::ImportSession;
//! use crossdeck::store::ProfileStore;
//!
//! let mut session = ImportSession::new(&root, ImportOptions::default());
//! session.open("sentence-bank")?;
//! session.search("tag:mining")?;
//! let mut dest = ProfileStore::open(&root, "main")?;
//! session.resolve(&dest)?;
//! let report = session.commit(&mut dest)?;
//! println!("{report}");
//! ```

pub mod hash;
pub mod reader;
pub mod resolver;
pub mod session;
pub mod types;
pub mod writer;

pub use reader::{SearchOutcome, SourceReader};
pub use resolver::{DestIndex, resolve};
pub use session::{CancelToken, ImportSession, SessionState};
pub use types::{
    Decision, FailReason, FailureDetail, ImportCandidate, ImportReport, MediaAction, MediaPlan,
    RenameDetail,
};
pub use writer::Writer;
