//! External collaborator clients
//!
//! Each collaborator is consumed through a capability trait so the pipeline
//! can be exercised against in-memory fakes in tests.

pub mod case_store;
pub mod graph;
pub mod mailbox;
pub mod object_store;
pub mod session;

pub use case_store::{CaseStore, WebApiCaseStore};
pub use graph::GraphMailbox;
pub use mailbox::{MailAttachment, MailMessage, Mailbox};
pub use object_store::{delete_prefix, FsObjectStore, ObjectStore};
pub use session::Session;
