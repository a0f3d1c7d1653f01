//! # Keepalive Domain Models
//!
//! Types shared by the store layer, the configuration loader and the
//! keepalive service.
//!
//! ## Key Models
//!
//! - **KeepaliveDocument**: the JSON body written on every write tick
//! - **OperationKind**: read, write or atomic increment
//! - **OperationMode**: how an operation is picked per tick
//! - **ReadTarget**: which counter value a read looks up

pub mod document;
pub mod operation;


pub use document::*;
pub use operation::*;
