//! Remote chat backend abstraction
//!
//! The backend is an opaque request/response collaborator: prompts go out
//! with a conversation id and a model selector, generated text (possibly
//! carrying embedded image markers) comes back. Everything it returns is
//! fed into the storage layer; nothing about its internals is modeled
//! here.

pub mod base;
pub mod remote;

pub use base::{GenerateRequest, GenerateResponse, Provider, RemoteConversation, RemoteMessage};
pub use remote::RemoteProvider;
