//! Core building blocks shared by resources, the renderer and asset loading.

pub mod completion;

pub use completion::{Completer, Completion, Readiness, completion_pair};
