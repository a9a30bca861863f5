//! Built-in agents. Each one is a thin adapter between the payload and a
//! provider call or a simple rule; real business logic lives with the host.

mod media;
mod review;
mod uploader;
mod writer;

pub use media::{Animator, Illustrator};
pub use review::{HumanGate, StyleGuard};
pub use uploader::Uploader;
pub use writer::Writer;

use pipewright_types::Payload;

/// The first of `brief`, `title`, `topic` present as a non-empty string.
pub(crate) fn subject(payload: &Payload) -> Option<String> {
    ["brief", "title", "topic"]
        .iter()
        .filter_map(|key| payload.get(key).and_then(|v| v.as_str()))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(String::from)
}

/// Text to illustrate or animate: the writer's draft, else the subject.
pub(crate) fn visual_prompt(payload: &Payload) -> String {
    payload
        .lookup("writer.text")
        .and_then(|v| v.as_str())
        .map(String::from)
        .or_else(|| subject(payload))
        .unwrap_or_else(|| "Untitled".into())
}
