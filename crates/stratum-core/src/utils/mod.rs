//! Small shared helpers used across the core components.
use std::future::Future;
use std::pin::Pin;

// This type represents an owned future, as returned by factories and hook handlers
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Render a list of ids for log and error messages, e.g. `a -> b -> a`.
pub fn format_path(ids: &[String]) -> String {
    ids.join(" -> ")
}
