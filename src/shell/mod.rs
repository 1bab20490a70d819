// Composition root for the time_log bounded context.
//
// Responsibilities:
// - Read config from environment.
// - Instantiate the durable entry store and open the history on it.
// - Wire the history into the HTTP router.
// - Drain the history when the server stops.

pub mod config;
pub mod http;
pub mod state;
