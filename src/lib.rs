pub mod app;
pub mod config;
pub mod error;
pub mod fault;
pub mod net;
pub mod proto;
pub mod queue;
pub mod scenario;
pub mod sim;
pub mod topo;
pub mod trace;

#[cfg(test)]
mod test;
