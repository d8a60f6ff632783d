pub mod config;
pub mod errors;
pub mod generator;
pub mod jobs;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod publish;
pub mod retry;
pub mod server;
pub mod site;

#[cfg(test)]
pub(crate) mod test_helpers;
