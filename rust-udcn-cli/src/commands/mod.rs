//! One module per `udcn` subcommand.

pub mod consumer;
pub mod demo;
pub mod producer;
