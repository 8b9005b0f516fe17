pub mod classifier;
pub mod config;
pub mod erc20;
pub mod monitor;
pub mod network;
pub mod query;
pub mod repository;
pub mod risk;
pub mod rpc;
pub mod supervisor;
pub mod tracker;
