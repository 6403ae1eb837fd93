pub mod access;
pub mod db;
pub mod export;
pub mod ipc;
pub mod rollup;
pub mod store;
