pub mod blob_store;
pub mod connection;
pub mod job_repository;
pub mod memory;
pub mod migrations;
pub mod models;
