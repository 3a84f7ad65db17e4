//! Tethys Store - SPARQL-backed target store
//!
//! This crate implements the store traits of `tethys-core` against a
//! SPARQL 1.1 endpoint.
//!
//! # Overview
//!
//! The main components are:
//! - [`SparqlClient`] - Query and update requests over HTTP
//! - [`TaskRepository`] - Sync task records ([`tethys_core::TaskQueue`])
//! - [`FileRepository`] - Logical and physical file records ([`tethys_core::FileRegistry`])
//! - [`GraphRepository`] - Statement inserts and deletes ([`tethys_core::GraphStore`])

mod file_repository;
mod graph_repository;
pub mod sparql;
mod task_repository;

pub use file_repository::FileRepository;
pub use graph_repository::GraphRepository;
pub use sparql::SparqlClient;
pub use task_repository::TaskRepository;
