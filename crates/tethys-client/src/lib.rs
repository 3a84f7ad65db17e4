//! Tethys Client - HTTP client for the upstream dataset catalog
//!
//! This crate provides [`CatalogHttpClient`], the JSON:API implementation of
//! [`tethys_core::CatalogClient`]. It lists datasets released after a
//! watermark, follows distribution and previous-version links, and downloads
//! distribution content.

pub mod catalog;

pub use catalog::CatalogHttpClient;
