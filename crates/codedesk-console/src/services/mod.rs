//! Remote collaborators and the paged data source built on them.

pub mod api;
pub mod datasource;
