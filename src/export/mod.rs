pub mod confirm;
pub mod data;
pub mod ddl;
pub mod exporter;
pub mod report;
pub mod resolver;
pub mod type_mapper;
