//! HTTP clients for the metric and log backends.

mod influx;
mod search;

pub use influx::InfluxReader;
pub use search::EsSearchClient;
