pub mod ssdp;

pub use ssdp::SsdpScanner;
