pub mod http;
pub mod mdns;
pub mod tcp;
