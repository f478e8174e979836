//! Wire-level codecs for the camera management protocol.
//!
//! * [`digest`]: challenge-response authentication.
//! * [`params`]: `key=value` parameter listings.
//! * [`apps`]: installed-application listings and control replies.
//! * [`mdns`]: DNS-SD browse queries and announcements.

pub mod apps;
pub mod digest;
pub mod mdns;
pub mod params;
