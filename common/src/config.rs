use std::time::Duration;

/// Network deadlines applied to every device call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeouts {
    /// TCP reachability check per port.
    pub reach: Duration,
    /// Unauthenticated request to the management endpoint.
    pub probe: Duration,
    /// Authenticated management calls (parameter queries, list, control).
    pub management: Duration,
    /// Floor for package uploads.
    pub upload_floor: Duration,
    /// Assumed worst-case upload throughput, in bytes per second.
    pub upload_bytes_per_sec: u64,
    /// How long an mDNS browse collects answers.
    pub browse: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            reach: Duration::from_millis(1500),
            probe: Duration::from_secs(3),
            management: Duration::from_secs(8),
            upload_floor: Duration::from_secs(60),
            upload_bytes_per_sec: 128 * 1024,
            browse: Duration::from_secs(3),
        }
    }
}

impl Timeouts {
    /// `max(upload_floor, size / upload_bytes_per_sec)`.
    pub fn upload_for(&self, size: u64) -> Duration {
        let rate = self.upload_bytes_per_sec.max(1);
        let scaled = Duration::from_secs(size.div_ceil(rate));
        scaled.max(self.upload_floor)
    }
}

/// Management CGI paths on the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiPaths {
    pub device_info: String,
    pub params: String,
    pub app_list: String,
    pub app_control: String,
    pub app_upload: String,
}

impl Default for ApiPaths {
    fn default() -> Self {
        Self {
            device_info: "/axis-cgi/basicdeviceinfo.cgi".to_string(),
            params: "/axis-cgi/param.cgi".to_string(),
            app_list: "/axis-cgi/applications/list.cgi".to_string(),
            app_control: "/axis-cgi/applications/control.cgi".to_string(),
            app_upload: "/axis-cgi/applications/upload.cgi".to_string(),
        }
    }
}

impl ApiPaths {
    pub fn brand_query(&self) -> String {
        self.param_group("Brand")
    }

    pub fn properties_query(&self) -> String {
        self.param_group("Properties")
    }

    fn param_group(&self, group: &str) -> String {
        format!("{}?action=list&group={group}", self.params)
    }
}

/// What makes a device eligible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorPolicy {
    /// Compared case-insensitively with the `Brand` parameter.
    pub expected_brand: String,
    /// Case-insensitive substrings of `ProdType` that disqualify a device.
    pub denied_product_tokens: Vec<String>,
}

impl Default for VendorPolicy {
    fn default() -> Self {
        Self {
            expected_brand: "AXIS".to_string(),
            denied_product_tokens: vec!["speaker".to_string(), "audio".to_string()],
        }
    }
}

impl VendorPolicy {
    pub fn brand_matches(&self, brand: &str) -> bool {
        brand.trim().eq_ignore_ascii_case(self.expected_brand.trim())
    }

    /// The first deny-listed token found in `product_type`, if any.
    pub fn denied_token(&self, product_type: &str) -> Option<&str> {
        let product_type = product_type.to_ascii_lowercase();
        self.denied_product_tokens
            .iter()
            .map(String::as_str)
            .filter(|token| !token.is_empty())
            .find(|token| product_type.contains(&token.to_ascii_lowercase()))
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub timeouts: Timeouts,
    pub paths: ApiPaths,
    pub vendor: VendorPolicy,
    /// Management ports tried in order during a sweep.
    pub ports: Vec<u16>,
    /// Addresses checked at once during a sweep.
    pub scan_concurrency: usize,
    /// DNS-SD service type cameras announce over mDNS.
    pub mdns_service: String,
    /// Suppresses decorative output.
    pub quiet: bool,
    /// Emits machine-readable output instead of trees and tables.
    pub json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeouts: Timeouts::default(),
            paths: ApiPaths::default(),
            vendor: VendorPolicy::default(),
            ports: vec![80, 443],
            scan_concurrency: 50,
            mdns_service: "_axis-video._tcp.local".to_string(),
            quiet: false,
            json: false,
        }
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
