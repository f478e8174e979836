//! A simulated fleet of cameras behind the [`DeviceTransport`] port.
//!
//! Every device checks digest credentials itself, keeps its own installed-application
//! list and records the management calls it served. Faults and per-request latency can be
//! injected per device.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use camfleet_common::config::ApiPaths;
use camfleet_core::transport::{
    DeviceRequest, DeviceResponse, DeviceTransport, Method, RequestBody, TransportError,
};
use md5::{Digest, Md5};

pub const REALM: &str = "AXIS_SIMULATED";
pub const NONCE: &str = "0a4f113b1d4c9e";
pub const PASSWORD: &str = "pass";

/// Ways a device misbehaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Control calls with this `action=` are refused in the reply body.
    RefuseAction(&'static str),
    /// The upload never completes.
    UploadTimeout,
    /// Parameter updates answer HTTP 500.
    ConfigureError,
}

#[derive(Debug, Clone)]
pub struct SimDevice {
    pub brand: String,
    pub model: String,
    pub product_type: String,
    pub password: String,
    pub serial: String,
    pub firmware: String,
    /// Installed applications as `(name, version)`.
    pub installed: Vec<(String, String)>,
    pub faults: Vec<Fault>,
    pub latency: Duration,
    staged: Option<String>,
}

impl SimDevice {
    pub fn camera(model: &str) -> Self {
        Self {
            brand: "AXIS".into(),
            model: model.into(),
            product_type: "Network Camera".into(),
            password: PASSWORD.into(),
            serial: "ACCC8E000000".into(),
            firmware: "11.8.64".into(),
            installed: Vec::new(),
            faults: Vec::new(),
            latency: Duration::ZERO,
            staged: None,
        }
    }

    pub fn speaker() -> Self {
        Self {
            product_type: "Network Speaker".into(),
            ..Self::camera("C1310-E")
        }
    }

    pub fn foreign(brand: &str) -> Self {
        Self {
            brand: brand.into(),
            ..Self::camera("DS-2CD2143")
        }
    }

    pub fn with_app(mut self, name: &str, version: &str) -> Self {
        self.installed.push((name.into(), version.into()));
        self
    }

    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.faults.push(fault);
        self
    }

    pub fn with_password(mut self, password: &str) -> Self {
        self.password = password.into();
        self
    }

    pub fn with_serial(mut self, serial: &str) -> Self {
        self.serial = serial.into();
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

/// One management call a device accepted, e.g. `("stop", "app")`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Served {
    pub address: IpAddr,
    pub operation: String,
    pub argument: String,
}

#[derive(Default)]
pub struct SimFleet {
    devices: Mutex<HashMap<IpAddr, SimDevice>>,
    paths: ApiPaths,
    served: Mutex<Vec<Served>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl SimFleet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(self, address: IpAddr, device: SimDevice) -> Self {
        self.lock_devices().insert(address, device);
        self
    }

    /// Calls a device accepted, in the order it accepted them.
    pub fn served(&self, address: IpAddr) -> Vec<(String, String)> {
        self.lock_served()
            .iter()
            .filter(|s| s.address == address)
            .map(|s| (s.operation.clone(), s.argument.clone()))
            .collect()
    }

    pub fn installed(&self, address: IpAddr) -> Vec<(String, String)> {
        self.lock_devices()
            .get(&address)
            .map(|d| d.installed.clone())
            .unwrap_or_default()
    }

    /// Highest number of requests the fleet handled at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn lock_devices(&self) -> std::sync::MutexGuard<'_, HashMap<IpAddr, SimDevice>> {
        match self.devices.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lock_served(&self) -> std::sync::MutexGuard<'_, Vec<Served>> {
        match self.served.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn record(&self, address: IpAddr, operation: &str, argument: &str) {
        self.lock_served().push(Served {
            address,
            operation: operation.into(),
            argument: argument.into(),
        });
    }

    fn handle(&self, request: &DeviceRequest) -> Result<DeviceResponse, TransportError> {
        let address = request.endpoint.ip();
        let mut devices = self.lock_devices();
        let Some(device) = devices.get_mut(&address) else {
            return Err(TransportError::Connect("connection refused".into()));
        };

        if request.path == self.paths.device_info && request.authorization.is_none() {
            return Ok(DeviceResponse {
                server: Some("Apache".into()),
                ..challenge()
            });
        }
        let Some(authorization) = &request.authorization else {
            return Ok(challenge());
        };
        if !verify(authorization, request, &device.password) {
            return Ok(challenge());
        }

        let path = request.path.as_str();
        if path == self.paths.device_info {
            return Ok(DeviceResponse::new(
                200,
                format!(
                    "SerialNumber={}\nMacAddress={}\nVersion={}\nHostName=axis-{}\n",
                    device.serial,
                    mac_of(&device.serial),
                    device.firmware,
                    device.serial.to_ascii_lowercase()
                ),
            ));
        }
        if path == self.paths.brand_query() {
            return Ok(DeviceResponse::new(
                200,
                format!(
                    "root.Brand.Brand={}\nroot.Brand.ProdNbr={}\nroot.Brand.ProdType={}\n",
                    device.brand, device.model, device.product_type
                ),
            ));
        }
        if path == self.paths.properties_query() {
            return Ok(DeviceResponse::new(
                200,
                "root.Properties.PTZ.PTZ=no\nroot.Properties.Motion.Motion=yes\n",
            ));
        }
        if path == self.paths.app_list {
            let apps: String = device
                .installed
                .iter()
                .map(|(name, version)| {
                    format!("<application Name=\"{name}\" Version=\"{version}\" Status=\"Running\"/>")
                })
                .collect();
            return Ok(DeviceResponse::new(200, format!("<reply result=\"ok\">{apps}</reply>")));
        }
        if path == self.paths.app_upload {
            if device.faults.contains(&Fault::UploadTimeout) {
                return Err(TransportError::Timeout);
            }
            let RequestBody::Multipart { file_name, .. } = &request.body else {
                return Ok(DeviceResponse::new(400, "Error: no package"));
            };
            device.staged = Some(file_name.clone());
            drop(devices);
            self.record(address, "upload", file_name);
            return Ok(DeviceResponse::new(200, "OK"));
        }
        if path == self.paths.app_control {
            let package = request.form_value("package").unwrap_or_default().to_string();
            let action = request.form_value("action").unwrap_or_default().to_string();
            let refused = device
                .faults
                .iter()
                .any(|fault| matches!(fault, Fault::RefuseAction(a) if *a == action));
            if refused {
                return Ok(DeviceResponse::new(200, format!("Error: {action} refused")));
            }
            match action.as_str() {
                "remove" => device.installed.retain(|(name, _)| *name != package),
                "install" => {
                    let staged = device.staged.take().unwrap_or_default();
                    device.installed.push((package.clone(), staged));
                }
                _ => {}
            }
            drop(devices);
            self.record(address, &action, &package);
            return Ok(DeviceResponse::new(200, "OK"));
        }
        if path == self.paths.params && request.method == Method::Post {
            if device.faults.contains(&Fault::ConfigureError) {
                return Ok(DeviceResponse::new(500, "internal error"));
            }
            drop(devices);
            self.record(address, "configure", request.form_value("action").unwrap_or_default());
            return Ok(DeviceResponse::new(200, "OK"));
        }

        Ok(DeviceResponse::new(404, "not found"))
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DeviceTransport for SimFleet {
    async fn is_reachable(&self, addr: SocketAddr, _timeout: Duration) -> bool {
        self.lock_devices().contains_key(&addr.ip())
    }

    async fn execute(&self, request: DeviceRequest) -> Result<DeviceResponse, TransportError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let latency = self
            .lock_devices()
            .get(&request.endpoint.ip())
            .map(|d| d.latency)
            .unwrap_or_default();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.handle(&request)
    }
}

/// `ACCC8E000001` becomes `AC:CC:8E:00:00:01`.
fn mac_of(serial: &str) -> String {
    serial
        .as_bytes()
        .chunks(2)
        .map(|pair| String::from_utf8_lossy(pair).into_owned())
        .collect::<Vec<_>>()
        .join(":")
}

fn challenge() -> DeviceResponse {
    DeviceResponse {
        status: 401,
        www_authenticate: vec![format!(
            "Digest realm=\"{REALM}\", nonce=\"{NONCE}\", algorithm=MD5, qop=\"auth\""
        )],
        ..DeviceResponse::default()
    }
}

fn md5_hex(input: &str) -> String {
    hex::encode(Md5::digest(input.as_bytes()))
}

/// Server-side check of a `qop=auth` MD5 digest response.
fn verify(authorization: &str, request: &DeviceRequest, password: &str) -> bool {
    let Some(params) = authorization.strip_prefix("Digest ") else {
        return false;
    };
    let fields = parse_fields(params);
    let get = |key: &str| fields.get(key).map(String::as_str).unwrap_or_default();

    if get("nonce") != NONCE || get("realm") != REALM || get("uri") != request.path {
        return false;
    }
    let ha1 = md5_hex(&format!("{}:{REALM}:{password}", get("username")));
    let ha2 = md5_hex(&format!("{}:{}", request.method.as_str(), request.path));
    let expected = md5_hex(&format!(
        "{ha1}:{NONCE}:{}:{}:{}:{ha2}",
        get("nc"),
        get("cnonce"),
        get("qop")
    ));
    get("response") == expected
}

fn parse_fields(params: &str) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    let mut rest = params.trim();
    while !rest.is_empty() {
        let Some((key, after)) = rest.split_once('=') else {
            break;
        };
        let key = key.trim().trim_start_matches(',').trim().to_string();
        let (value, remaining) = if let Some(quoted) = after.strip_prefix('"') {
            match quoted.find('"') {
                Some(end) => (&quoted[..end], &quoted[end + 1..]),
                None => (quoted, ""),
            }
        } else {
            match after.find(',') {
                Some(end) => (&after[..end], &after[end..]),
                None => (after, ""),
            }
        };
        fields.insert(key, value.trim().to_string());
        rest = remaining.trim_start_matches(',').trim();
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use camfleet_protocols::digest::{Challenge, DigestClient};

    #[test]
    fn accepts_what_the_client_computes() {
        let mut client = DigestClient::new();
        client.accept(Challenge::parse(&challenge().www_authenticate[0]).unwrap());

        let endpoint: SocketAddr = "10.0.0.1:80".parse().unwrap();
        let request = DeviceRequest::get(
            endpoint,
            "/axis-cgi/param.cgi?action=list&group=Brand",
            Duration::from_secs(1),
        );
        let auth = client.authorize("GET", &request.path, "root", PASSWORD).unwrap();

        assert!(verify(&auth, &request, PASSWORD));
        assert!(!verify(&auth, &request, "other"));
    }
}
