use crate::terminal::colors;
use camfleet_common::deployment::DeploymentResult;
use camfleet_common::device::{Classification, DiscoveredDevice};
use camfleet_protocols::apps::InstalledApp;
use colored::*;

pub fn classification(class: &Classification) -> ColoredString {
    match class {
        Classification::Confirmed => class.label().color(colors::CONFIRMED).bold(),
        Classification::Rejected { reason } => {
            format!("{} ({reason})", class.label()).color(colors::REJECTED)
        }
        Classification::RequiresAuth { reason } => {
            format!("{} ({reason})", class.label()).color(colors::REQUIRES_AUTH)
        }
        Classification::Candidate => class.label().color(colors::CANDIDATE),
    }
}

fn optional(value: &Option<String>) -> ColoredString {
    match value {
        Some(v) => v.as_str().color(colors::TEXT_DEFAULT),
        None => "-".color(colors::SEPARATOR),
    }
}

pub fn device_to_key_value_pair(device: &DiscoveredDevice) -> Vec<(String, ColoredString)> {
    let mut pairs = vec![
        (String::from("State"), classification(&device.classification)),
        (String::from("Port"), device.port.to_string().color(colors::TEXT_DEFAULT)),
        (String::from("Vendor"), optional(&device.manufacturer)),
        (String::from("Model"), optional(&device.model)),
        (String::from("Type"), optional(&device.product_type)),
    ];

    let identity = &device.identity;
    for (key, value) in [
        ("Serial", &identity.serial),
        ("MAC", &identity.mac),
        ("Firmware", &identity.firmware),
        ("Host", &identity.hostname),
    ] {
        if let Some(value) = value {
            pairs.push((String::from(key), value.as_str().color(colors::TEXT_DEFAULT)));
        }
    }

    if !device.capabilities.is_empty() {
        let caps: Vec<String> = device.capabilities.iter().map(|c| c.to_string()).collect();
        pairs.push((String::from("Features"), caps.join(", ").color(colors::ACCENT)));
    }
    if let Some(server) = &device.server_header {
        pairs.push((String::from("Server"), server.as_str().color(colors::SEPARATOR)));
    }
    pairs
}

pub fn app_to_key_value_pair(app: &InstalledApp) -> Vec<(String, ColoredString)> {
    let status = match app.status.as_deref() {
        Some("Running") => "Running".color(colors::CONFIRMED),
        Some(other) => other.color(colors::REQUIRES_AUTH),
        None => "-".color(colors::SEPARATOR),
    };
    vec![
        (String::from("Title"), optional(&app.nice_name)),
        (String::from("Version"), optional(&app.version)),
        (String::from("Status"), status),
    ]
}

pub fn result_to_key_value_pair(result: &DeploymentResult) -> Vec<(String, ColoredString)> {
    match result {
        DeploymentResult::Success { version, warning } => {
            let mut pairs = vec![
                (String::from("Result"), "deployed".color(colors::CONFIRMED).bold()),
                (String::from("Version"), version.as_str().color(colors::TEXT_DEFAULT)),
            ];
            if let Some(warning) = warning {
                pairs.push((String::from("Warning"), warning.as_str().color(colors::REQUIRES_AUTH)));
            }
            pairs
        }
        DeploymentResult::Failure { stage, step, reason } => {
            let at = match step {
                Some(step) => format!("{stage} / {step}"),
                None => stage.to_string(),
            };
            vec![
                (String::from("Result"), "failed".color(colors::REJECTED).bold()),
                (String::from("Stage"), at.color(colors::ACCENT)),
                (String::from("Reason"), reason.as_str().color(colors::REJECTED)),
            ]
        }
    }
}
