//! Installed-application listings and control replies of the application CGI.
//!
//! Devices answer `list.cgi` with one element (or line) per application carrying
//! `Name=...` attributes, e.g.
//! `<application Name="vmd" NiceName="Motion Guard" Version="4.2-1" Status="Running"/>`.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledApp {
    pub name: String,
    pub nice_name: Option<String>,
    pub version: Option<String>,
    pub status: Option<String>,
}

/// Parses every application entry out of a listing.
pub fn parse_installed(body: &str) -> Vec<InstalledApp> {
    let records: Vec<&str> = if body.contains('<') {
        body.split('<').collect()
    } else {
        body.lines().collect()
    };

    records
        .into_iter()
        .filter_map(|record| {
            let attrs = attributes(record);
            let lookup = |key: &str| {
                attrs
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(key))
                    .map(|(_, v)| v.clone())
            };
            let name = lookup("Name").filter(|n| !n.is_empty())?;
            Some(InstalledApp {
                name,
                nice_name: lookup("NiceName"),
                version: lookup("Version"),
                status: lookup("Status"),
            })
        })
        .collect()
}

/// Outcome of a control or upload call, judged from the reply body.
pub fn reply_error(body: &str) -> Option<String> {
    let trimmed = body.trim();
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("error") || lower.contains("result=\"error\"") {
        Some(trimmed.to_string())
    } else {
        None
    }
}

/// Quote-aware `key=value` scanner for one element or line.
fn attributes(record: &str) -> Vec<(String, String)> {
    let mut attrs = Vec::new();
    let mut chars = record.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if !is_key_char(c) {
            chars.next();
            continue;
        }

        let mut end = start;
        while let Some(&(idx, c)) = chars.peek() {
            if !is_key_char(c) {
                break;
            }
            end = idx + c.len_utf8();
            chars.next();
        }
        let key = &record[start..end];

        if chars.peek().map(|&(_, c)| c) != Some('=') {
            continue;
        }
        chars.next();

        let value = match chars.peek().map(|&(_, c)| c) {
            Some(quote @ ('"' | '\'')) => {
                chars.next();
                let mut value = String::new();
                for (_, c) in chars.by_ref() {
                    if c == quote {
                        break;
                    }
                    value.push(c);
                }
                value
            }
            _ => {
                let mut value = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_whitespace() || c == '/' || c == '>' {
                        break;
                    }
                    value.push(c);
                    chars.next();
                }
                value
            }
        };
        attrs.push((key.to_string(), value));
    }

    attrs
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xml_listing_is_parsed() {
        let body = r#"<reply result="ok">
 <application Name="vmd" NiceName="AXIS Video Motion Detection" Vendor="Axis Communications" Version="4.2-1" Status="Running"/>
 <application Name="BatonAnalytic" NiceName="Baton" Version="1.0.3" Status="Stopped"/>
</reply>"#;
        let apps = parse_installed(body);
        assert_eq!(apps.len(), 2);
        assert_eq!(apps[0].name, "vmd");
        assert_eq!(apps[0].nice_name.as_deref(), Some("AXIS Video Motion Detection"));
        assert_eq!(apps[1].name, "BatonAnalytic");
        assert_eq!(apps[1].version.as_deref(), Some("1.0.3"));
        assert_eq!(apps[1].status.as_deref(), Some("Stopped"));
    }

    #[test]
    fn line_listing_is_parsed() {
        let apps = parse_installed("Name=alpha Version=1\nName=beta\n\n");
        let names: Vec<&str> = apps.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["alpha", "beta"]);
        assert_eq!(apps[0].version.as_deref(), Some("1"));
    }

    #[test]
    fn nice_name_is_not_mistaken_for_name() {
        let apps = parse_installed(r#"<application NiceName="Only nice"/>"#);
        assert!(apps.is_empty());
    }

    #[test]
    fn error_replies_are_detected() {
        assert_eq!(reply_error("OK"), None);
        assert_eq!(reply_error(" Error: 6\n"), Some("Error: 6".to_string()));
        assert!(reply_error(r#"<reply result="error"><error type="4"/></reply>"#).is_some());
    }
}
