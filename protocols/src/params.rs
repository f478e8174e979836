//! Line-oriented `key=value` replies of the parameter CGI.
//!
//! Keys may arrive fully qualified (`root.Brand.ProdNbr=M3045-V`) or bare (`ProdNbr=M3045-V`).

use std::collections::BTreeMap;

/// A parsed parameter listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamList {
    entries: Vec<(String, String)>,
}

impl ParamList {
    pub fn parse(body: &str) -> Self {
        let entries = body
            .lines()
            .filter_map(|line| {
                let (key, value) = line.split_once('=')?;
                let key = key.trim();
                if key.is_empty() || key.contains(char::is_whitespace) {
                    return None;
                }
                Some((key.to_string(), value.trim().to_string()))
            })
            .collect();
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Looks a value up by the last dotted segment of its key, case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| leaf(key).eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Looks a value up by its exact key.
    pub fn get_exact(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Collects `Properties.<Feature>.<Feature>=yes` style flags into feature names.
    pub fn enabled_features(&self, group: &str) -> BTreeMap<String, bool> {
        let mut features = BTreeMap::new();
        for (key, value) in self.iter() {
            let mut segments = key.split('.').skip_while(|s| *s == "root");
            if segments.next() != Some(group) {
                continue;
            }
            let (Some(feature), Some(flag)) = (segments.next(), segments.next()) else {
                continue;
            };
            if segments.next().is_none() && flag == feature {
                features.insert(feature.to_string(), value.eq_ignore_ascii_case("yes"));
            }
        }
        features
    }
}

impl FromIterator<(String, String)> for ParamList {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

fn leaf(key: &str) -> &str {
    key.rsplit('.').next().unwrap_or(key)
}

/// Device fingerprint taken from the `Brand` parameter group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrandInfo {
    pub brand: String,
    pub model: String,
    pub product_type: Option<String>,
    pub full_name: Option<String>,
}

impl BrandInfo {
    /// Extracts brand, model and product type. Fails when `Brand` or `ProdNbr` is absent.
    pub fn from_params(params: &ParamList) -> Result<Self, &'static str> {
        let brand = params
            .get("Brand")
            .filter(|b| !b.is_empty())
            .ok_or("reply carries no Brand")?;
        let model = params
            .get("ProdNbr")
            .filter(|m| !m.is_empty())
            .ok_or("reply carries no ProdNbr")?;

        Ok(Self {
            brand: brand.to_string(),
            model: model.to_string(),
            product_type: params.get("ProdType").map(str::to_string),
            full_name: params.get("ProdFullName").map(str::to_string),
        })
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
