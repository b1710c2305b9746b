use serde::{Deserialize, Deserializer, Serialize};

/// An account target: `{id, name}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRef {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

impl AccountRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A permission-set target: `{id, name}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRef {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

impl PermissionRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// An organizational unit reference. Stored either as a bare id or as an
/// `{id, name}` object, depending on which admin flow wrote the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OuRef {
    Id(String),
    Unit {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

impl OuRef {
    pub fn id(&self) -> &str {
        match self {
            OuRef::Id(id) => id,
            OuRef::Unit { id, .. } => id,
        }
    }
}

/// An eligibility policy record attached to a user or group.
///
/// Two schemas coexist in the record store:
/// - current: `entityId` names the owning user/group, `id` is a record id;
/// - legacy: no `entityId`, the record's own `id` is the owner's id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityPolicy {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,

    #[serde(default)]
    pub accounts: Vec<AccountRef>,

    #[serde(default)]
    pub ous: Vec<OuRef>,

    #[serde(default)]
    pub permissions: Vec<PermissionRef>,

    #[serde(default = "default_approval_required")]
    pub approval_required: bool,

    /// Maximum elevation length, as a numeric string.
    #[serde(
        default,
        deserialize_with = "de_duration",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration: Option<String>,
}

fn default_approval_required() -> bool {
    true
}

impl EligibilityPolicy {
    /// The user or group this policy belongs to.
    pub fn owner(&self) -> &str {
        self.entity_id.as_deref().unwrap_or(&self.id)
    }

    /// Parse `duration`, treating an absent value as `"0"`.
    pub fn duration_value(&self) -> Result<i64, std::num::ParseIntError> {
        self.duration.as_deref().unwrap_or("0").trim().parse()
    }
}

/// Accept `"10"`, `10` or `10.0`; normalize to the string form.
fn de_duration<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    match raw {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                Ok(Some(i.to_string()))
            } else if let Some(f) = n.as_f64().filter(|f| f.fract() == 0.0) {
                Ok(Some(format!("{}", f as i64)))
            } else {
                Err(D::Error::custom(format!("duration must be a whole number, got {n}")))
            }
        }
        Some(other) => Err(D::Error::custom(format!(
            "duration must be a string or number, got {other}"
        ))),
    }
}
