use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Health and demographic fields owned by the backend.
///
/// Every field is optional and free-form. When sent as an update, absent
/// fields are left out of the request body entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_string_or_number"
    )]
    pub name: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_string_or_number"
    )]
    pub age: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_string_or_number"
    )]
    pub gender: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_string_or_number"
    )]
    pub blood_group: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_string_or_number"
    )]
    pub medical_history: Option<String>,
}

impl Profile {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.age.is_none()
            && self.gender.is_none()
            && self.blood_group.is_none()
            && self.medical_history.is_none()
    }

    /// Overwrite fields that are present in `update`, keep the rest.
    pub fn merge_from(&mut self, update: &Profile) {
        fn apply(target: &mut Option<String>, value: &Option<String>) {
            if let Some(v) = value {
                *target = Some(v.clone());
            }
        }

        apply(&mut self.name, &update.name);
        apply(&mut self.age, &update.age);
        apply(&mut self.gender, &update.gender);
        apply(&mut self.blood_group, &update.blood_group);
        apply(&mut self.medical_history, &update.medical_history);
    }

    /// (label, value) pairs in display order
    pub fn fields(&self) -> [(&'static str, Option<&str>); 5] {
        [
            ("Name", self.name.as_deref()),
            ("Age", self.age.as_deref()),
            ("Gender", self.gender.as_deref()),
            ("Blood group", self.blood_group.as_deref()),
            ("Medical history", self.medical_history.as_deref()),
        ]
    }
}

/// The user record cached alongside the session token.
///
/// Fields the client does not know about (including a database `_id`) are
/// kept in `extra` so a persist/restore cycle does not drop anything the
/// server sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct UserInfo {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_string_or_number"
    )]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(flatten)]
    pub profile: Profile,
    #[serde(flatten)]
    #[cfg_attr(feature = "ts", ts(skip))]
    pub extra: Map<String, Value>,
}

/// Keys `UserInfo` decodes into its own fields
const KNOWN_FIELDS: [&str; 7] = [
    "id",
    "email",
    "name",
    "age",
    "gender",
    "bloodGroup",
    "medicalHistory",
];

impl UserInfo {
    pub fn with_email(email: &str) -> Self {
        Self {
            email: Some(email.to_string()),
            ..Self::default()
        }
    }

    /// Best-effort decode of a user record sent by the server.
    ///
    /// A record that does not fit the known fields still yields a user with
    /// whatever profile fields decode and the unknown entries in `extra`.
    /// Anything that is not a JSON object yields `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        let Value::Object(mut map) = value else {
            return None;
        };
        match serde_json::from_value(Value::Object(map.clone())) {
            Ok(user) => Some(user),
            Err(_) => {
                let profile =
                    serde_json::from_value(Value::Object(map.clone())).unwrap_or_default();
                map.retain(|key, _| !KNOWN_FIELDS.contains(&key.as_str()));
                Some(Self {
                    profile,
                    extra: map,
                    ..Self::default()
                })
            }
        }
    }

    /// Server-side identifier, from `id` or a database `_id`
    pub fn user_id(&self) -> Option<String> {
        if let Some(ref id) = self.id {
            return Some(id.clone());
        }
        match self.extra.get("_id")? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Name for greetings, falling back to the email address
    pub fn display_name(&self) -> &str {
        self.profile
            .name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or("there")
    }
}

/// Response from `GET /profile/get`
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub profile: Option<Profile>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Response from `POST /profile/update`
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

// Helper to deserialize string or number as Option<String>.
// The backend stores age as a number for some accounts and a string for others.
// Booleans become strings; nested objects and arrays are skipped as absent.
fn deserialize_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de;

    struct StringOrNumberVisitor;

    impl<'de> de::Visitor<'de> for StringOrNumberVisitor {
        type Value = Option<String>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a string or number")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E> {
            if v.is_empty() {
                Ok(None)
            } else {
                Ok(Some(v.to_string()))
            }
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_bool<E>(self, v: bool) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: de::SeqAccess<'de>,
        {
            while seq.next_element::<de::IgnoredAny>()?.is_some() {}
            Ok(None)
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: de::MapAccess<'de>,
        {
            while map.next_entry::<de::IgnoredAny, de::IgnoredAny>()?.is_some() {}
            Ok(None)
        }
    }

    deserializer.deserialize_any(StringOrNumberVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_accepts_numeric_age() {
        let profile: Profile = serde_json::from_str(r#"{"name": "Asha", "age": 30}"#)
            .expect("Failed to parse profile JSON");
        assert_eq!(profile.name.as_deref(), Some("Asha"));
        assert_eq!(profile.age.as_deref(), Some("30"));
        assert_eq!(profile.gender, None);
    }

    #[test]
    fn test_profile_empty_and_null_are_absent() {
        let profile: Profile =
            serde_json::from_str(r#"{"name": "", "bloodGroup": null, "medicalHistory": "Asthma"}"#)
                .expect("Failed to parse profile JSON");
        assert_eq!(profile.name, None);
        assert_eq!(profile.blood_group, None);
        assert_eq!(profile.medical_history.as_deref(), Some("Asthma"));
    }

    #[test]
    fn test_profile_serializes_only_present_fields() {
        let profile = Profile {
            name: Some("X".to_string()),
            blood_group: Some("O+".to_string()),
            ..Profile::default()
        };
        let json = serde_json::to_value(&profile).expect("serialize");
        assert_eq!(json, serde_json::json!({"name": "X", "bloodGroup": "O+"}));
    }

    #[test]
    fn test_merge_preserves_missing_fields() {
        let mut current = Profile {
            name: Some("A".to_string()),
            age: Some("30".to_string()),
            ..Profile::default()
        };
        current.merge_from(&Profile {
            name: Some("X".to_string()),
            ..Profile::default()
        });
        assert_eq!(current.name.as_deref(), Some("X"));
        assert_eq!(current.age.as_deref(), Some("30"));
    }

    #[test]
    fn test_user_info_keeps_unknown_fields() {
        let json = r#"{"_id": 42, "email": "a@b.com", "name": "A", "age": "30", "plan": "free"}"#;
        let user: UserInfo = serde_json::from_str(json).expect("Failed to parse user JSON");
        assert_eq!(user.id, None);
        assert_eq!(user.user_id().as_deref(), Some("42"));
        assert_eq!(user.email.as_deref(), Some("a@b.com"));
        assert_eq!(user.profile.name.as_deref(), Some("A"));
        assert_eq!(user.profile.age.as_deref(), Some("30"));
        assert_eq!(user.extra.get("plan"), Some(&Value::String("free".to_string())));
        assert!(!user.extra.contains_key("name"));

        let stored = serde_json::to_string(&user).expect("serialize");
        let round: UserInfo = serde_json::from_str(&stored).expect("reparse");
        assert_eq!(round, user);
    }

    #[test]
    fn test_user_info_with_id_and_database_id() {
        let value = serde_json::json!({"id": "1", "_id": "abc", "name": "A"});
        let user = UserInfo::from_value(value).expect("object decodes");
        assert_eq!(user.user_id().as_deref(), Some("1"));
        assert_eq!(user.extra.get("_id"), Some(&Value::String("abc".to_string())));
        assert_eq!(user.profile.name.as_deref(), Some("A"));
    }

    #[test]
    fn test_user_info_odd_field_shapes() {
        let value = serde_json::json!({"name": {"first": "A"}, "age": true, "tags": ["x"]});
        let user = UserInfo::from_value(value).expect("object decodes");
        assert_eq!(user.profile.name, None);
        assert_eq!(user.profile.age.as_deref(), Some("true"));
        assert!(user.extra.contains_key("tags"));
    }

    #[test]
    fn test_user_info_from_value_falls_back_to_extra() {
        let value = serde_json::json!({"email": 7, "name": "A", "plan": "free"});
        let user = UserInfo::from_value(value).expect("object decodes");
        assert_eq!(user.email, None);
        assert_eq!(user.profile.name.as_deref(), Some("A"));
        assert_eq!(user.extra.get("plan"), Some(&Value::String("free".to_string())));
        assert!(!user.extra.contains_key("email"));

        assert_eq!(UserInfo::from_value(Value::Bool(true)), None);
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut user = UserInfo::with_email("a@b.com");
        assert_eq!(user.display_name(), "a@b.com");
        user.profile.name = Some("Asha".to_string());
        assert_eq!(user.display_name(), "Asha");
        assert_eq!(UserInfo::default().display_name(), "there");
    }
}
