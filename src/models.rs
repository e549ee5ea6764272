//! Data models for Medora.
//!
//! Records are stored relationally but cross-reference each other through
//! weak identifier fields (`assigned_doctor`, `emergency_case_id`) that are
//! resolved by lookup, never held as live handles. Ward and bed identifiers
//! are normalized to `i64` at this boundary so mismatched string/numeric
//! representations cannot silently miss an occupancy lookup.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Roles recognized by the login protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Pharmacy,
    Doctor,
    Nurse,
    Patient,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Pharmacy => "pharmacy",
            Role::Doctor => "doctor",
            Role::Nurse => "nurse",
            Role::Patient => "patient",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(Role::Admin),
            "pharmacy" => Some(Role::Pharmacy),
            "doctor" => Some(Role::Doctor),
            "nurse" => Some(Role::Nurse),
            "patient" => Some(Role::Patient),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Staff availability status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaffStatus {
    Active,
    Inactive,
    Unavailable,
}

impl StaffStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StaffStatus::Active => "active",
            StaffStatus::Inactive => "inactive",
            StaffStatus::Unavailable => "unavailable",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(StaffStatus::Active),
            "inactive" => Some(StaffStatus::Inactive),
            "unavailable" => Some(StaffStatus::Unavailable),
            _ => None,
        }
    }
}

/// Patient lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatientStatus {
    Registered,
    Admitted,
    Discharged,
}

impl PatientStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PatientStatus::Registered => "registered",
            PatientStatus::Admitted => "admitted",
            PatientStatus::Discharged => "discharged",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "registered" => Some(PatientStatus::Registered),
            "admitted" => Some(PatientStatus::Admitted),
            "discharged" => Some(PatientStatus::Discharged),
            _ => None,
        }
    }
}

/// How a patient entered the hospital.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdmissionType {
    #[serde(rename = "OPD")]
    Opd,
    #[serde(rename = "IPD")]
    Ipd,
    #[serde(rename = "emergency")]
    Emergency,
}

impl AdmissionType {
    pub fn as_str(self) -> &'static str {
        match self {
            AdmissionType::Opd => "OPD",
            AdmissionType::Ipd => "IPD",
            AdmissionType::Emergency => "emergency",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "OPD" => Some(AdmissionType::Opd),
            "IPD" => Some(AdmissionType::Ipd),
            "emergency" => Some(AdmissionType::Emergency),
            _ => None,
        }
    }
}

/// Appointment lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Approved,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Approved => "approved",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(AppointmentStatus::Pending),
            "approved" => Some(AppointmentStatus::Approved),
            "cancelled" => Some(AppointmentStatus::Cancelled),
            "completed" => Some(AppointmentStatus::Completed),
            _ => None,
        }
    }

    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// `pending` may become `approved` or `cancelled`; `approved` may become
    /// `completed` or `cancelled`. Nothing leaves `cancelled` or `completed`.
    pub fn can_transition_to(self, next: AppointmentStatus) -> bool {
        use AppointmentStatus::*;
        matches!(
            (self, next),
            (Pending, Approved) | (Pending, Cancelled) | (Approved, Completed) | (Approved, Cancelled)
        )
    }
}

/// Triage priority of an emergency case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CasePriority {
    Low,
    Medium,
    High,
    Critical,
}

impl CasePriority {
    pub fn as_str(self) -> &'static str {
        match self {
            CasePriority::Low => "low",
            CasePriority::Medium => "medium",
            CasePriority::High => "high",
            CasePriority::Critical => "critical",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(CasePriority::Low),
            "medium" => Some(CasePriority::Medium),
            "high" => Some(CasePriority::High),
            "critical" => Some(CasePriority::Critical),
            _ => None,
        }
    }
}

/// Contact details nested inside a patient record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

/// Insurance details nested inside a patient record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insurance {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub policy_number: Option<String>,
}

/// A generic user account (admin or pharmacy roles).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    #[serde(rename = "_id", serialize_with = "id_string")]
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing)]
    pub password: String,
}

/// A staff member (doctor or nurse).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffMember {
    #[serde(rename = "_id", serialize_with = "id_string")]
    pub id: i64,
    pub name: String,
    pub role: Role,
    pub department: Option<String>,
    pub specialization: Option<String>,
    pub qualifications: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: StaffStatus,
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

/// A patient record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    #[serde(rename = "_id", serialize_with = "id_string")]
    pub id: i64,
    pub patient_id: String,
    pub name: String,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub blood_group: Option<String>,
    #[serde(rename = "type")]
    pub kind: AdmissionType,
    pub medical_specialty: Option<String>,
    pub description: Option<String>,
    pub status: PatientStatus,
    /// Top-level login email; patients may instead carry one nested in
    /// [`Contact`], and the login protocol matches either.
    pub email: Option<String>,
    pub contact: Contact,
    pub insurance: Insurance,
    #[serde(serialize_with = "opt_id_string")]
    pub assigned_doctor: Option<i64>,
    #[serde(serialize_with = "opt_id_string")]
    pub emergency_case_id: Option<i64>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

/// A patient occupying a ward/bed slot. Active while `discharged_at` is
/// unset; at most one active admission may hold a given slot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Admission {
    #[serde(rename = "_id", serialize_with = "id_string")]
    pub id: i64,
    #[serde(serialize_with = "id_string")]
    pub patient_id: i64,
    pub ward_number: i64,
    pub bed_number: i64,
    pub admitted_at: String,
    #[serde(serialize_with = "opt_id_string")]
    pub assigned_doctor: Option<i64>,
    #[serde(rename = "type")]
    pub kind: AdmissionType,
    pub discharged_at: Option<String>,
}

/// An appointment between a patient and a doctor.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    #[serde(rename = "_id", serialize_with = "id_string")]
    pub id: i64,
    pub patient_id: String,
    #[serde(serialize_with = "id_string")]
    pub doctor_id: i64,
    pub date: String,
    pub description: String,
    pub notes: String,
    pub status: AppointmentStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// A single prescribed medicine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medicine {
    pub name: String,
    #[serde(default)]
    pub dosage: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
}

/// One entry of a patient's append-only prescription sequence.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionEntry {
    #[serde(rename = "_id")]
    pub id: String,
    pub date: String,
    pub medicines: Vec<Medicine>,
}

/// One entry of a patient's append-only lab-report sequence. `file` is an
/// opaque reference into the external blob store.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabReportEntry {
    #[serde(rename = "_id")]
    pub id: String,
    pub date: String,
    pub test_name: String,
    pub results: String,
    pub file: String,
}

/// A standalone emergency case. Creating one also materializes a derived
/// patient admission, cross-linked through the case identifier.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyCase {
    #[serde(rename = "_id", serialize_with = "id_string")]
    pub id: i64,
    pub patient_name: String,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub condition: String,
    pub priority: CasePriority,
    pub description: String,
    pub ward: Option<i64>,
    pub bed_number: Option<i64>,
    #[serde(serialize_with = "opt_id_string")]
    pub assigned_doctor: Option<i64>,
    pub status: String,
    pub created_at: String,
}

/// A pharmacy stock item; feeds the dashboard inventory counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockItem {
    pub medicine_id: String,
    pub name: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub expiry_date: Option<String>,
}

/// Serializes an internal row id as an opaque string.
pub fn id_string<S>(id: &i64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&id.to_string())
}

/// Serializes an optional internal row id as an opaque string or null.
pub fn opt_id_string<S>(id: &Option<i64>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match id {
        Some(id) => serializer.serialize_str(&id.to_string()),
        None => serializer.serialize_none(),
    }
}

/// Deserializers for fields that arrive as either JSON numbers or numeric
/// strings. Ward and bed identifiers go through here.
pub mod flex {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n
                .as_i64()
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom("expected an integer")),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| serde::de::Error::custom(format!("invalid numeric value: {s:?}"))),
            Some(other) => Err(serde::de::Error::custom(format!(
                "expected a number or numeric string, got {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, serde::Deserialize)]
    struct SlotPayload {
        #[serde(default, deserialize_with = "flex::opt_i64")]
        ward_number: Option<i64>,
        #[serde(default, deserialize_with = "flex::opt_i64")]
        bed_number: Option<i64>,
    }

    #[test]
    fn should_normalize_numeric_strings_and_numbers() {
        let payload: SlotPayload =
            serde_json::from_str(r#"{"ward_number": "2", "bed_number": 5}"#).unwrap();
        assert_eq!(payload.ward_number, Some(2));
        assert_eq!(payload.bed_number, Some(5));
    }

    #[test]
    fn should_treat_empty_and_missing_as_none() {
        let payload: SlotPayload = serde_json::from_str(r#"{"ward_number": ""}"#).unwrap();
        assert_eq!(payload.ward_number, None);
        assert_eq!(payload.bed_number, None);
    }

    #[test]
    fn should_reject_non_numeric_strings() {
        let payload: Result<SlotPayload, _> = serde_json::from_str(r#"{"ward_number": "two"}"#);
        assert!(payload.is_err());
    }

    #[test]
    fn should_allow_only_forward_appointment_transitions() {
        use AppointmentStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Approved.can_transition_to(Completed));
        assert!(Approved.can_transition_to(Cancelled));

        assert!(!Pending.can_transition_to(Completed));
        assert!(!Cancelled.can_transition_to(Approved));
        assert!(!Completed.can_transition_to(Pending));
        assert!(!Approved.can_transition_to(Pending));
    }

    #[test]
    fn should_round_trip_role_names() {
        for role in [Role::Admin, Role::Pharmacy, Role::Doctor, Role::Nurse, Role::Patient] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("janitor"), None);
    }
}
