//! Persistence layer for Medora.
//!
//! This module owns all database access. A [`Database`] wraps a single
//! SQLite connection and is handed to the services at construction; there
//! are no process-wide handles. It covers the identity store (users, staff,
//! patients), the care records (admissions, appointments, prescriptions,
//! lab reports, emergency cases), the ward topology and the pharmacy stock.
//!
//! Admission writes are the one correctness-sensitive path: the occupancy
//! check and the insert run inside a single transaction, and a partial
//! unique index on `(ward_number, bed_number) WHERE discharged_at IS NULL`
//! backstops the check against concurrent writers.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use bcrypt::{hash, DEFAULT_COST};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{
    Admission, AdmissionType, Appointment, AppointmentStatus, CasePriority, Contact,
    EmergencyCase, Insurance, LabReportEntry, Medicine, Patient, PatientStatus,
    PrescriptionEntry, Role, StaffMember, StaffStatus, StockItem, UserAccount,
};
use crate::occupancy::{AdmissionSlot, WardDef};

/// Stock quantities below this count as "low stock" on the dashboard.
const LOW_STOCK_THRESHOLD: i64 = 10;

/// Baseline ward topology seeded into an empty database.
const BASELINE_WARDS: [(&str, &str); 5] = [
    ("General Ward", "General"),
    ("Cardiology Ward", "Cardiology"),
    ("Neurology Ward", "Neurology"),
    ("Orthopedic Ward", "Orthopedics"),
    ("Maternity Ward", "Gynecology"),
];
const BASELINE_BEDS_PER_WARD: i64 = 10;

const PATIENT_COLUMNS: &str = "id, patient_id, name, age, gender, blood_group, type, \
     medical_specialty, description, status, email, contact_email, contact_phone, \
     contact_address, insurance_provider, insurance_policy_number, assigned_doctor, \
     emergency_case_id, password";

const STAFF_COLUMNS: &str =
    "id, name, role, department, specialization, qualifications, email, phone, status, password";

/// The record sets of the identity store, one per person kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSet {
    Users,
    Staff,
    Patients,
}

impl RecordSet {
    fn table(self) -> &'static str {
        match self {
            RecordSet::Users => "users",
            RecordSet::Staff => "staff",
            RecordSet::Patients => "patients",
        }
    }

    /// The record set the given role is stored in.
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Admin | Role::Pharmacy => RecordSet::Users,
            Role::Doctor | Role::Nurse => RecordSet::Staff,
            Role::Patient => RecordSet::Patients,
        }
    }
}

/// A person record located by the identity store during login.
#[derive(Debug, Clone)]
pub enum PersonRecord {
    User(UserAccount),
    Staff(StaffMember),
    Patient(Patient),
}

impl PersonRecord {
    pub fn id(&self) -> i64 {
        match self {
            PersonRecord::User(u) => u.id,
            PersonRecord::Staff(s) => s.id,
            PersonRecord::Patient(p) => p.id,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            PersonRecord::User(u) => &u.name,
            PersonRecord::Staff(s) => &s.name,
            PersonRecord::Patient(p) => &p.name,
        }
    }

    /// The stored credential, if the record has one.
    pub fn stored_password(&self) -> Option<&str> {
        match self {
            PersonRecord::User(u) => Some(&u.password),
            PersonRecord::Staff(s) => s.password.as_deref(),
            PersonRecord::Patient(p) => p.password.as_deref(),
        }
    }

    /// The stored role; patients carry no role field and are inferred.
    pub fn role(&self) -> Role {
        match self {
            PersonRecord::User(u) => u.role,
            PersonRecord::Staff(s) => s.role,
            PersonRecord::Patient(_) => Role::Patient,
        }
    }
}

/// Input for creating a staff member.
#[derive(Debug, Clone)]
pub struct NewStaff {
    pub name: String,
    pub role: Role,
    pub department: Option<String>,
    pub specialization: Option<String>,
    pub qualifications: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
}

/// Partial staff update; unset fields keep their stored value.
#[derive(Debug, Clone, Default)]
pub struct StaffUpdate {
    pub name: Option<String>,
    pub department: Option<String>,
    pub specialization: Option<String>,
    pub qualifications: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: Option<StaffStatus>,
    pub password: Option<String>,
}

/// Input for registering a patient.
#[derive(Debug, Clone)]
pub struct NewPatient {
    pub name: String,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub blood_group: Option<String>,
    pub kind: AdmissionType,
    pub medical_specialty: Option<String>,
    pub description: Option<String>,
    pub contact: Contact,
    pub insurance: Insurance,
    pub assigned_doctor: Option<i64>,
    pub ward_number: Option<i64>,
    pub bed_number: Option<i64>,
    pub password: Option<String>,
}

/// Identifiers of a freshly registered patient.
#[derive(Debug, Clone)]
pub struct CreatedPatient {
    pub id: i64,
    pub patient_id: String,
}

/// Input for booking an appointment.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub patient_id: String,
    pub doctor_id: i64,
    pub date: String,
    pub description: String,
    pub notes: String,
}

/// A patient-facing appointment row with the doctor reference resolved.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentWithDoctor {
    #[serde(rename = "_id", serialize_with = "crate::models::id_string")]
    pub id: i64,
    pub doctor_name: String,
    pub department: String,
    pub date: String,
    pub description: String,
    pub status: AppointmentStatus,
    pub notes: String,
}

/// Input for opening an emergency case.
#[derive(Debug, Clone)]
pub struct NewEmergencyCase {
    pub patient_name: String,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub condition: String,
    pub priority: CasePriority,
    pub description: String,
    pub ward_number: Option<i64>,
    pub bed_number: Option<i64>,
    pub assigned_doctor: Option<i64>,
}

/// Identifiers produced by opening an emergency case.
#[derive(Debug, Clone)]
pub struct CreatedEmergencyCase {
    pub emergency_id: i64,
    pub patient_id: String,
}

/// An emergency case enriched for listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyCaseView {
    #[serde(flatten)]
    pub case: EmergencyCase,
    pub doctor_name: Option<String>,
    /// Whether the derived patient admission is still open.
    pub patient_admitted: bool,
}

/// A pharmacy-wide prescription row.
#[derive(Debug, Clone)]
pub struct PharmacyPrescription {
    pub patient_id: String,
    pub patient_name: String,
    pub doctor_name: Option<String>,
    pub prescription_number: i64,
    pub date: String,
    pub medicines: Vec<Medicine>,
    pub total_price: f64,
}

/// The persistence port. Owns the SQLite connection; every service that
/// needs storage receives a shared handle to one of these.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Opens (creating if necessary) the database at `path` and applies the
    /// schema, the baseline ward topology and the default admin account.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the schema cannot
    /// be executed.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;
        Self::initialize(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// An in-memory database for tests.
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::initialize(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Inserts a user account verbatim, without hashing the credential.
    /// Exists to set up legacy plaintext accounts in tests.
    #[cfg(test)]
    pub fn insert_user_raw(&self, name: &str, email: &str, role: &str, password: &str) -> i64 {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO users (name, email, role, password) VALUES (?, ?, ?, ?)",
            params![name, email, role, password],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    fn initialize(conn: &Connection) -> Result<()> {
        let schema = include_str!("schema.sql");
        conn.execute_batch(schema)
            .context("failed to execute schema")?;

        // Seed the baseline ward topology on first start.
        let wards: i64 = conn.query_row("SELECT COUNT(*) FROM wards", [], |row| row.get(0))?;
        if wards == 0 {
            for (idx, (name, specialty)) in BASELINE_WARDS.iter().enumerate() {
                conn.execute(
                    "INSERT INTO wards (ward_number, name, specialty, beds_total) VALUES (?, ?, ?, ?)",
                    params![idx as i64 + 1, name, specialty, BASELINE_BEDS_PER_WARD],
                )?;
            }
            tracing::info!(wards = BASELINE_WARDS.len(), "seeded baseline ward topology");
        }

        // Create a default admin account if no user exists yet.
        let users: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        if users == 0 {
            let hashed = hash("admin123", DEFAULT_COST).context("failed to hash password")?;
            conn.execute(
                "INSERT INTO users (name, email, role, password) VALUES (?, ?, ?, ?)",
                params!["System Administrator", "admin@medora.local", "admin", hashed],
            )?;
            tracing::info!("created default admin account");
        }

        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // Poisoned only if another holder panicked mid-operation.
        self.conn.lock().expect("database mutex poisoned")
    }

    // ---------- identity store ----------

    /// Looks up a generic user account by email.
    pub fn find_user_by_email(&self, email: &str) -> ApiResult<Option<UserAccount>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT id, name, email, role, password FROM users WHERE email = ?")?;
        let user = stmt.query_row(params![email], map_user).optional()?;
        Ok(user)
    }

    /// Looks up a staff member by email.
    pub fn find_staff_by_email(&self, email: &str) -> ApiResult<Option<StaffMember>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare(&format!("SELECT {STAFF_COLUMNS} FROM staff WHERE email = ?"))?;
        let staff = stmt.query_row(params![email], map_staff).optional()?;
        Ok(staff)
    }

    /// Looks up a patient by either the top-level or the nested contact
    /// email.
    pub fn find_patient_by_email(&self, email: &str) -> ApiResult<Option<Patient>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {PATIENT_COLUMNS} FROM patients WHERE email = ?1 OR contact_email = ?1"
        ))?;
        let patient = stmt.query_row(params![email], map_patient).optional()?;
        Ok(patient)
    }

    /// Whether a record with the given id still exists in the set. Used to
    /// confirm token subjects on protected requests.
    pub fn record_exists(&self, set: RecordSet, id: i64) -> ApiResult<bool> {
        let conn = self.conn();
        let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?)", set.table());
        let exists: i64 = conn.query_row(&sql, params![id], |row| row.get(0))?;
        Ok(exists == 1)
    }

    /// Replaces a stored credential with a bcrypt hash of `password`. Used
    /// to upgrade legacy plaintext accounts on their first login.
    pub fn rehash_credential(&self, set: RecordSet, id: i64, password: &str) -> ApiResult<()> {
        let hashed = hash(password, DEFAULT_COST)
            .map_err(|e| ApiError::Internal(anyhow::Error::new(e).context("password hashing failed")))?;
        let conn = self.conn();
        let sql = format!("UPDATE {} SET password = ? WHERE id = ?", set.table());
        conn.execute(&sql, params![hashed, id])?;
        Ok(())
    }

    // ---------- staff ----------

    /// Creates a new staff member, hashing the password if one is given.
    pub fn create_staff(&self, staff: &NewStaff) -> ApiResult<i64> {
        let hashed = match &staff.password {
            Some(password) => Some(hash(password, DEFAULT_COST).map_err(|e| {
                ApiError::Internal(anyhow::Error::new(e).context("password hashing failed"))
            })?),
            None => None,
        };
        let conn = self.conn();
        conn.execute(
            "INSERT INTO staff (name, role, department, specialization, qualifications, email, phone, status, password) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                staff.name,
                staff.role.as_str(),
                staff.department,
                staff.specialization,
                staff.qualifications,
                staff.email,
                staff.phone,
                StaffStatus::Active.as_str(),
                hashed,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn list_staff(&self) -> ApiResult<Vec<StaffMember>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("SELECT {STAFF_COLUMNS} FROM staff ORDER BY id"))?;
        let rows = stmt.query_map([], map_staff)?;
        let mut staff = Vec::new();
        for member in rows {
            staff.push(member?);
        }
        Ok(staff)
    }

    pub fn get_staff(&self, id: i64) -> ApiResult<StaffMember> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("SELECT {STAFF_COLUMNS} FROM staff WHERE id = ?"))?;
        let staff = stmt.query_row(params![id], map_staff).optional()?;
        staff.ok_or_else(|| ApiError::NotFound("Staff not found".to_string()))
    }

    /// Applies a partial update to a staff member. A provided password is
    /// re-hashed before storage.
    pub fn update_staff(&self, id: i64, update: &StaffUpdate) -> ApiResult<StaffMember> {
        let existing = self.get_staff(id)?;
        let hashed = match &update.password {
            Some(password) => Some(hash(password, DEFAULT_COST).map_err(|e| {
                ApiError::Internal(anyhow::Error::new(e).context("password hashing failed"))
            })?),
            None => existing.password.clone(),
        };
        let conn = self.conn();
        conn.execute(
            "UPDATE staff SET name = ?, department = ?, specialization = ?, qualifications = ?, \
             email = ?, phone = ?, status = ?, password = ? WHERE id = ?",
            params![
                update.name.clone().unwrap_or(existing.name),
                update.department.clone().or(existing.department),
                update.specialization.clone().or(existing.specialization),
                update.qualifications.clone().or(existing.qualifications),
                update.email.clone().or(existing.email),
                update.phone.clone().or(existing.phone),
                update.status.unwrap_or(existing.status).as_str(),
                hashed,
                id,
            ],
        )?;
        drop(conn);
        self.get_staff(id)
    }

    pub fn delete_staff(&self, id: i64) -> ApiResult<()> {
        let conn = self.conn();
        let deleted = conn.execute("DELETE FROM staff WHERE id = ?", params![id])?;
        if deleted == 0 {
            return Err(ApiError::NotFound("Staff not found".to_string()));
        }
        Ok(())
    }

    pub fn set_staff_status(&self, id: i64, status: StaffStatus) -> ApiResult<()> {
        let conn = self.conn();
        let updated = conn.execute(
            "UPDATE staff SET status = ? WHERE id = ?",
            params![status.as_str(), id],
        )?;
        if updated == 0 {
            return Err(ApiError::NotFound("Staff not found".to_string()));
        }
        Ok(())
    }

    /// Active doctors, optionally narrowed to a department/specialty.
    pub fn available_doctors(&self, specialty: Option<&str>) -> ApiResult<Vec<StaffMember>> {
        let conn = self.conn();
        let mut doctors = Vec::new();
        match specialty {
            Some(specialty) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {STAFF_COLUMNS} FROM staff \
                     WHERE role = 'doctor' AND status = 'active' AND department = ? ORDER BY id"
                ))?;
                let rows = stmt.query_map(params![specialty], map_staff)?;
                for doctor in rows {
                    doctors.push(doctor?);
                }
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {STAFF_COLUMNS} FROM staff \
                     WHERE role = 'doctor' AND status = 'active' ORDER BY id"
                ))?;
                let rows = stmt.query_map([], map_staff)?;
                for doctor in rows {
                    doctors.push(doctor?);
                }
            }
        }
        Ok(doctors)
    }

    /// Fetches a staff member only if they are a doctor.
    pub fn get_doctor(&self, id: i64) -> ApiResult<Option<StaffMember>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {STAFF_COLUMNS} FROM staff WHERE id = ? AND role = 'doctor'"
        ))?;
        let doctor = stmt.query_row(params![id], map_staff).optional()?;
        Ok(doctor)
    }

    /// Resolves a doctor reference to a display name, if it points at an
    /// existing staff member.
    pub fn doctor_name(&self, id: i64) -> ApiResult<Option<String>> {
        let conn = self.conn();
        let name = conn
            .query_row("SELECT name FROM staff WHERE id = ?", params![id], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(name)
    }

    /// Distinct staff departments.
    pub fn departments(&self) -> ApiResult<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT department FROM staff \
             WHERE department IS NOT NULL AND department != '' ORDER BY department",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut departments = Vec::new();
        for department in rows {
            departments.push(department?);
        }
        Ok(departments)
    }

    // ---------- patients & admissions ----------

    /// Registers a patient. IPD patients with a ward/bed assignment are
    /// admitted in the same transaction: the slot is checked for an active
    /// occupant and the admission inserted as one atomic unit, so two
    /// concurrent requests for the same bed cannot both succeed. An
    /// assigned doctor on an IPD admission is marked unavailable (there is
    /// no automatic reversal on discharge).
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the target bed already holds an active
    /// admission.
    pub fn create_patient(&self, new: &NewPatient) -> ApiResult<CreatedPatient> {
        let hashed = match &new.password {
            Some(password) => Some(hash(password, DEFAULT_COST).map_err(|e| {
                ApiError::Internal(anyhow::Error::new(e).context("password hashing failed"))
            })?),
            None => None,
        };

        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let status = match new.kind {
            AdmissionType::Ipd => PatientStatus::Admitted,
            AdmissionType::Opd | AdmissionType::Emergency => PatientStatus::Registered,
        };
        let patient_id = format!("P-{}", short_code(8));

        tx.execute(
            "INSERT INTO patients (patient_id, name, age, gender, blood_group, type, \
             medical_specialty, description, status, email, contact_email, contact_phone, \
             contact_address, insurance_provider, insurance_policy_number, assigned_doctor, password) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                patient_id,
                new.name,
                new.age,
                new.gender,
                new.blood_group,
                new.kind.as_str(),
                new.medical_specialty,
                new.description,
                status.as_str(),
                new.contact.email,
                new.contact.email,
                new.contact.phone,
                new.contact.address,
                new.insurance.provider,
                new.insurance.policy_number,
                new.assigned_doctor,
                hashed,
            ],
        )?;
        let rowid = tx.last_insert_rowid();

        if new.kind == AdmissionType::Ipd {
            if let (Some(ward), Some(bed)) = (new.ward_number, new.bed_number) {
                ensure_slot_free(&tx, ward, bed)?;
                tx.execute(
                    "INSERT INTO admissions (patient_id, ward_number, bed_number, admitted_at, assigned_doctor, type) \
                     VALUES (?, ?, ?, ?, ?, ?)",
                    params![rowid, ward, bed, now_timestamp(), new.assigned_doctor, new.kind.as_str()],
                )?;
            }
            if let Some(doctor) = new.assigned_doctor {
                tx.execute(
                    "UPDATE staff SET status = 'unavailable' WHERE id = ?",
                    params![doctor],
                )?;
            }
        }

        tx.commit()?;
        Ok(CreatedPatient {
            id: rowid,
            patient_id,
        })
    }

    pub fn list_patients(&self) -> ApiResult<Vec<(Patient, Option<String>)>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {PATIENT_COLUMNS}, (SELECT name FROM staff WHERE staff.id = patients.assigned_doctor) \
             FROM patients ORDER BY id"
        ))?;
        let rows = stmt.query_map([], |row| {
            let patient = map_patient(row)?;
            let doctor_name: Option<String> = row.get(19)?;
            Ok((patient, doctor_name))
        })?;
        let mut patients = Vec::new();
        for patient in rows {
            patients.push(patient?);
        }
        Ok(patients)
    }

    /// Fetches a patient by their public business identifier.
    pub fn get_patient(&self, patient_id: &str) -> ApiResult<Option<Patient>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {PATIENT_COLUMNS} FROM patients WHERE patient_id = ?"
        ))?;
        let patient = stmt.query_row(params![patient_id], map_patient).optional()?;
        Ok(patient)
    }

    pub fn patients_by_doctor(&self, doctor_id: i64) -> ApiResult<Vec<Patient>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {PATIENT_COLUMNS} FROM patients WHERE assigned_doctor = ? ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![doctor_id], map_patient)?;
        let mut patients = Vec::new();
        for patient in rows {
            patients.push(patient?);
        }
        Ok(patients)
    }

    /// Updates a patient's lifecycle status. A transition to `discharged`
    /// closes any active admission and the linked emergency case in the
    /// same transaction.
    pub fn set_patient_status(&self, patient_id: &str, status: PatientStatus) -> ApiResult<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let row: Option<(i64, Option<i64>)> = tx
            .query_row(
                "SELECT id, emergency_case_id FROM patients WHERE patient_id = ?",
                params![patient_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let (rowid, emergency_case_id) =
            row.ok_or_else(|| ApiError::NotFound("Patient not found".to_string()))?;

        tx.execute(
            "UPDATE patients SET status = ? WHERE id = ?",
            params![status.as_str(), rowid],
        )?;

        if status == PatientStatus::Discharged {
            tx.execute(
                "UPDATE admissions SET discharged_at = ? WHERE patient_id = ? AND discharged_at IS NULL",
                params![now_timestamp(), rowid],
            )?;
            if let Some(case_id) = emergency_case_id {
                tx.execute(
                    "UPDATE emergency_cases SET status = 'closed' WHERE id = ?",
                    params![case_id],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// The open admission of a patient, if any.
    pub fn active_admission_for_patient(&self, patient_rowid: i64) -> ApiResult<Option<Admission>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, patient_id, ward_number, bed_number, admitted_at, assigned_doctor, type, discharged_at \
             FROM admissions WHERE patient_id = ? AND discharged_at IS NULL",
        )?;
        let admission = stmt
            .query_row(params![patient_rowid], map_admission)
            .optional()?;
        Ok(admission)
    }

    /// Snapshot of every active admission, joined with its patient, as
    /// input for the occupancy engine.
    pub fn active_admissions(&self) -> ApiResult<Vec<AdmissionSlot>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT a.ward_number, a.bed_number, a.admitted_at, p.name, p.age, p.gender, \
             p.medical_specialty, a.assigned_doctor \
             FROM admissions a JOIN patients p ON p.id = a.patient_id \
             WHERE a.discharged_at IS NULL",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(AdmissionSlot {
                ward_number: row.get(0)?,
                bed_number: row.get(1)?,
                admitted_at: row.get(2)?,
                patient_name: row.get(3)?,
                age: row.get(4)?,
                gender: row.get(5)?,
                diagnosis: row.get(6)?,
                assigned_doctor: row.get(7)?,
            })
        })?;
        let mut slots = Vec::new();
        for slot in rows {
            slots.push(slot?);
        }
        Ok(slots)
    }

    pub fn active_admission_count(&self) -> ApiResult<i64> {
        self.count("SELECT COUNT(*) FROM admissions WHERE discharged_at IS NULL")
    }

    /// The ward topology, in ward order.
    pub fn list_wards(&self) -> ApiResult<Vec<WardDef>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, ward_number, name, specialty, beds_total FROM wards ORDER BY ward_number",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(WardDef {
                id: row.get(0)?,
                ward_number: row.get(1)?,
                name: row.get(2)?,
                specialty: row.get(3)?,
                beds_total: row.get(4)?,
            })
        })?;
        let mut wards = Vec::new();
        for ward in rows {
            wards.push(ward?);
        }
        Ok(wards)
    }

    pub fn total_beds(&self) -> ApiResult<i64> {
        let conn = self.conn();
        let total: Option<i64> =
            conn.query_row("SELECT SUM(beds_total) FROM wards", [], |row| row.get(0))?;
        Ok(total.unwrap_or(0))
    }

    // ---------- appointments ----------

    /// Books an appointment. The doctor reference must resolve to an
    /// existing doctor.
    pub fn create_appointment(&self, new: &NewAppointment) -> ApiResult<Appointment> {
        if self.get_doctor(new.doctor_id)?.is_none() {
            return Err(ApiError::NotFound("Doctor not found".to_string()));
        }
        let now = now_timestamp();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO appointments (patient_id, doctor_id, date, description, notes, status, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                new.patient_id,
                new.doctor_id,
                new.date,
                new.description,
                new.notes,
                AppointmentStatus::Pending.as_str(),
                now,
                now,
            ],
        )?;
        let id = conn.last_insert_rowid();
        Ok(Appointment {
            id,
            patient_id: new.patient_id.clone(),
            doctor_id: new.doctor_id,
            date: new.date.clone(),
            description: new.description.clone(),
            notes: new.notes.clone(),
            status: AppointmentStatus::Pending,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    pub fn appointments_for_patient(&self, patient_id: &str) -> ApiResult<Vec<AppointmentWithDoctor>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT ap.id, s.name, s.department, ap.date, ap.description, ap.status, ap.notes \
             FROM appointments ap LEFT JOIN staff s ON s.id = ap.doctor_id \
             WHERE ap.patient_id = ? ORDER BY ap.id",
        )?;
        let rows = stmt.query_map(params![patient_id], |row| {
            Ok(AppointmentWithDoctor {
                id: row.get(0)?,
                doctor_name: row
                    .get::<_, Option<String>>(1)?
                    .unwrap_or_else(|| "Unknown".to_string()),
                department: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                date: row.get(3)?,
                description: row.get(4)?,
                status: parse_appointment_status(row, 5)?,
                notes: row.get(6)?,
            })
        })?;
        let mut appointments = Vec::new();
        for appointment in rows {
            appointments.push(appointment?);
        }
        Ok(appointments)
    }

    pub fn appointments_for_doctor(&self, doctor_id: i64) -> ApiResult<Vec<Appointment>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, patient_id, doctor_id, date, description, notes, status, created_at, updated_at \
             FROM appointments WHERE doctor_id = ? ORDER BY id",
        )?;
        let rows = stmt.query_map(params![doctor_id], map_appointment)?;
        let mut appointments = Vec::new();
        for appointment in rows {
            appointments.push(appointment?);
        }
        Ok(appointments)
    }

    /// Moves an appointment through its state machine.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the transition is not allowed from the
    /// current status, `NotFound` if the appointment does not exist.
    pub fn update_appointment_status(
        &self,
        id: i64,
        next: AppointmentStatus,
    ) -> ApiResult<Appointment> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, patient_id, doctor_id, date, description, notes, status, created_at, updated_at \
             FROM appointments WHERE id = ?",
        )?;
        let appointment = stmt
            .query_row(params![id], map_appointment)
            .optional()?
            .ok_or_else(|| ApiError::NotFound("Appointment not found".to_string()))?;

        if !appointment.status.can_transition_to(next) {
            return Err(ApiError::Validation(format!(
                "Invalid status transition: {} -> {}",
                appointment.status.as_str(),
                next.as_str()
            )));
        }

        let now = now_timestamp();
        conn.execute(
            "UPDATE appointments SET status = ?, updated_at = ? WHERE id = ?",
            params![next.as_str(), now, id],
        )?;

        Ok(Appointment {
            status: next,
            updated_at: now,
            ..appointment
        })
    }

    // ---------- prescriptions & lab reports ----------

    fn patient_rowid(conn: &Connection, patient_id: &str) -> ApiResult<i64> {
        let rowid: Option<i64> = conn
            .query_row(
                "SELECT id FROM patients WHERE patient_id = ?",
                params![patient_id],
                |row| row.get(0),
            )
            .optional()?;
        rowid.ok_or_else(|| ApiError::NotFound("Patient not found".to_string()))
    }

    /// Appends a prescription entry to a patient's sequence. Entries get a
    /// fresh unique identifier and are never mutated afterwards.
    pub fn add_prescription(
        &self,
        patient_id: &str,
        date: &str,
        medicines: &[Medicine],
    ) -> ApiResult<PrescriptionEntry> {
        let conn = self.conn();
        let rowid = Self::patient_rowid(&conn, patient_id)?;
        let entry = PrescriptionEntry {
            id: Uuid::new_v4().to_string(),
            date: date.to_string(),
            medicines: medicines.to_vec(),
        };
        let medicines_json = serde_json::to_string(&entry.medicines)
            .map_err(|e| ApiError::Internal(e.into()))?;
        conn.execute(
            "INSERT INTO prescriptions (id, patient_id, date, medicines) VALUES (?, ?, ?, ?)",
            params![entry.id, rowid, entry.date, medicines_json],
        )?;
        Ok(entry)
    }

    /// A patient's prescription sequence in append order.
    pub fn prescriptions_for_patient(&self, patient_id: &str) -> ApiResult<Vec<PrescriptionEntry>> {
        let conn = self.conn();
        let rowid = Self::patient_rowid(&conn, patient_id)?;
        let mut stmt = conn.prepare(
            "SELECT id, date, medicines FROM prescriptions WHERE patient_id = ? ORDER BY rowid",
        )?;
        let rows = stmt.query_map(params![rowid], |row| {
            Ok(PrescriptionEntry {
                id: row.get(0)?,
                date: row.get(1)?,
                medicines: parse_medicines(row, 2)?,
            })
        })?;
        let mut entries = Vec::new();
        for entry in rows {
            entries.push(entry?);
        }
        Ok(entries)
    }

    /// Every prescription across all patients, with the prescribing
    /// doctor's name and a total price from the stock list. Pharmacy view.
    pub fn all_prescriptions(&self) -> ApiResult<Vec<PharmacyPrescription>> {
        let conn = self.conn();

        let mut price_stmt = conn.prepare("SELECT name, price FROM stock WHERE price IS NOT NULL")?;
        let price_rows = price_stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
        })?;
        let mut prices: HashMap<String, f64> = HashMap::new();
        for row in price_rows {
            let (name, price) = row?;
            prices.insert(name, price);
        }

        let mut stmt = conn.prepare(
            "SELECT p.patient_id, p.name, pr.date, pr.medicines, \
             (SELECT name FROM staff WHERE staff.id = p.assigned_doctor) \
             FROM prescriptions pr JOIN patients p ON p.id = pr.patient_id \
             ORDER BY p.id, pr.rowid",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                parse_medicines(row, 3)?,
                row.get::<_, Option<String>>(4)?,
            ))
        })?;

        let mut result: Vec<PharmacyPrescription> = Vec::new();
        let mut per_patient: HashMap<String, i64> = HashMap::new();
        for row in rows {
            let (patient_id, patient_name, date, medicines, doctor_name) = row?;
            let number = per_patient.entry(patient_id.clone()).or_insert(0);
            *number += 1;
            let total_price = medicines
                .iter()
                .map(|m| prices.get(&m.name).copied().unwrap_or(0.0))
                .sum();
            result.push(PharmacyPrescription {
                patient_id,
                patient_name,
                doctor_name,
                prescription_number: *number,
                date,
                medicines,
                total_price,
            });
        }
        Ok(result)
    }

    /// Appends a lab-report entry to a patient's sequence. `file` is the
    /// opaque reference handed back by the blob store.
    pub fn add_lab_report(
        &self,
        patient_id: &str,
        date: &str,
        test_name: &str,
        results: &str,
        file: &str,
    ) -> ApiResult<LabReportEntry> {
        let conn = self.conn();
        let rowid = Self::patient_rowid(&conn, patient_id)?;
        let entry = LabReportEntry {
            id: Uuid::new_v4().to_string(),
            date: date.to_string(),
            test_name: test_name.to_string(),
            results: results.to_string(),
            file: file.to_string(),
        };
        conn.execute(
            "INSERT INTO lab_reports (id, patient_id, date, test_name, results, file) \
             VALUES (?, ?, ?, ?, ?, ?)",
            params![entry.id, rowid, entry.date, entry.test_name, entry.results, entry.file],
        )?;
        Ok(entry)
    }

    pub fn lab_reports_for_patient(&self, patient_id: &str) -> ApiResult<Vec<LabReportEntry>> {
        let conn = self.conn();
        let rowid = Self::patient_rowid(&conn, patient_id)?;
        let mut stmt = conn.prepare(
            "SELECT id, date, test_name, results, file FROM lab_reports \
             WHERE patient_id = ? ORDER BY rowid",
        )?;
        let rows = stmt.query_map(params![rowid], |row| {
            Ok(LabReportEntry {
                id: row.get(0)?,
                date: row.get(1)?,
                test_name: row.get(2)?,
                results: row.get(3)?,
                file: row.get(4)?,
            })
        })?;
        let mut entries = Vec::new();
        for entry in rows {
            entries.push(entry?);
        }
        Ok(entries)
    }

    // ---------- emergency cases ----------

    /// Opens an emergency case and materializes the derived patient
    /// admission in the same transaction: case record, patient record
    /// (cross-linked through the case id), admission for the requested
    /// slot, and the doctor-unavailable side effect all commit or roll
    /// back together.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the assigned doctor does not resolve to an
    /// existing doctor, `Conflict` if the requested bed is occupied.
    pub fn create_emergency_case(
        &self,
        new: &NewEmergencyCase,
    ) -> ApiResult<CreatedEmergencyCase> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Some(doctor) = new.assigned_doctor {
            let exists: i64 = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM staff WHERE id = ? AND role = 'doctor')",
                params![doctor],
                |row| row.get(0),
            )?;
            if exists == 0 {
                return Err(ApiError::NotFound("Doctor not found".to_string()));
            }
        }

        if let (Some(ward), Some(bed)) = (new.ward_number, new.bed_number) {
            ensure_slot_free(&tx, ward, bed)?;
        }

        let now = now_timestamp();
        tx.execute(
            "INSERT INTO emergency_cases (patient_name, age, gender, condition, priority, description, \
             ward_number, bed_number, assigned_doctor, status, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 'active', ?)",
            params![
                new.patient_name,
                new.age,
                new.gender,
                new.condition,
                new.priority.as_str(),
                new.description,
                new.ward_number,
                new.bed_number,
                new.assigned_doctor,
                now,
            ],
        )?;
        let emergency_id = tx.last_insert_rowid();

        let patient_id = format!("EM-{}-{}", date_stamp(), short_code(4));
        tx.execute(
            "INSERT INTO patients (patient_id, name, age, gender, type, medical_specialty, \
             status, assigned_doctor, emergency_case_id) \
             VALUES (?, ?, ?, ?, 'emergency', ?, 'admitted', ?, ?)",
            params![
                patient_id,
                new.patient_name,
                new.age,
                new.gender,
                new.condition,
                new.assigned_doctor,
                emergency_id,
            ],
        )?;
        let patient_rowid = tx.last_insert_rowid();

        if let (Some(ward), Some(bed)) = (new.ward_number, new.bed_number) {
            tx.execute(
                "INSERT INTO admissions (patient_id, ward_number, bed_number, admitted_at, assigned_doctor, type) \
                 VALUES (?, ?, ?, ?, ?, 'emergency')",
                params![patient_rowid, ward, bed, now, new.assigned_doctor],
            )?;
        }

        if let Some(doctor) = new.assigned_doctor {
            tx.execute(
                "UPDATE staff SET status = 'unavailable' WHERE id = ?",
                params![doctor],
            )?;
        }

        tx.commit()?;
        Ok(CreatedEmergencyCase {
            emergency_id,
            patient_id,
        })
    }

    /// Emergency cases, newest first, enriched with the doctor's name and
    /// whether the derived patient admission is still open.
    pub fn list_emergency_cases(&self, status: Option<&str>) -> ApiResult<Vec<EmergencyCaseView>> {
        let conn = self.conn();
        let base = "SELECT id, patient_name, age, gender, condition, priority, description, \
                    ward_number, bed_number, assigned_doctor, status, created_at FROM emergency_cases";
        let mut cases = Vec::new();
        match status {
            Some(status) => {
                let mut stmt =
                    conn.prepare(&format!("{base} WHERE status = ? ORDER BY created_at DESC"))?;
                let rows = stmt.query_map(params![status], map_emergency_case)?;
                for case in rows {
                    cases.push(case?);
                }
            }
            None => {
                let mut stmt = conn.prepare(&format!("{base} ORDER BY created_at DESC"))?;
                let rows = stmt.query_map([], map_emergency_case)?;
                for case in rows {
                    cases.push(case?);
                }
            }
        }

        let mut views = Vec::new();
        for case in cases {
            let doctor_name = match case.assigned_doctor {
                Some(id) => conn
                    .query_row("SELECT name FROM staff WHERE id = ?", params![id], |row| {
                        row.get(0)
                    })
                    .optional()?,
                None => None,
            };
            let patient_admitted: i64 = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM patients WHERE emergency_case_id = ? AND status = 'admitted')",
                params![case.id],
                |row| row.get(0),
            )?;
            views.push(EmergencyCaseView {
                case,
                doctor_name,
                patient_admitted: patient_admitted == 1,
            });
        }
        Ok(views)
    }

    // ---------- pharmacy stock ----------

    pub fn list_stock(&self) -> ApiResult<Vec<StockItem>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT medicine_id, name, sku, type, manufacturer, price, quantity, expiry_date \
             FROM stock ORDER BY id",
        )?;
        let rows = stmt.query_map([], map_stock_item)?;
        let mut items = Vec::new();
        for item in rows {
            items.push(item?);
        }
        Ok(items)
    }

    pub fn add_stock(&self, item: &StockItem) -> ApiResult<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO stock (medicine_id, name, sku, type, manufacturer, price, quantity, expiry_date) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                item.medicine_id,
                item.name,
                item.sku,
                item.kind,
                item.manufacturer,
                item.price,
                item.quantity,
                item.expiry_date,
            ],
        )?;
        Ok(())
    }

    pub fn update_stock(&self, item: &StockItem) -> ApiResult<()> {
        let conn = self.conn();
        let updated = conn.execute(
            "UPDATE stock SET name = ?, sku = ?, type = ?, manufacturer = ?, price = ?, \
             quantity = ?, expiry_date = ? WHERE medicine_id = ?",
            params![
                item.name,
                item.sku,
                item.kind,
                item.manufacturer,
                item.price,
                item.quantity,
                item.expiry_date,
                item.medicine_id,
            ],
        )?;
        if updated == 0 {
            return Err(ApiError::NotFound("No stock item found".to_string()));
        }
        Ok(())
    }

    pub fn delete_stock(&self, medicine_id: &str) -> ApiResult<()> {
        let conn = self.conn();
        let deleted = conn.execute("DELETE FROM stock WHERE medicine_id = ?", params![medicine_id])?;
        if deleted == 0 {
            return Err(ApiError::NotFound("No stock item found".to_string()));
        }
        Ok(())
    }

    // ---------- dashboard counters ----------

    fn count(&self, sql: &str) -> ApiResult<i64> {
        let conn = self.conn();
        let count: i64 = conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn count_patients(&self) -> ApiResult<i64> {
        self.count("SELECT COUNT(*) FROM patients")
    }

    pub fn count_patients_with_status(&self, status: PatientStatus) -> ApiResult<i64> {
        let conn = self.conn();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM patients WHERE status = ?",
            params![status.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn count_staff(&self) -> ApiResult<i64> {
        self.count("SELECT COUNT(*) FROM staff")
    }

    pub fn count_staff_with_role(&self, role: Role) -> ApiResult<i64> {
        let conn = self.conn();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM staff WHERE role = ?",
            params![role.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn stock_item_count(&self) -> ApiResult<i64> {
        self.count("SELECT COUNT(*) FROM stock")
    }

    pub fn low_stock_count(&self) -> ApiResult<i64> {
        let conn = self.conn();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM stock WHERE quantity IS NOT NULL AND quantity < ?",
            params![LOW_STOCK_THRESHOLD],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn emergency_active_count(&self) -> ApiResult<i64> {
        self.count("SELECT COUNT(*) FROM emergency_cases WHERE status = 'active'")
    }

    pub fn emergency_critical_count(&self) -> ApiResult<i64> {
        self.count(
            "SELECT COUNT(*) FROM emergency_cases \
             WHERE status = 'active' AND priority IN ('high', 'critical')",
        )
    }
}

/// Rejects the insert if the slot already holds an active admission. Runs
/// inside the caller's transaction; the partial unique index on active
/// admissions backstops it against writers outside this process.
fn ensure_slot_free(conn: &Connection, ward: i64, bed: i64) -> ApiResult<()> {
    let occupied: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM admissions \
         WHERE ward_number = ? AND bed_number = ? AND discharged_at IS NULL)",
        params![ward, bed],
        |row| row.get(0),
    )?;
    if occupied == 1 {
        return Err(ApiError::Conflict("Bed is already occupied".to_string()));
    }
    Ok(())
}

fn now_timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        // A current UTC timestamp always formats as RFC 3339.
        .expect("RFC 3339 formatting")
}

fn date_stamp() -> String {
    let format = format_description!("[year][month][day]");
    OffsetDateTime::now_utc()
        .format(&format)
        .expect("date formatting")
}

fn short_code(len: usize) -> String {
    let mut code = Uuid::new_v4().simple().to_string();
    code.truncate(len);
    code
}

fn invalid_column<T>(index: usize, what: &str) -> rusqlite::Result<T> {
    Err(rusqlite::Error::InvalidColumnType(
        index,
        format!("Invalid {what} value"),
        rusqlite::types::Type::Text,
    ))
}

fn map_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserAccount> {
    Ok(UserAccount {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        role: match Role::parse(&row.get::<_, String>(3)?) {
            Some(role) => role,
            None => return invalid_column(3, "role"),
        },
        password: row.get(4)?,
    })
}

fn map_staff(row: &rusqlite::Row<'_>) -> rusqlite::Result<StaffMember> {
    Ok(StaffMember {
        id: row.get(0)?,
        name: row.get(1)?,
        role: match Role::parse(&row.get::<_, String>(2)?) {
            Some(role) => role,
            None => return invalid_column(2, "role"),
        },
        department: row.get(3)?,
        specialization: row.get(4)?,
        qualifications: row.get(5)?,
        email: row.get(6)?,
        phone: row.get(7)?,
        status: match StaffStatus::parse(&row.get::<_, String>(8)?) {
            Some(status) => status,
            None => return invalid_column(8, "status"),
        },
        password: row.get(9)?,
    })
}

fn map_patient(row: &rusqlite::Row<'_>) -> rusqlite::Result<Patient> {
    Ok(Patient {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        name: row.get(2)?,
        age: row.get(3)?,
        gender: row.get(4)?,
        blood_group: row.get(5)?,
        kind: match AdmissionType::parse(&row.get::<_, String>(6)?) {
            Some(kind) => kind,
            None => return invalid_column(6, "type"),
        },
        medical_specialty: row.get(7)?,
        description: row.get(8)?,
        status: match PatientStatus::parse(&row.get::<_, String>(9)?) {
            Some(status) => status,
            None => return invalid_column(9, "status"),
        },
        email: row.get(10)?,
        contact: Contact {
            email: row.get(11)?,
            phone: row.get(12)?,
            address: row.get(13)?,
        },
        insurance: Insurance {
            provider: row.get(14)?,
            policy_number: row.get(15)?,
        },
        assigned_doctor: row.get(16)?,
        emergency_case_id: row.get(17)?,
        password: row.get(18)?,
    })
}

fn map_admission(row: &rusqlite::Row<'_>) -> rusqlite::Result<Admission> {
    Ok(Admission {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        ward_number: row.get(2)?,
        bed_number: row.get(3)?,
        admitted_at: row.get(4)?,
        assigned_doctor: row.get(5)?,
        kind: match AdmissionType::parse(&row.get::<_, String>(6)?) {
            Some(kind) => kind,
            None => return invalid_column(6, "type"),
        },
        discharged_at: row.get(7)?,
    })
}

fn map_appointment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Appointment> {
    Ok(Appointment {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        doctor_id: row.get(2)?,
        date: row.get(3)?,
        description: row.get(4)?,
        notes: row.get(5)?,
        status: parse_appointment_status(row, 6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn parse_appointment_status(
    row: &rusqlite::Row<'_>,
    index: usize,
) -> rusqlite::Result<AppointmentStatus> {
    match AppointmentStatus::parse(&row.get::<_, String>(index)?) {
        Some(status) => Ok(status),
        None => invalid_column(index, "status"),
    }
}

fn parse_medicines(row: &rusqlite::Row<'_>, index: usize) -> rusqlite::Result<Vec<Medicine>> {
    let json: String = row.get(index)?;
    match serde_json::from_str(&json) {
        Ok(medicines) => Ok(medicines),
        Err(_) => invalid_column(index, "medicines"),
    }
}

fn map_emergency_case(row: &rusqlite::Row<'_>) -> rusqlite::Result<EmergencyCase> {
    Ok(EmergencyCase {
        id: row.get(0)?,
        patient_name: row.get(1)?,
        age: row.get(2)?,
        gender: row.get(3)?,
        condition: row.get(4)?,
        priority: match CasePriority::parse(&row.get::<_, String>(5)?) {
            Some(priority) => priority,
            None => return invalid_column(5, "priority"),
        },
        description: row.get(6)?,
        ward: row.get(7)?,
        bed_number: row.get(8)?,
        assigned_doctor: row.get(9)?,
        status: row.get(10)?,
        created_at: row.get(11)?,
    })
}

fn map_stock_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<StockItem> {
    Ok(StockItem {
        medicine_id: row.get(0)?,
        name: row.get(1)?,
        sku: row.get(2)?,
        kind: row.get(3)?,
        manufacturer: row.get(4)?,
        price: row.get(5)?,
        quantity: row.get(6)?,
        expiry_date: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn add_doctor(db: &Database, name: &str, department: &str) -> i64 {
        db.create_staff(&NewStaff {
            name: name.to_string(),
            role: Role::Doctor,
            department: Some(department.to_string()),
            specialization: None,
            qualifications: None,
            email: None,
            phone: None,
            password: None,
        })
        .unwrap()
    }

    fn ipd_patient(name: &str, doctor: Option<i64>, ward: i64, bed: i64) -> NewPatient {
        NewPatient {
            name: name.to_string(),
            age: Some(52),
            gender: Some("male".to_string()),
            blood_group: None,
            kind: AdmissionType::Ipd,
            medical_specialty: Some("Cardiology".to_string()),
            description: None,
            contact: Contact::default(),
            insurance: Insurance::default(),
            assigned_doctor: doctor,
            ward_number: Some(ward),
            bed_number: Some(bed),
            password: None,
        }
    }

    fn opd_patient(name: &str) -> NewPatient {
        NewPatient {
            name: name.to_string(),
            age: None,
            gender: None,
            blood_group: None,
            kind: AdmissionType::Opd,
            medical_specialty: None,
            description: None,
            contact: Contact::default(),
            insurance: Insurance::default(),
            assigned_doctor: None,
            ward_number: None,
            bed_number: None,
            password: None,
        }
    }

    #[test]
    fn should_seed_topology_and_default_admin() {
        let db = test_db();
        let wards = db.list_wards().unwrap();
        assert_eq!(wards.len(), 5);
        assert_eq!(db.total_beds().unwrap(), 50);
        assert!(db.find_user_by_email("admin@medora.local").unwrap().is_some());
    }

    #[test]
    fn should_reject_double_booking_of_a_bed() {
        let db = test_db();
        db.create_patient(&ipd_patient("First", None, 2, 5)).unwrap();

        let conflict = db.create_patient(&ipd_patient("Second", None, 2, 5));
        assert!(matches!(conflict, Err(ApiError::Conflict(_))));

        // The neighbouring bed is still free.
        db.create_patient(&ipd_patient("Third", None, 2, 6)).unwrap();
        assert_eq!(db.active_admission_count().unwrap(), 2);
    }

    #[test]
    fn should_mark_assigned_doctor_unavailable_on_ipd_admission() {
        let db = test_db();
        let doctor = add_doctor(&db, "Dr. Osei", "Cardiology");
        db.create_patient(&ipd_patient("Admitted", Some(doctor), 1, 1))
            .unwrap();
        assert_eq!(db.get_staff(doctor).unwrap().status, StaffStatus::Unavailable);
    }

    #[test]
    fn should_free_the_slot_after_discharge() {
        let db = test_db();
        let created = db.create_patient(&ipd_patient("Short stay", None, 3, 3)).unwrap();
        db.set_patient_status(&created.patient_id, PatientStatus::Discharged)
            .unwrap();

        // Slot can be taken again once the admission is closed.
        db.create_patient(&ipd_patient("Next", None, 3, 3)).unwrap();
        assert_eq!(db.active_admission_count().unwrap(), 1);
    }

    #[test]
    fn should_append_prescriptions_in_order_with_distinct_ids() {
        let db = test_db();
        let created = db.create_patient(&opd_patient("Outpatient")).unwrap();

        let first = db
            .add_prescription(
                &created.patient_id,
                "2025-02-01",
                &[Medicine {
                    name: "Paracetamol".to_string(),
                    dosage: Some("500mg".to_string()),
                    time: Some("morning".to_string()),
                }],
            )
            .unwrap();
        let second = db
            .add_prescription(
                &created.patient_id,
                "2025-02-08",
                &[Medicine {
                    name: "Ibuprofen".to_string(),
                    dosage: None,
                    time: None,
                }],
            )
            .unwrap();

        let entries = db.prescriptions_for_patient(&created.patient_id).unwrap();
        assert_eq!(entries.len(), 2);
        assert_ne!(entries[0].id, entries[1].id);
        assert_eq!(entries[0].id, first.id);
        assert_eq!(entries[1].id, second.id);
        assert_eq!(entries[0].date, "2025-02-01");
    }

    #[test]
    fn should_reject_prescription_for_unknown_patient() {
        let db = test_db();
        let result = db.add_prescription("P-missing", "2025-02-01", &[]);
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[test]
    fn should_enforce_the_appointment_state_machine() {
        let db = test_db();
        let doctor = add_doctor(&db, "Dr. Lang", "Neurology");
        let created = db.create_patient(&opd_patient("Visitor")).unwrap();
        let appointment = db
            .create_appointment(&NewAppointment {
                patient_id: created.patient_id.clone(),
                doctor_id: doctor,
                date: "2025-03-01".to_string(),
                description: "follow-up".to_string(),
                notes: String::new(),
            })
            .unwrap();
        assert_eq!(appointment.status, AppointmentStatus::Pending);

        // pending -> completed skips approval and is rejected.
        let direct = db.update_appointment_status(appointment.id, AppointmentStatus::Completed);
        assert!(matches!(direct, Err(ApiError::Validation(_))));

        db.update_appointment_status(appointment.id, AppointmentStatus::Approved)
            .unwrap();
        let done = db
            .update_appointment_status(appointment.id, AppointmentStatus::Completed)
            .unwrap();
        assert_eq!(done.status, AppointmentStatus::Completed);

        // completed is terminal.
        let reopen = db.update_appointment_status(appointment.id, AppointmentStatus::Approved);
        assert!(matches!(reopen, Err(ApiError::Validation(_))));
    }

    #[test]
    fn should_reject_appointment_with_unknown_doctor() {
        let db = test_db();
        let created = db.create_patient(&opd_patient("Visitor")).unwrap();
        let result = db.create_appointment(&NewAppointment {
            patient_id: created.patient_id,
            doctor_id: 4242,
            date: "2025-03-01".to_string(),
            description: String::new(),
            notes: String::new(),
        });
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[test]
    fn should_create_emergency_case_with_derived_admission() {
        let db = test_db();
        let doctor = add_doctor(&db, "Dr. Iqbal", "General");

        let created = db
            .create_emergency_case(&NewEmergencyCase {
                patient_name: "Walk-in".to_string(),
                age: Some(37),
                gender: Some("female".to_string()),
                condition: "fracture".to_string(),
                priority: CasePriority::High,
                description: String::new(),
                ward_number: Some(4),
                bed_number: Some(2),
                assigned_doctor: Some(doctor),
            })
            .unwrap();
        assert!(created.patient_id.starts_with("EM-"));

        // The derived admission occupies the requested slot.
        let slots = db.active_admissions().unwrap();
        assert!(slots.iter().any(|s| s.ward_number == 4 && s.bed_number == 2));

        // Case listing reports the patient as still admitted.
        let cases = db.list_emergency_cases(None).unwrap();
        assert_eq!(cases.len(), 1);
        assert!(cases[0].patient_admitted);
        assert_eq!(cases[0].doctor_name.as_deref(), Some("Dr. Iqbal"));
        assert_eq!(db.get_staff(doctor).unwrap().status, StaffStatus::Unavailable);

        // Discharging the derived patient closes the case.
        db.set_patient_status(&created.patient_id, PatientStatus::Discharged)
            .unwrap();
        let cases = db.list_emergency_cases(None).unwrap();
        assert!(!cases[0].patient_admitted);
        assert_eq!(cases[0].case.status, "closed");
    }

    #[test]
    fn should_reject_emergency_case_on_occupied_bed() {
        let db = test_db();
        db.create_patient(&ipd_patient("Occupant", None, 1, 1)).unwrap();

        let result = db.create_emergency_case(&NewEmergencyCase {
            patient_name: "Walk-in".to_string(),
            age: None,
            gender: None,
            condition: "collapse".to_string(),
            priority: CasePriority::Critical,
            description: String::new(),
            ward_number: Some(1),
            bed_number: Some(1),
            assigned_doctor: None,
        });
        assert!(matches!(result, Err(ApiError::Conflict(_))));
        // Nothing was left behind by the rolled-back transaction.
        assert_eq!(db.list_emergency_cases(None).unwrap().len(), 0);
    }

    #[test]
    fn should_count_low_stock_items() {
        let db = test_db();
        db.add_stock(&StockItem {
            medicine_id: "M-1".to_string(),
            name: "Paracetamol".to_string(),
            sku: None,
            kind: None,
            manufacturer: None,
            price: Some(10.0),
            quantity: Some(3),
            expiry_date: None,
        })
        .unwrap();
        db.add_stock(&StockItem {
            medicine_id: "M-2".to_string(),
            name: "Ibuprofen".to_string(),
            sku: None,
            kind: None,
            manufacturer: None,
            price: Some(20.0),
            quantity: Some(40),
            expiry_date: None,
        })
        .unwrap();

        assert_eq!(db.stock_item_count().unwrap(), 2);
        assert_eq!(db.low_stock_count().unwrap(), 1);
    }
}
