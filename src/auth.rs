//! Authentication service for Medora.
//!
//! Validates credentials against the role-partitioned record sets of the
//! identity store and issues signed, time-limited session tokens. The token
//! is the sole artifact of a successful login; there is no session table.
//!
//! Stored credentials come in two forms: bcrypt hashes (recognized by the
//! `$2` prefix, verified in constant time) and legacy plaintext, accepted
//! only behind an explicit migration flag. A plaintext match is re-hashed
//! immediately, so each legacy account survives at most one plaintext
//! comparison.

use std::sync::Arc;

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::db::{Database, PersonRecord, RecordSet};
use crate::error::{ApiError, ApiResult};
use crate::models::{Contact, Insurance, Role};

/// Session tokens are valid for eight hours.
const TOKEN_TTL: Duration = Duration::hours(8);

/// Claims embedded in a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user: TokenUser,
    pub exp: i64,
}

/// The profile carried inside a token. Role-specific extras are only
/// present for the matching role.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUser {
    pub email: String,
    pub role: Role,
    pub name: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifications: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medical_specialty: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<Contact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insurance: Option<Insurance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ward_number: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bed_number: Option<i64>,
}

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: String,
    pub user: TokenUser,
}

enum CredentialMatch {
    Hash,
    LegacyPlaintext,
    NoMatch,
}

pub struct AuthService {
    db: Arc<Database>,
    secret: String,
    allow_plaintext: bool,
}

impl AuthService {
    pub fn new(db: Arc<Database>, secret: String, allow_plaintext: bool) -> Self {
        Self {
            db,
            secret,
            allow_plaintext,
        }
    }

    /// Authenticates a login attempt.
    ///
    /// The candidate record is looked up first in the record set implied by
    /// the claimed role, then in the other two sets by email alone.
    /// Patients match on either their top-level or nested contact email and
    /// are inferred as role `patient`.
    ///
    /// # Errors
    ///
    /// * `NotFound` if no record matches the email in any set.
    /// * `RoleMismatch` if the stored role differs from the claimed one.
    /// * `InvalidCredential` if the password does not verify.
    pub fn authenticate(
        &self,
        email: &str,
        password: &str,
        claimed_role: Role,
    ) -> ApiResult<LoginOutcome> {
        let (set, record) = self
            .find_candidate(email, claimed_role)?
            .ok_or_else(|| ApiError::NotFound("User not found!".to_string()))?;

        let actual_role = record.role();
        if actual_role != claimed_role {
            tracing::debug!(email, %claimed_role, %actual_role, "login role mismatch");
            return Err(ApiError::RoleMismatch {
                expected: claimed_role.to_string(),
                found: actual_role.to_string(),
            });
        }

        let stored = record
            .stored_password()
            .ok_or_else(|| ApiError::InvalidCredential("Invalid password!".to_string()))?;

        match verify_credential(stored, password, self.allow_plaintext)? {
            CredentialMatch::Hash => {}
            CredentialMatch::LegacyPlaintext => {
                // Upgrade the account so the plaintext form is gone after
                // its first successful login.
                self.db.rehash_credential(set, record.id(), password)?;
                tracing::warn!(email, "re-hashed legacy plaintext credential");
            }
            CredentialMatch::NoMatch => {
                return Err(ApiError::InvalidCredential("Invalid password!".to_string()));
            }
        }

        let user = self.token_user(&record)?;
        let token = self.issue_token(&user)?;
        tracing::info!(email, role = %actual_role, "login successful");
        Ok(LoginOutcome { token, user })
    }

    fn find_candidate(
        &self,
        email: &str,
        claimed_role: Role,
    ) -> ApiResult<Option<(RecordSet, PersonRecord)>> {
        let primary = RecordSet::for_role(claimed_role);
        let mut order = vec![primary];
        for set in [RecordSet::Users, RecordSet::Staff, RecordSet::Patients] {
            if set != primary {
                order.push(set);
            }
        }
        for set in order {
            if let Some(record) = self.lookup(set, email)? {
                return Ok(Some((set, record)));
            }
        }
        Ok(None)
    }

    fn lookup(&self, set: RecordSet, email: &str) -> ApiResult<Option<PersonRecord>> {
        Ok(match set {
            RecordSet::Users => self.db.find_user_by_email(email)?.map(PersonRecord::User),
            RecordSet::Staff => self.db.find_staff_by_email(email)?.map(PersonRecord::Staff),
            RecordSet::Patients => self
                .db
                .find_patient_by_email(email)?
                .map(PersonRecord::Patient),
        })
    }

    /// Builds the token profile for a record, including the role-specific
    /// extra claims.
    fn token_user(&self, record: &PersonRecord) -> ApiResult<TokenUser> {
        let mut user = TokenUser {
            email: String::new(),
            role: record.role(),
            name: record.display_name().to_string(),
            id: record.id().to_string(),
            specialization: None,
            department: None,
            qualifications: None,
            patient_id: None,
            age: None,
            gender: None,
            medical_specialty: None,
            kind: None,
            contact: None,
            insurance: None,
            ward_number: None,
            bed_number: None,
        };

        match record {
            PersonRecord::User(account) => {
                user.email = account.email.clone();
            }
            PersonRecord::Staff(staff) => {
                user.email = staff.email.clone().unwrap_or_default();
                user.specialization = staff.specialization.clone();
                user.department = staff.department.clone();
                user.qualifications = staff.qualifications.clone();
            }
            PersonRecord::Patient(patient) => {
                user.email = patient
                    .email
                    .clone()
                    .or_else(|| patient.contact.email.clone())
                    .unwrap_or_default();
                user.patient_id = Some(patient.patient_id.clone());
                user.age = patient.age;
                user.gender = patient.gender.clone();
                user.medical_specialty = patient.medical_specialty.clone();
                user.kind = Some(patient.kind.as_str().to_string());
                user.contact = Some(patient.contact.clone());
                user.insurance = Some(patient.insurance.clone());
                if let Some(admission) = self.db.active_admission_for_patient(patient.id)? {
                    user.ward_number = Some(admission.ward_number);
                    user.bed_number = Some(admission.bed_number);
                }
            }
        }
        Ok(user)
    }

    /// Signs an eight-hour session token for the given profile.
    pub fn issue_token(&self, user: &TokenUser) -> ApiResult<String> {
        let claims = Claims {
            user: user.clone(),
            exp: (OffsetDateTime::now_utc() + TOKEN_TTL).unix_timestamp(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| ApiError::Internal(anyhow::Error::new(e).context("failed to sign token")))
    }

    /// Verifies a token's signature and expiry and returns the embedded
    /// profile. No database round trip happens here; callers that serve
    /// protected requests re-confirm the subject with
    /// [`AuthService::confirm_subject`].
    pub fn verify_token(&self, token: &str) -> ApiResult<TokenUser> {
        match decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        ) {
            Ok(data) => Ok(data.claims.user),
            Err(err) => match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => Err(
                    ApiError::InvalidCredential("Token has expired!".to_string()),
                ),
                _ => Err(ApiError::InvalidCredential("Invalid token!".to_string())),
            },
        }
    }

    /// Confirms that the token subject still exists in its record set.
    pub fn confirm_subject(&self, user: &TokenUser) -> ApiResult<()> {
        let id: i64 = user
            .id
            .parse()
            .map_err(|_| ApiError::InvalidCredential("Invalid token!".to_string()))?;
        if !self.db.record_exists(RecordSet::for_role(user.role), id)? {
            return Err(ApiError::InvalidCredential("User not found!".to_string()));
        }
        Ok(())
    }
}

fn verify_credential(
    stored: &str,
    given: &str,
    allow_plaintext: bool,
) -> ApiResult<CredentialMatch> {
    if stored.starts_with("$2") {
        let ok = bcrypt::verify(given, stored).map_err(|e| {
            ApiError::Internal(anyhow::Error::new(e).context("password verification failed"))
        })?;
        Ok(if ok {
            CredentialMatch::Hash
        } else {
            CredentialMatch::NoMatch
        })
    } else if allow_plaintext {
        Ok(if stored == given {
            CredentialMatch::LegacyPlaintext
        } else {
            CredentialMatch::NoMatch
        })
    } else {
        // Unrecognized credential form and no migration flag: never matches.
        Ok(CredentialMatch::NoMatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{NewPatient, NewStaff};
    use crate::models::{AdmissionType, Insurance};

    const SECRET: &str = "test-secret";

    fn service(allow_plaintext: bool) -> (Arc<Database>, AuthService) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let auth = AuthService::new(db.clone(), SECRET.to_string(), allow_plaintext);
        (db, auth)
    }

    fn register_patient(db: &Database, email: &str, password: &str) -> String {
        db.create_patient(&NewPatient {
            name: "Asha Rao".to_string(),
            age: Some(29),
            gender: Some("female".to_string()),
            blood_group: None,
            kind: AdmissionType::Opd,
            medical_specialty: None,
            description: None,
            contact: Contact {
                email: Some(email.to_string()),
                phone: None,
                address: None,
            },
            insurance: Insurance::default(),
            assigned_doctor: None,
            ward_number: None,
            bed_number: None,
            password: Some(password.to_string()),
        })
        .unwrap()
        .patient_id
    }

    #[test]
    fn should_login_patient_by_contact_email() {
        let (db, auth) = service(false);
        let patient_id = register_patient(&db, "a@x.com", "pw1");

        let outcome = auth.authenticate("a@x.com", "pw1", Role::Patient).unwrap();
        assert_eq!(outcome.user.patient_id.as_deref(), Some(patient_id.as_str()));

        // The token round-trips through verification.
        let user = auth.verify_token(&outcome.token).unwrap();
        assert_eq!(user.role, Role::Patient);
        assert_eq!(user.patient_id.as_deref(), Some(patient_id.as_str()));
        auth.confirm_subject(&user).unwrap();
    }

    #[test]
    fn should_reject_wrong_claimed_role() {
        let (db, auth) = service(false);
        register_patient(&db, "a@x.com", "pw1");

        let result = auth.authenticate("a@x.com", "pw1", Role::Doctor);
        assert!(matches!(result, Err(ApiError::RoleMismatch { .. })));
    }

    #[test]
    fn should_reject_wrong_password() {
        let (db, auth) = service(false);
        register_patient(&db, "a@x.com", "pw1");

        let result = auth.authenticate("a@x.com", "wrong", Role::Patient);
        assert!(matches!(result, Err(ApiError::InvalidCredential(_))));
    }

    #[test]
    fn should_report_unknown_email_as_not_found() {
        let (_db, auth) = service(false);
        let result = auth.authenticate("nobody@x.com", "pw", Role::Admin);
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[test]
    fn should_fall_back_to_other_record_sets() {
        let (db, auth) = service(false);
        db.create_staff(&NewStaff {
            name: "Dr. Varga".to_string(),
            role: Role::Doctor,
            department: Some("Cardiology".to_string()),
            specialization: Some("Interventional".to_string()),
            qualifications: None,
            email: Some("varga@hospital.test".to_string()),
            phone: None,
            password: Some("docpw".to_string()),
        })
        .unwrap();

        // Claiming admin scans users first, then finds the staff record by
        // email alone; the stored role wins and mismatches the claim.
        let result = auth.authenticate("varga@hospital.test", "docpw", Role::Admin);
        assert!(matches!(result, Err(ApiError::RoleMismatch { .. })));

        let outcome = auth
            .authenticate("varga@hospital.test", "docpw", Role::Doctor)
            .unwrap();
        assert_eq!(outcome.user.department.as_deref(), Some("Cardiology"));
        assert_eq!(outcome.user.specialization.as_deref(), Some("Interventional"));
    }

    #[test]
    fn should_include_ward_and_bed_for_admitted_patient() {
        let (db, auth) = service(false);
        db.create_patient(&NewPatient {
            name: "Admitted".to_string(),
            age: Some(61),
            gender: None,
            blood_group: None,
            kind: AdmissionType::Ipd,
            medical_specialty: None,
            description: None,
            contact: Contact {
                email: Some("bed@x.com".to_string()),
                phone: None,
                address: None,
            },
            insurance: Insurance::default(),
            assigned_doctor: None,
            ward_number: Some(2),
            bed_number: Some(7),
            password: Some("pw".to_string()),
        })
        .unwrap();

        let outcome = auth.authenticate("bed@x.com", "pw", Role::Patient).unwrap();
        assert_eq!(outcome.user.ward_number, Some(2));
        assert_eq!(outcome.user.bed_number, Some(7));
    }

    #[test]
    fn should_reject_plaintext_credentials_without_the_migration_flag() {
        let (db, auth) = service(false);
        db.insert_user_raw("Legacy", "legacy@x.com", "admin", "oldpw");

        let result = auth.authenticate("legacy@x.com", "oldpw", Role::Admin);
        assert!(matches!(result, Err(ApiError::InvalidCredential(_))));
    }

    #[test]
    fn should_rehash_plaintext_credentials_on_first_login() {
        let (db, auth) = service(true);
        db.insert_user_raw("Legacy", "legacy@x.com", "admin", "oldpw");

        auth.authenticate("legacy@x.com", "oldpw", Role::Admin).unwrap();

        let stored = db.find_user_by_email("legacy@x.com").unwrap().unwrap();
        assert!(stored.password.starts_with("$2"));

        // Second login goes through the hashed path.
        auth.authenticate("legacy@x.com", "oldpw", Role::Admin).unwrap();
    }

    #[test]
    fn should_reject_expired_tokens() {
        let (_db, auth) = service(false);
        let user = TokenUser {
            email: "x@x.com".to_string(),
            role: Role::Admin,
            name: "X".to_string(),
            id: "1".to_string(),
            specialization: None,
            department: None,
            qualifications: None,
            patient_id: None,
            age: None,
            gender: None,
            medical_specialty: None,
            kind: None,
            contact: None,
            insurance: None,
            ward_number: None,
            bed_number: None,
        };
        let expired = Claims {
            user,
            exp: (OffsetDateTime::now_utc() - Duration::minutes(5)).unix_timestamp(),
        };
        let token = encode(
            &Header::default(),
            &expired,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        let result = auth.verify_token(&token);
        assert!(matches!(result, Err(ApiError::InvalidCredential(msg)) if msg.contains("expired")));
    }

    #[test]
    fn should_reject_tokens_signed_with_another_secret() {
        let (_db, auth) = service(false);
        let other_db = Arc::new(Database::open_in_memory().unwrap());
        let forger = AuthService::new(other_db, "other-secret".to_string(), false);

        let profile = TokenUser {
            email: "m@x.com".to_string(),
            role: Role::Admin,
            name: "Mallory".to_string(),
            id: "1".to_string(),
            specialization: None,
            department: None,
            qualifications: None,
            patient_id: None,
            age: None,
            gender: None,
            medical_specialty: None,
            kind: None,
            contact: None,
            insurance: None,
            ward_number: None,
            bed_number: None,
        };
        let token = forger.issue_token(&profile).unwrap();

        let result = auth.verify_token(&token);
        assert!(matches!(result, Err(ApiError::InvalidCredential(_))));
    }
}
