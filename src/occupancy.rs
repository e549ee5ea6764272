//! Ward and bed occupancy engine.
//!
//! Materializes the full ward×bed grid from the current active-admission
//! snapshot. The computation is pure: it holds no state of its own, has no
//! side effects, and recomputing it with unchanged inputs yields identical
//! output, so it is safe to run on every request.

use std::collections::HashMap;

use serde::Serialize;

/// One ward of the topology, with a fixed number of beds.
#[derive(Debug, Clone)]
pub struct WardDef {
    pub id: i64,
    /// Ordinal used as the matching key against admission records.
    pub ward_number: i64,
    pub name: String,
    pub specialty: String,
    pub beds_total: i64,
}

/// Snapshot of one active admission, joined with the patient it belongs to.
/// Ward and bed numbers are already normalized to `i64` at the data-model
/// boundary.
#[derive(Debug, Clone)]
pub struct AdmissionSlot {
    pub ward_number: i64,
    pub bed_number: i64,
    pub admitted_at: Option<String>,
    pub patient_name: String,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub diagnosis: Option<String>,
    /// Weak reference to the assigned doctor, resolved via the lookup
    /// passed to [`compute_occupancy`].
    pub assigned_doctor: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BedStatus {
    Admitted,
    Available,
}

/// The patient summary shown for an occupied bed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BedOccupant {
    pub name: String,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub diagnosis: Option<String>,
    pub doctor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BedView {
    pub bed_number: i64,
    pub status: BedStatus,
    pub admission_date: Option<String>,
    pub patient: Option<BedOccupant>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WardView {
    #[serde(rename = "wardId")]
    pub id: String,
    pub name: String,
    pub specialty: String,
    pub beds: Vec<BedView>,
}

/// Computes the occupancy grid for the given topology.
///
/// Produces one [`WardView`] per ward in topology order, each carrying
/// exactly `beds_total` [`BedView`] entries in bed-number order. A slot is
/// `Admitted` when an active admission matches its (ward, bed) pair;
/// otherwise it is `Available` with no patient summary. Doctor names are
/// resolved through `resolve_doctor`; an unresolvable reference yields
/// `None`, never an error.
pub fn compute_occupancy<F>(
    wards: &[WardDef],
    admissions: &[AdmissionSlot],
    resolve_doctor: F,
) -> Vec<WardView>
where
    F: Fn(i64) -> Option<String>,
{
    let mut by_slot: HashMap<(i64, i64), &AdmissionSlot> = HashMap::new();
    for admission in admissions {
        by_slot.insert((admission.ward_number, admission.bed_number), admission);
    }

    wards
        .iter()
        .map(|ward| {
            let beds = (1..=ward.beds_total)
                .map(|bed_number| match by_slot.get(&(ward.ward_number, bed_number)) {
                    Some(admission) => BedView {
                        bed_number,
                        status: BedStatus::Admitted,
                        admission_date: admission.admitted_at.clone(),
                        patient: Some(BedOccupant {
                            name: admission.patient_name.clone(),
                            age: admission.age,
                            gender: admission.gender.clone(),
                            diagnosis: admission.diagnosis.clone(),
                            doctor: admission.assigned_doctor.and_then(&resolve_doctor),
                        }),
                    },
                    None => BedView {
                        bed_number,
                        status: BedStatus::Available,
                        admission_date: None,
                        patient: None,
                    },
                })
                .collect();

            WardView {
                id: ward.id.to_string(),
                name: ward.name.clone(),
                specialty: ward.specialty.clone(),
                beds,
            }
        })
        .collect()
}

/// Occupied beds over total beds, as an integer percentage.
pub fn bed_occupancy_percent(occupied_beds: u64, total_beds: u64) -> u64 {
    if total_beds == 0 {
        0
    } else {
        occupied_beds * 100 / total_beds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topology(wards: i64, beds_per_ward: i64) -> Vec<WardDef> {
        (1..=wards)
            .map(|n| WardDef {
                id: n,
                ward_number: n,
                name: format!("Ward {n}"),
                specialty: "General".to_string(),
                beds_total: beds_per_ward,
            })
            .collect()
    }

    fn admission(ward: i64, bed: i64) -> AdmissionSlot {
        AdmissionSlot {
            ward_number: ward,
            bed_number: bed,
            admitted_at: Some("2025-01-10T08:00:00Z".to_string()),
            patient_name: format!("Patient {ward}-{bed}"),
            age: Some(40),
            gender: Some("female".to_string()),
            diagnosis: Some("Cardiology".to_string()),
            assigned_doctor: None,
        }
    }

    #[test]
    fn should_produce_one_entry_per_bed_in_topology() {
        let wards = topology(5, 10);
        let admissions = vec![admission(1, 1), admission(3, 7), admission(5, 10)];

        let grid = compute_occupancy(&wards, &admissions, |_| None);

        let total: usize = grid.iter().map(|w| w.beds.len()).sum();
        assert_eq!(total, 50);

        let admitted: usize = grid
            .iter()
            .flat_map(|w| &w.beds)
            .filter(|b| b.status == BedStatus::Admitted)
            .count();
        assert_eq!(admitted, 3);
    }

    #[test]
    fn should_ignore_admissions_outside_the_topology() {
        let wards = topology(2, 4);
        // Ward 9 and bed 12 do not exist in a 2x4 topology.
        let admissions = vec![admission(1, 2), admission(9, 1), admission(2, 12)];

        let grid = compute_occupancy(&wards, &admissions, |_| None);

        let admitted: usize = grid
            .iter()
            .flat_map(|w| &w.beds)
            .filter(|b| b.status == BedStatus::Admitted)
            .count();
        assert_eq!(admitted, 1);
    }

    #[test]
    fn should_keep_ward_and_bed_order() {
        let wards = topology(3, 3);
        let grid = compute_occupancy(&wards, &[], |_| None);

        let names: Vec<&str> = grid.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, ["Ward 1", "Ward 2", "Ward 3"]);
        for ward in &grid {
            let beds: Vec<i64> = ward.beds.iter().map(|b| b.bed_number).collect();
            assert_eq!(beds, [1, 2, 3]);
        }
    }

    #[test]
    fn should_be_idempotent_for_unchanged_inputs() {
        let wards = topology(5, 10);
        let admissions = vec![admission(2, 5), admission(4, 1)];

        let first = compute_occupancy(&wards, &admissions, |_| None);
        let second = compute_occupancy(&wards, &admissions, |_| None);
        assert_eq!(first, second);
    }

    #[test]
    fn should_resolve_doctor_names_and_tolerate_misses() {
        let wards = topology(1, 2);
        let mut with_doctor = admission(1, 1);
        with_doctor.assigned_doctor = Some(7);
        let mut dangling = admission(1, 2);
        dangling.assigned_doctor = Some(99);

        let grid = compute_occupancy(&wards, &[with_doctor, dangling], |id| {
            (id == 7).then(|| "Dr. Meyer".to_string())
        });

        let beds = &grid[0].beds;
        assert_eq!(
            beds[0].patient.as_ref().unwrap().doctor.as_deref(),
            Some("Dr. Meyer")
        );
        // Unresolvable reference degrades to None instead of failing.
        assert_eq!(beds[1].patient.as_ref().unwrap().doctor, None);
    }

    #[test]
    fn should_render_integer_occupancy_percent() {
        assert_eq!(bed_occupancy_percent(15, 50), 30);
        assert_eq!(bed_occupancy_percent(0, 50), 0);
        assert_eq!(bed_occupancy_percent(50, 50), 100);
        assert_eq!(bed_occupancy_percent(1, 3), 33);
        assert_eq!(bed_occupancy_percent(0, 0), 0);
    }
}
