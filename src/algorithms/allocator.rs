//! Random generators shared by the seeder and the mutator.

use rand::seq::IndexedRandom;
use rand::Rng;

use super::instance::ProblemInstance;
use crate::error::ScheduleError;
use crate::models::{RoomType, Weekday};

/// Rooms of `room_type` able to seat `batch_code`.
///
/// When no room of the type is large enough, falls back to the rooms of that
/// type whose capacity comes closest to the headcount, so a candidate exists
/// whenever the type has any room at all.
pub fn room_candidates<'a>(
    instance: &'a ProblemInstance,
    batch_code: &str,
    room_type: RoomType,
) -> Result<Vec<&'a str>, ScheduleError> {
    let headcount = instance.batch_headcount(batch_code).unwrap_or(0);
    let of_type: Vec<_> = instance
        .rooms()
        .iter()
        .filter(|r| r.room_type == room_type)
        .collect();

    let unavailable = || ScheduleError::RoomUnavailable {
        batch: batch_code.to_owned(),
        room_type,
    };
    let largest = of_type.iter().map(|r| r.capacity).max().ok_or_else(unavailable)?;

    let fitting: Vec<&str> = of_type
        .iter()
        .filter(|r| r.capacity >= headcount)
        .map(|r| r.room_num.as_str())
        .collect();
    if !fitting.is_empty() {
        return Ok(fitting);
    }

    Ok(of_type
        .iter()
        .filter(|r| r.capacity == largest)
        .map(|r| r.room_num.as_str())
        .collect())
}

pub fn allocate_room<R: Rng>(
    instance: &ProblemInstance,
    batch_code: &str,
    room_type: RoomType,
    rng: &mut R,
) -> Result<String, ScheduleError> {
    let candidates = room_candidates(instance, batch_code, room_type)?;
    candidates
        .choose(rng)
        .map(|r| (*r).to_owned())
        .ok_or_else(|| ScheduleError::RoomUnavailable {
            batch: batch_code.to_owned(),
            room_type,
        })
}

/// Lecturers belonging to the department that runs `subject_code`'s course.
pub fn eligible_lecturers<'a>(
    instance: &'a ProblemInstance,
    batch_code: &str,
    subject_code: &str,
) -> Result<Vec<&'a str>, ScheduleError> {
    let department = instance.subject_department(subject_code);
    let eligible: Vec<&str> = instance
        .lecturers()
        .iter()
        .filter(|l| Some(l.department_id) == department)
        .map(|l| l.staff_no.as_str())
        .collect();
    if eligible.is_empty() {
        return Err(ScheduleError::NoEligibleLecturer {
            batch: batch_code.to_owned(),
            subject: subject_code.to_owned(),
        });
    }
    Ok(eligible)
}

pub fn assign_lecturer<R: Rng>(
    instance: &ProblemInstance,
    batch_code: &str,
    subject_code: &str,
    rng: &mut R,
) -> Result<String, ScheduleError> {
    let eligible = eligible_lecturers(instance, batch_code, subject_code)?;
    let index = rng.random_range(0..eligible.len());
    Ok(eligible[index].to_owned())
}

/// A day from the lecturer's preferred days; any weekday when none are stated.
pub fn preferred_day<R: Rng>(instance: &ProblemInstance, staff_no: &str, rng: &mut R) -> Weekday {
    let preferred = instance.preferred_days(staff_no);
    let days = if preferred.is_empty() {
        &Weekday::ALL[..]
    } else {
        preferred
    };
    days[rng.random_range(0..days.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::instance::tests::{batch, campus, room};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn rooms_seat_the_batch() {
        let instance = ProblemInstance::build(&campus()).unwrap();
        let candidates = room_candidates(&instance, "B2", RoomType::Classroom).unwrap();
        assert_eq!(candidates, vec!["R101", "R102"]);

        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            let room = allocate_room(&instance, "B2", RoomType::Classroom, &mut rng).unwrap();
            assert!(instance.room_capacity(&room).unwrap() >= 35);
        }
    }

    #[test]
    fn falls_back_to_closest_capacity() {
        let mut request = campus();
        request.batches.push(batch("BIG", 1, 80));
        let instance = ProblemInstance::build(&request).unwrap();
        assert_eq!(
            room_candidates(&instance, "BIG", RoomType::Classroom).unwrap(),
            vec!["R102"]
        );
        assert_eq!(
            room_candidates(&instance, "BIG", RoomType::Laboratory).unwrap(),
            vec!["LAB1"]
        );
    }

    #[test]
    fn missing_room_type_is_unavailable() {
        let mut request = campus();
        request.rooms.retain(|r| r.room_type == RoomType::Classroom);
        request.rooms.push(room("R200", 20, RoomType::Classroom));
        let instance = ProblemInstance::build(&request).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            allocate_room(&instance, "B1", RoomType::Laboratory, &mut rng),
            Err(ScheduleError::RoomUnavailable { .. })
        ));
    }

    #[test]
    fn lecturers_come_from_the_subject_department() {
        let instance = ProblemInstance::build(&campus()).unwrap();
        assert_eq!(eligible_lecturers(&instance, "B1", "CS101").unwrap(), vec!["L1", "L2"]);

        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            let staff_no = assign_lecturer(&instance, "B1", "CS101", &mut rng).unwrap();
            assert_ne!(staff_no, "L9");
        }
    }

    #[test]
    fn no_lecturer_in_department() {
        let mut request = campus();
        request.lecturers.retain(|l| l.department_id != 10);
        let instance = ProblemInstance::build(&request).unwrap();
        assert!(matches!(
            eligible_lecturers(&instance, "B1", "CS101"),
            Err(ScheduleError::NoEligibleLecturer { .. })
        ));
    }

    #[test]
    fn days_come_from_preferences() {
        let instance = ProblemInstance::build(&campus()).unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..50 {
            let day = preferred_day(&instance, "L2", &mut rng);
            assert!(matches!(day, Weekday::Thursday | Weekday::Friday));
        }
    }
}
