// libs/appointment-cell/src/services/availability.rs
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::debug;
use uuid::Uuid;

use doctor_cell::models::{Doctor, DoctorCalendar, Resolution};
use doctor_cell::services::{ScheduleResolver, ScheduleService, SlotGenerator};
use shared_models::time::TimeOfDay;

use crate::models::{
    Appointment, AppointmentError, AvailableDates, DayAvailability, HospitalSlots, SlotKey,
    SlotView, ALREADY_BOOKED,
};
use crate::services::store::BookingStore;

/// How a single date is classified for the date-range view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateClass {
    Available,
    FullyBooked,
    Unavailable,
}

/// Every slot start offered by a resolution, unioned across windows and
/// keyed by `(time, booking site)`. A single-site doctor gets one entry per
/// time.
pub fn offered_slots(
    resolution: &Resolution,
    doctor: &Doctor,
) -> BTreeMap<(TimeOfDay, Option<Uuid>), TimeOfDay> {
    let mut offered = BTreeMap::new();
    for window in resolution.windows() {
        let slots = SlotGenerator::for_window(
            window,
            doctor.appointment_duration_minutes,
            doctor.break_time_minutes,
        );
        for start in slots {
            let end = start
                .checked_add_minutes(doctor.appointment_duration_minutes)
                .unwrap_or(TimeOfDay::END_OF_DAY);
            offered.insert((start, doctor.booking_site(window.hospital_id)), end);
        }
    }
    offered
}

/// Hospitals that offer `time` under a resolution.
pub fn hospitals_offering(
    resolution: &Resolution,
    doctor: &Doctor,
    time: TimeOfDay,
) -> Vec<Option<Uuid>> {
    offered_slots(resolution, doctor)
        .into_keys()
        .filter(|(start, _)| *start == time)
        .map(|(_, hospital)| hospital)
        .collect()
}

/// Rejects a hospital filter naming a site the doctor does not work at.
pub fn ensure_affiliated(
    doctor: &Doctor,
    hospital_id: Option<Uuid>,
) -> Result<(), AppointmentError> {
    ScheduleService::check_hospital(doctor, hospital_id)?;
    Ok(())
}

fn occupied_keys<'a>(bookings: impl IntoIterator<Item = &'a Appointment>) -> HashSet<SlotKey> {
    bookings.into_iter().filter(|a| a.is_active()).map(|a| a.slot_key()).collect()
}

/// Builds the single-day view from a calendar snapshot and the set of
/// occupied slots.
pub fn build_day(
    doctor: &Doctor,
    calendar: &DoctorCalendar,
    date: NaiveDate,
    hospital_id: Option<Uuid>,
    occupied: &HashSet<SlotKey>,
) -> DayAvailability {
    let resolution = ScheduleResolver::resolve(doctor, calendar, date, hospital_id);

    let slots: Vec<SlotView> = offered_slots(&resolution, doctor)
        .into_iter()
        .map(|((time, slot_hospital), end_time)| {
            let key = SlotKey { doctor_id: doctor.id, date, time, hospital_id: slot_hospital };
            let booked = occupied.contains(&key);
            SlotView {
                time,
                end_time,
                hospital_id: slot_hospital,
                hospital_name: slot_hospital
                    .and_then(|h| doctor.hospital_name(h))
                    .map(str::to_string),
                available: !booked,
                reason: booked.then(|| ALREADY_BOOKED.to_string()),
            }
        })
        .collect();

    let mut grouped: BTreeMap<Option<Uuid>, Vec<SlotView>> = BTreeMap::new();
    for slot in &slots {
        grouped.entry(slot.hospital_id).or_default().push(slot.clone());
    }
    let by_hospital = grouped
        .into_iter()
        .map(|(hospital, slots)| HospitalSlots {
            hospital_id: hospital,
            hospital_name: hospital.and_then(|h| doctor.hospital_name(h)).map(str::to_string),
            available_count: slots.iter().filter(|s| s.available).count(),
            slots,
        })
        .collect();

    let has_schedule = resolution.has_schedule();
    let is_fully_booked =
        has_schedule && !slots.is_empty() && slots.iter().all(|s| !s.available);

    DayAvailability {
        doctor_id: doctor.id,
        date,
        hospital_id,
        slots,
        by_hospital,
        is_fully_booked,
        has_schedule,
        is_on_leave: resolution.is_on_leave(),
        reason: resolution.reason().map(str::to_string),
    }
}

/// Classifies a date, stopping at the first free slot.
pub fn classify_date(
    doctor: &Doctor,
    calendar: &DoctorCalendar,
    date: NaiveDate,
    hospital_id: Option<Uuid>,
    occupied: &HashSet<SlotKey>,
) -> DateClass {
    let resolution = ScheduleResolver::resolve(doctor, calendar, date, hospital_id);
    let mut any_slot = false;

    for window in resolution.windows() {
        let slots = SlotGenerator::for_window(
            window,
            doctor.appointment_duration_minutes,
            doctor.break_time_minutes,
        );
        for time in slots {
            any_slot = true;
            let key = SlotKey {
                doctor_id: doctor.id,
                date,
                time,
                hospital_id: doctor.booking_site(window.hospital_id),
            };
            if !occupied.contains(&key) {
                return DateClass::Available;
            }
        }
    }

    if any_slot {
        DateClass::FullyBooked
    } else {
        DateClass::Unavailable
    }
}

pub struct AvailabilityService {
    schedules: Arc<ScheduleService>,
    bookings: Arc<dyn BookingStore>,
    max_range_days: i64,
}

impl AvailabilityService {
    pub fn new(
        schedules: Arc<ScheduleService>,
        bookings: Arc<dyn BookingStore>,
        max_range_days: i64,
    ) -> Self {
        Self { schedules, bookings, max_range_days }
    }

    /// Slots for one doctor on one date, optionally limited to a hospital.
    pub async fn get_availability(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        hospital_id: Option<Uuid>,
    ) -> Result<DayAvailability, AppointmentError> {
        debug!("Availability for doctor {} on {} (hospital {:?})", doctor_id, date, hospital_id);

        let doctor = self.schedules.get_doctor(doctor_id).await?;
        ensure_affiliated(&doctor, hospital_id)?;
        let calendar = self.schedules.calendar(doctor_id, date, date).await?;
        let bookings = self.bookings.list_active(doctor_id, date, date).await?;

        Ok(build_day(&doctor, &calendar, date, hospital_id, &occupied_keys(&bookings)))
    }

    /// Buckets every date in `start_date..=end_date`.
    pub async fn get_available_dates(
        &self,
        doctor_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
        hospital_id: Option<Uuid>,
    ) -> Result<AvailableDates, AppointmentError> {
        if end_date < start_date {
            return Err(AppointmentError::ValidationError(format!(
                "end_date {} precedes start_date {}",
                end_date, start_date
            )));
        }
        let span_days = (end_date - start_date).num_days() + 1;
        if span_days > self.max_range_days {
            return Err(AppointmentError::ValidationError(format!(
                "Date range of {} days exceeds the limit of {}",
                span_days, self.max_range_days
            )));
        }

        let doctor = self.schedules.get_doctor(doctor_id).await?;
        ensure_affiliated(&doctor, hospital_id)?;
        let calendar = self.schedules.calendar(doctor_id, start_date, end_date).await?;
        let bookings = self.bookings.list_active(doctor_id, start_date, end_date).await?;
        let occupied = occupied_keys(&bookings);

        let mut result = AvailableDates {
            doctor_id,
            start_date,
            end_date,
            available_dates: Vec::new(),
            fully_booked_dates: Vec::new(),
            unavailable_dates: Vec::new(),
        };

        for date in start_date.iter_days().take_while(|d| *d <= end_date) {
            match classify_date(&doctor, &calendar, date, hospital_id, &occupied) {
                DateClass::Available => result.available_dates.push(date),
                DateClass::FullyBooked => result.fully_booked_dates.push(date),
                DateClass::Unavailable => result.unavailable_dates.push(date),
            }
        }

        debug!(
            "Doctor {} {}..={}: {} available, {} fully booked, {} unavailable",
            doctor_id,
            start_date,
            end_date,
            result.available_dates.len(),
            result.fully_booked_dates.len(),
            result.unavailable_dates.len()
        );
        Ok(result)
    }

    /// True iff `time` is an offered slot in scope and at least one of its
    /// hospitals is free.
    pub async fn is_slot_available(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: TimeOfDay,
        hospital_id: Option<Uuid>,
    ) -> Result<bool, AppointmentError> {
        let doctor = self.schedules.get_doctor(doctor_id).await?;
        ensure_affiliated(&doctor, hospital_id)?;
        let calendar = self.schedules.calendar(doctor_id, date, date).await?;
        let resolution = ScheduleResolver::resolve(&doctor, &calendar, date, hospital_id);

        for slot_hospital in hospitals_offering(&resolution, &doctor, time) {
            let key = SlotKey { doctor_id, date, time, hospital_id: slot_hospital };
            if self.bookings.find_active(&key).await?.is_none() {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;
    use doctor_cell::models::{AvailabilityOverride, RecurringSchedule};

    fn t(s: &str) -> TimeOfDay {
        s.parse().unwrap()
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn calendar_with(doctor: &Doctor, windows: &[(&str, &str, Option<Uuid>)]) -> DoctorCalendar {
        let mut calendar = DoctorCalendar::new(doctor.id);
        for (start, end, hospital) in windows {
            calendar.recurring.push(RecurringSchedule {
                id: Uuid::new_v4(),
                doctor_id: doctor.id,
                day_of_week: Weekday::Mon,
                start_time: t(start),
                end_time: t(end),
                hospital_id: *hospital,
            });
        }
        calendar
    }

    #[test]
    fn booked_slot_is_marked_and_day_stays_open() {
        let doctor = Doctor::new(Uuid::new_v4(), "Dr. Mensah");
        let calendar = calendar_with(&doctor, &[("09:00", "10:00", None)]);
        let occupied: HashSet<SlotKey> = [SlotKey {
            doctor_id: doctor.id,
            date: d("2025-07-07"),
            time: t("09:00"),
            hospital_id: None,
        }]
        .into_iter()
        .collect();

        let day = build_day(&doctor, &calendar, d("2025-07-07"), None, &occupied);
        assert_eq!(day.slots.len(), 2);
        assert!(!day.slots[0].available);
        assert_eq!(day.slots[0].reason.as_deref(), Some(ALREADY_BOOKED));
        assert_eq!(day.slots[0].end_time, t("09:30"));
        assert!(day.slots[1].available);
        assert!(!day.is_fully_booked);
        assert_eq!(
            classify_date(&doctor, &calendar, d("2025-07-07"), None, &occupied),
            DateClass::Available
        );
    }

    #[test]
    fn overlapping_windows_union_their_slots() {
        let doctor = Doctor::new(Uuid::new_v4(), "Dr. Mensah");
        let calendar =
            calendar_with(&doctor, &[("09:00", "10:00", None), ("09:30", "10:30", None)]);

        let day = build_day(&doctor, &calendar, d("2025-07-07"), None, &HashSet::new());
        let times: Vec<String> = day.slots.iter().map(|s| s.time.to_string()).collect();
        assert_eq!(times, vec!["09:00", "09:30", "10:00"]);
    }

    #[test]
    fn multi_site_day_groups_slots_per_hospital() {
        let (north, south) = (Uuid::new_v4(), Uuid::new_v4());
        let doctor = Doctor::new(Uuid::new_v4(), "Dr. Mensah")
            .with_hospital(north, "North Clinic")
            .with_hospital(south, "South Clinic");
        let calendar = calendar_with(
            &doctor,
            &[("09:00", "10:00", Some(north)), ("09:00", "09:30", Some(south))],
        );

        let day = build_day(&doctor, &calendar, d("2025-07-07"), None, &HashSet::new());
        assert_eq!(day.slots.len(), 3);
        assert_eq!(day.by_hospital.len(), 2);
        let north_group = day.by_hospital.iter().find(|g| g.hospital_id == Some(north)).unwrap();
        assert_eq!(north_group.hospital_name.as_deref(), Some("North Clinic"));
        assert_eq!(north_group.available_count, 2);

        let resolution = ScheduleResolver::resolve(&doctor, &calendar, d("2025-07-07"), None);
        let both = hospitals_offering(&resolution, &doctor, t("09:00"));
        assert_eq!(both.len(), 2);
    }

    #[test]
    fn window_too_short_for_a_slot_is_unavailable() {
        let doctor = Doctor::new(Uuid::new_v4(), "Dr. Mensah");
        let calendar = calendar_with(&doctor, &[("09:00", "09:20", None)]);

        let day = build_day(&doctor, &calendar, d("2025-07-07"), None, &HashSet::new());
        assert!(day.has_schedule);
        assert!(day.slots.is_empty());
        assert!(!day.is_fully_booked);
        assert_eq!(
            classify_date(&doctor, &calendar, d("2025-07-07"), None, &HashSet::new()),
            DateClass::Unavailable
        );
    }

    #[test]
    fn holiday_override_is_unavailable_with_reason() {
        let doctor = Doctor::new(Uuid::new_v4(), "Dr. Mensah");
        let mut calendar = calendar_with(&doctor, &[("09:00", "17:00", None)]);
        calendar.overrides.push(AvailabilityOverride {
            id: Uuid::new_v4(),
            doctor_id: doctor.id,
            date: d("2025-07-07"),
            start_time: TimeOfDay::MIDNIGHT,
            end_time: TimeOfDay::END_OF_DAY,
            is_available: false,
            reason: Some("Public Holiday".to_string()),
            hospital_id: None,
        });

        let day = build_day(&doctor, &calendar, d("2025-07-07"), None, &HashSet::new());
        assert!(!day.has_schedule);
        assert_eq!(day.reason.as_deref(), Some("Public Holiday"));
        assert_eq!(
            classify_date(&doctor, &calendar, d("2025-07-07"), None, &HashSet::new()),
            DateClass::Unavailable
        );
    }

    #[test]
    fn single_site_windows_collapse_to_one_slot_per_time() {
        let home = Uuid::new_v4();
        let doctor = Doctor::new(Uuid::new_v4(), "Dr. Mensah").with_hospital(home, "Home Clinic");
        let calendar =
            calendar_with(&doctor, &[("09:00", "10:00", None), ("09:00", "09:30", Some(home))]);

        let day = build_day(&doctor, &calendar, d("2025-07-07"), None, &HashSet::new());
        let times: Vec<String> = day.slots.iter().map(|s| s.time.to_string()).collect();
        assert_eq!(times, vec!["09:00", "09:30"]);
        assert!(day.slots.iter().all(|s| s.hospital_id == Some(home)));
        assert_eq!(day.slots[0].hospital_name.as_deref(), Some("Home Clinic"));

        let resolution = ScheduleResolver::resolve(&doctor, &calendar, d("2025-07-07"), None);
        assert_eq!(hospitals_offering(&resolution, &doctor, t("09:00")), vec![Some(home)]);
    }
}
