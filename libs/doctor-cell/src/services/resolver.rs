use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use tracing::debug;
use uuid::Uuid;

use crate::models::{
    AvailabilityOverride, Doctor, DoctorCalendar, EffectiveWindow, Resolution, WindowSource,
};

/// Combines leave, overrides and schedules into the open windows for a date.
///
/// Precedence, highest first:
/// 1. approved leave covering the date
/// 2. overrides that settle the day: site-agnostic ones, any override of a
///    single-site doctor, and overrides for the filtered hospital. Their
///    windows replace every schedule, or the day is closed when one is
///    unavailable.
/// 3. other hospital-scoped overrides, which replace or remove only that
///    hospital's schedule windows
/// 4. date schedules and recurring schedules for the weekday
///
/// Windows are never merged; two shifts on the same day stay two windows.
pub struct ScheduleResolver;

impl ScheduleResolver {
    pub fn resolve(
        doctor: &Doctor,
        calendar: &DoctorCalendar,
        date: NaiveDate,
        hospital_id: Option<Uuid>,
    ) -> Resolution {
        if let Some(leave) = calendar.leave_on(date) {
            debug!("Doctor {} on leave {} for {}", calendar.doctor_id, leave.id, date);
            return Resolution::OnLeave { reason: leave.reason.clone() };
        }

        let multi_site = doctor.is_multi_site();
        let in_scope = |scope: Option<Uuid>| match (hospital_id, scope) {
            (Some(filter), Some(h)) => filter == h,
            _ => true,
        };
        let settles_day = |o: &AvailabilityOverride| {
            !multi_site || o.hospital_id.is_none() || o.hospital_id == hospital_id
        };

        let (settling, scoped_overrides): (Vec<&AvailabilityOverride>, Vec<_>) = calendar
            .overrides_on(date)
            .filter(|o| !multi_site || in_scope(o.hospital_id))
            .partition(|o| settles_day(*o));

        if let Some(closed) = settling.iter().find(|o| !o.is_available) {
            debug!("Override closes {} for doctor {}", date, calendar.doctor_id);
            return Resolution::NoSchedule { reason: closed.reason.clone() };
        }
        if !settling.is_empty() {
            let windows = settling
                .iter()
                .map(|o| EffectiveWindow {
                    start: o.start_time,
                    end: o.end_time,
                    hospital_id: o.hospital_id,
                    source: WindowSource::Override,
                })
                .collect();
            return Resolution::Open(sorted(windows));
        }

        // only reached for a multi-site doctor without a hospital filter
        let mut scoped: HashMap<Uuid, Vec<&AvailabilityOverride>> = HashMap::new();
        for o in scoped_overrides {
            if let Some(h) = o.hospital_id {
                scoped.entry(h).or_default().push(o);
            }
        }

        let dated = calendar
            .dated_on(date)
            .map(|s| (s.start_time, s.end_time, s.hospital_id, WindowSource::Dated));
        let recurring = calendar
            .recurring_on(date.weekday())
            .map(|s| (s.start_time, s.end_time, s.hospital_id, WindowSource::Recurring));

        let mut windows: Vec<EffectiveWindow> = dated
            .chain(recurring)
            .filter(|(_, _, scope, _)| in_scope(*scope))
            .filter(|(_, _, scope, _)| scope.map_or(true, |h| !scoped.contains_key(&h)))
            .map(|(start, end, hospital_id, source)| EffectiveWindow {
                start,
                end,
                hospital_id,
                source,
            })
            .collect();

        let mut closed_reason = None;
        for (hospital, entries) in &scoped {
            for o in entries {
                if o.is_available {
                    windows.push(EffectiveWindow {
                        start: o.start_time,
                        end: o.end_time,
                        hospital_id: Some(*hospital),
                        source: WindowSource::Override,
                    });
                } else if closed_reason.is_none() {
                    closed_reason = o.reason.clone();
                }
            }
        }

        if windows.is_empty() {
            return Resolution::NoSchedule { reason: closed_reason };
        }

        Resolution::Open(sorted(windows))
    }
}

fn sorted(mut windows: Vec<EffectiveWindow>) -> Vec<EffectiveWindow> {
    windows.sort_by_key(|w| (w.start, w.hospital_id, w.end));
    windows
}
