use std::sync::Arc;

use shared_config::AppConfig;

use crate::services::schedule::ScheduleService;

#[derive(Clone)]
pub struct DoctorCellState {
    pub config: Arc<AppConfig>,
    pub schedules: Arc<ScheduleService>,
}

impl DoctorCellState {
    pub fn new(config: Arc<AppConfig>, schedules: Arc<ScheduleService>) -> Self {
        Self { config, schedules }
    }
}
