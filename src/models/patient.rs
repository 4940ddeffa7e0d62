use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::enums::Sex;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub patient_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub sex: Sex,
}
