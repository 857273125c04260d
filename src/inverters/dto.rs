use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use super::repo::{InverterChanges, NewInverter};
use crate::{
    error::ApiError,
    validation::{check_non_negative, check_status, required, required_str},
};

#[derive(Debug, Default, Deserialize)]
pub struct InverterRequest {
    pub project_id: Option<Uuid>,
    pub inverter_type_id: Option<Uuid>,
    pub serial_number: Option<String>,
    pub model: Option<String>,
    pub capacity_kw: Option<Decimal>,
    pub status: Option<i16>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: Option<i16>,
}

impl InverterRequest {
    pub fn into_new(self) -> Result<NewInverter, ApiError> {
        let project_id = required(self.project_id, "project_id")?;
        let inverter_type_id = required(self.inverter_type_id, "inverter_type_id")?;
        let serial_number = required_str(self.serial_number, "serial_number")?;
        let capacity_kw = self
            .capacity_kw
            .map(|c| check_non_negative(c, "capacity_kw"))
            .transpose()?;
        Ok(NewInverter {
            project_id,
            inverter_type_id,
            serial_number,
            model: self.model,
            capacity_kw,
            status: check_status(self.status.unwrap_or(1), 1)?,
        })
    }

    pub fn into_changes(self) -> Result<InverterChanges, ApiError> {
        let capacity_kw = self
            .capacity_kw
            .map(|c| check_non_negative(c, "capacity_kw"))
            .transpose()?;
        Ok(InverterChanges {
            project_id: self.project_id,
            inverter_type_id: self.inverter_type_id,
            serial_number: self
                .serial_number
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            model: self.model,
            capacity_kw,
            status: self.status.map(|s| check_status(s, 1)).transpose()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_number_is_required() {
        let req = InverterRequest {
            project_id: Some(Uuid::new_v4()),
            inverter_type_id: Some(Uuid::new_v4()),
            serial_number: Some("   ".into()),
            ..Default::default()
        };
        let err = req.into_new().unwrap_err();
        assert_eq!(err.to_string(), "serial_number is required");
    }

    #[test]
    fn negative_capacity_is_rejected() {
        let req = InverterRequest {
            capacity_kw: Some(Decimal::new(-5, 0)),
            ..Default::default()
        };
        assert!(req.into_changes().is_err());
    }

    #[test]
    fn serial_is_trimmed() {
        let req = InverterRequest {
            project_id: Some(Uuid::new_v4()),
            inverter_type_id: Some(Uuid::new_v4()),
            serial_number: Some(" SN-001 ".into()),
            ..Default::default()
        };
        let new = req.into_new().expect("valid");
        assert_eq!(new.serial_number, "SN-001");
        assert_eq!(new.status, 1);
    }
}
