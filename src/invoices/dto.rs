use rust_decimal::Decimal;
use serde::Deserialize;
use time::Date;
use uuid::Uuid;

use super::repo::{InvoiceChanges, NewInvoice, MAX_STATUS, UNPAID};
use crate::{
    error::ApiError,
    validation::{check_non_negative, check_status, required, required_str},
};

#[derive(Debug, Default, Deserialize)]
pub struct InvoiceRequest {
    pub project_id: Option<Uuid>,
    pub offtaker_id: Option<Uuid>,
    pub invoice_number: Option<String>,
    pub period_start: Option<Date>,
    pub period_end: Option<Date>,
    pub units_kwh: Option<Decimal>,
    pub amount: Option<Decimal>,
    pub due_date: Option<Date>,
    pub status: Option<i16>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: Option<i16>,
}

fn check_period(start: Option<Date>, end: Option<Date>) -> Result<(), ApiError> {
    match (start, end) {
        (Some(s), Some(e)) if e < s => Err(ApiError::bad_request(
            "period_end must not be before period_start",
        )),
        _ => Ok(()),
    }
}

fn non_negative(value: Option<Decimal>, name: &str) -> Result<Option<Decimal>, ApiError> {
    value.map(|v| check_non_negative(v, name)).transpose()
}

impl InvoiceRequest {
    pub fn into_new(self) -> Result<NewInvoice, ApiError> {
        let project_id = required(self.project_id, "project_id")?;
        let offtaker_id = required(self.offtaker_id, "offtaker_id")?;
        let invoice_number = required_str(self.invoice_number, "invoice_number")?;
        let amount = check_non_negative(required(self.amount, "amount")?, "amount")?;
        check_period(self.period_start, self.period_end)?;

        Ok(NewInvoice {
            project_id,
            offtaker_id,
            invoice_number,
            period_start: self.period_start,
            period_end: self.period_end,
            units_kwh: non_negative(self.units_kwh, "units_kwh")?,
            amount,
            due_date: self.due_date,
            status: check_status(self.status.unwrap_or(UNPAID), MAX_STATUS)?,
        })
    }

    pub fn into_changes(self) -> Result<InvoiceChanges, ApiError> {
        check_period(self.period_start, self.period_end)?;
        Ok(InvoiceChanges {
            project_id: self.project_id,
            offtaker_id: self.offtaker_id,
            invoice_number: self
                .invoice_number
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            period_start: self.period_start,
            period_end: self.period_end,
            units_kwh: non_negative(self.units_kwh, "units_kwh")?,
            amount: non_negative(self.amount, "amount")?,
            due_date: self.due_date,
            status: self
                .status
                .map(|s| check_status(s, MAX_STATUS))
                .transpose()?,
        })
    }
}
