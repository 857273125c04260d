use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use super::repo::{NewProject, Project, ProjectChanges};
use crate::{
    error::ApiError,
    validation::{check_non_negative, check_status, non_blank, required, required_str},
};

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: Option<String>,
    pub project_type: Option<String>,
    pub offtaker_id: Option<Uuid>,
    pub address: Option<String>,
    pub city_id: Option<Uuid>,
    pub state_id: Option<Uuid>,
    pub country_id: Option<Uuid>,
    pub capacity_kw: Option<Decimal>,
    pub investor_profit_share: Option<Decimal>,
    pub sunshare_profit_share: Option<Decimal>,
    pub offtaker_profit_share: Option<Decimal>,
    pub status: Option<i16>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    pub project_type: Option<String>,
    pub offtaker_id: Option<Uuid>,
    pub address: Option<String>,
    pub city_id: Option<Uuid>,
    pub state_id: Option<Uuid>,
    pub country_id: Option<Uuid>,
    pub capacity_kw: Option<Decimal>,
    pub investor_profit_share: Option<Decimal>,
    pub sunshare_profit_share: Option<Decimal>,
    pub offtaker_profit_share: Option<Decimal>,
    pub status: Option<i16>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: Option<i16>,
}

/// Shares are percentages; once all three are known they must add up to 100.
pub fn check_profit_shares(
    investor: Option<Decimal>,
    sunshare: Option<Decimal>,
    offtaker: Option<Decimal>,
) -> Result<(), ApiError> {
    for (value, name) in [
        (investor, "investor_profit_share"),
        (sunshare, "sunshare_profit_share"),
        (offtaker, "offtaker_profit_share"),
    ] {
        if let Some(v) = value {
            check_non_negative(v, name)?;
            if v > Decimal::ONE_HUNDRED {
                return Err(ApiError::bad_request(format!("{name} must not exceed 100")));
            }
        }
    }
    if let (Some(i), Some(s), Some(o)) = (investor, sunshare, offtaker) {
        if i + s + o != Decimal::ONE_HUNDRED {
            return Err(ApiError::bad_request("Profit shares must add up to 100"));
        }
    }
    Ok(())
}

impl CreateProjectRequest {
    pub fn validate(self) -> Result<NewProject, ApiError> {
        let name = required_str(self.name, "name")?;
        let project_type = required_str(self.project_type, "project_type")?;
        let offtaker_id = required(self.offtaker_id, "offtaker_id")?;
        let status = check_status(self.status.unwrap_or(1), 1)?;
        if let Some(c) = self.capacity_kw {
            check_non_negative(c, "capacity_kw")?;
        }
        check_profit_shares(
            self.investor_profit_share,
            self.sunshare_profit_share,
            self.offtaker_profit_share,
        )?;

        Ok(NewProject {
            name,
            project_type,
            offtaker_id,
            address: self.address,
            city_id: self.city_id,
            state_id: self.state_id,
            country_id: self.country_id,
            capacity_kw: self.capacity_kw,
            investor_profit_share: self.investor_profit_share,
            sunshare_profit_share: self.sunshare_profit_share,
            offtaker_profit_share: self.offtaker_profit_share,
            status,
        })
    }
}

impl UpdateProjectRequest {
    /// Validates against the stored row so share totals are checked on the merged values.
    pub fn validate(self, current: &Project) -> Result<ProjectChanges, ApiError> {
        let status = self.status.map(|s| check_status(s, 1)).transpose()?;
        if let Some(c) = self.capacity_kw {
            check_non_negative(c, "capacity_kw")?;
        }
        check_profit_shares(
            self.investor_profit_share.or(current.investor_profit_share),
            self.sunshare_profit_share.or(current.sunshare_profit_share),
            self.offtaker_profit_share.or(current.offtaker_profit_share),
        )?;

        Ok(ProjectChanges {
            name: non_blank(self.name),
            project_type: non_blank(self.project_type),
            offtaker_id: self.offtaker_id,
            address: self.address,
            city_id: self.city_id,
            state_id: self.state_id,
            country_id: self.country_id,
            capacity_kw: self.capacity_kw,
            investor_profit_share: self.investor_profit_share,
            sunshare_profit_share: self.sunshare_profit_share,
            offtaker_profit_share: self.offtaker_profit_share,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn request() -> CreateProjectRequest {
        CreateProjectRequest {
            name: Some("Rooftop A".into()),
            project_type: Some("rooftop".into()),
            offtaker_id: Some(Uuid::new_v4()),
            address: None,
            city_id: None,
            state_id: None,
            country_id: None,
            capacity_kw: Some(Decimal::new(1205, 1)),
            investor_profit_share: Some(Decimal::new(60, 0)),
            sunshare_profit_share: Some(Decimal::new(25, 0)),
            offtaker_profit_share: Some(Decimal::new(15, 0)),
            status: None,
        }
    }

    fn stored() -> Project {
        Project {
            id: Uuid::new_v4(),
            name: "Rooftop A".into(),
            project_type: "rooftop".into(),
            offtaker_id: Uuid::new_v4(),
            offtaker_name: None,
            address: None,
            city_id: None,
            state_id: None,
            country_id: None,
            capacity_kw: None,
            investor_profit_share: Some(Decimal::new(60, 0)),
            sunshare_profit_share: Some(Decimal::new(25, 0)),
            offtaker_profit_share: Some(Decimal::new(15, 0)),
            status: 1,
            is_deleted: false,
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn missing_offtaker_is_a_bad_request() {
        let mut req = request();
        req.offtaker_id = None;
        let err = req.validate().unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
        assert_eq!(err.to_string(), "offtaker_id is required");
    }

    #[test]
    fn complete_request_defaults_to_active() {
        let new = request().validate().expect("valid");
        assert_eq!(new.status, 1);
        assert_eq!(new.name, "Rooftop A");
    }

    #[test]
    fn shares_must_total_one_hundred() {
        let mut req = request();
        req.offtaker_profit_share = Some(Decimal::new(20, 0));
        assert!(req.validate().is_err());
    }

    #[test]
    fn partial_shares_are_accepted() {
        assert!(check_profit_shares(Some(Decimal::new(70, 0)), None, None).is_ok());
        assert!(check_profit_shares(Some(Decimal::new(170, 0)), None, None).is_err());
    }

    #[test]
    fn update_checks_merged_shares() {
        let changes = UpdateProjectRequest {
            investor_profit_share: Some(Decimal::new(50, 0)),
            ..Default::default()
        };
        assert!(changes.validate(&stored()).is_err());

        let changes = UpdateProjectRequest {
            investor_profit_share: Some(Decimal::new(50, 0)),
            sunshare_profit_share: Some(Decimal::new(35, 0)),
            status: Some(0),
            ..Default::default()
        };
        let changes = changes.validate(&stored()).expect("valid");
        assert_eq!(changes.status, Some(0));
    }

    #[test]
    fn update_rejects_unknown_status() {
        let changes = UpdateProjectRequest {
            status: Some(4),
            ..Default::default()
        };
        assert!(changes.validate(&stored()).is_err());
    }
}
