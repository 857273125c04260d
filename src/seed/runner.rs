use anyhow::Context;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use super::data::{DEFAULT_SETTINGS, DEMO_PASSWORD, DEMO_USERS, LOCATIONS, ROLES};
use crate::{
    auth::{extractors::SUPER_ADMIN, password::hash_password_blocking},
    config::SeedConfig,
    locations, roles, settings,
    users::{self, repo::NewUser},
    validation::{check_email, check_password, normalize_email},
};

#[derive(Debug, Clone, Copy, Default)]
pub struct SeedOptions {
    /// Also create one demo user per non-admin role.
    pub demo: bool,
    /// Replace the password hash of users that already exist.
    pub force_password: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct Counts {
    pub inserted: u32,
    pub existing: u32,
}

impl Counts {
    fn record(&mut self, inserted: bool) {
        if inserted {
            self.inserted += 1;
        } else {
            self.existing += 1;
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SeedReport {
    pub roles: Counts,
    pub users: Counts,
    pub passwords_reset: u32,
    pub countries: Counts,
    pub states: Counts,
    pub cities: Counts,
    pub settings: Counts,
}

struct UserSeed<'a> {
    role_id: Uuid,
    email: String,
    first_name: &'a str,
    last_name: &'a str,
    password: &'a str,
}

/// Idempotent: a second run inserts nothing and only reports existing rows.
pub async fn run(db: &PgPool, seed: &SeedConfig, opts: SeedOptions) -> anyhow::Result<SeedReport> {
    let mut report = SeedReport::default();

    let mut role_ids = std::collections::HashMap::new();
    for (name, description) in ROLES {
        let (role, inserted) = roles::repo::upsert_by_name(db, name, Some(*description))
            .await
            .with_context(|| format!("seed role {name}"))?;
        report.roles.record(inserted);
        role_ids.insert(*name, role.id);
    }

    let admin_email = normalize_email(&seed.admin_email);
    check_email(&admin_email).map_err(|e| anyhow::anyhow!("SEED_ADMIN_EMAIL: {e}"))?;
    check_password(&seed.admin_password).map_err(|e| anyhow::anyhow!("SEED_ADMIN_PASSWORD: {e}"))?;
    let super_admin = role_ids
        .get(SUPER_ADMIN)
        .copied()
        .context("super_admin role missing after seeding roles")?;
    seed_user(
        db,
        UserSeed {
            role_id: super_admin,
            email: admin_email,
            first_name: "Super",
            last_name: "Admin",
            password: &seed.admin_password,
        },
        opts.force_password,
        &mut report,
    )
    .await?;

    if opts.demo {
        for demo in DEMO_USERS {
            let role_id = role_ids
                .get(demo.role)
                .copied()
                .with_context(|| format!("role {} missing", demo.role))?;
            seed_user(
                db,
                UserSeed {
                    role_id,
                    email: demo.email.to_string(),
                    first_name: demo.first_name,
                    last_name: demo.last_name,
                    password: DEMO_PASSWORD,
                },
                opts.force_password,
                &mut report,
            )
            .await?;
        }
    }

    for country in LOCATIONS {
        let (country_id, inserted) = locations::repo::upsert_country(db, country.name, country.code)
            .await
            .with_context(|| format!("seed country {}", country.code))?;
        report.countries.record(inserted);
        for (state, cities) in country.states {
            let (state_id, inserted) = locations::repo::upsert_state(db, country_id, state)
                .await
                .with_context(|| format!("seed state {state}"))?;
            report.states.record(inserted);
            for city in cities.iter() {
                let (_, inserted) = locations::repo::upsert_city(db, state_id, city)
                    .await
                    .with_context(|| format!("seed city {city}"))?;
                report.cities.record(inserted);
            }
        }
    }

    for (key, value) in DEFAULT_SETTINGS {
        let inserted = settings::repo::insert_default(db, key, value)
            .await
            .with_context(|| format!("seed setting {key}"))?;
        report.settings.record(inserted);
    }

    info!(?report, "seed complete");
    Ok(report)
}

async fn seed_user(
    db: &PgPool,
    user: UserSeed<'_>,
    force_password: bool,
    report: &mut SeedReport,
) -> anyhow::Result<()> {
    if let Some(existing) = users::repo::find_by_email(db, &user.email).await? {
        report.users.record(false);
        if force_password {
            let hash = hash_password_blocking(user.password.to_string()).await?;
            users::repo::set_password(db, existing.id, &hash).await?;
            report.passwords_reset += 1;
            warn!(email = %user.email, "password replaced by seed");
        }
        return Ok(());
    }

    let password_hash = hash_password_blocking(user.password.to_string()).await?;
    let inserted = users::repo::insert_if_missing(
        db,
        &NewUser {
            role_id: user.role_id,
            first_name: user.first_name.to_string(),
            last_name: Some(user.last_name.to_string()),
            email: user.email.clone(),
            phone: None,
            password_hash,
            status: 1,
            address_line1: None,
            address_line2: None,
            city_id: None,
            state_id: None,
            country_id: None,
            zip_code: None,
        },
    )
    .await
    .with_context(|| format!("seed user {}", user.email))?;

    if inserted.is_some() {
        info!(email = %user.email, "user seeded");
    }
    report.users.record(inserted.is_some());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_split_inserted_and_existing() {
        let mut counts = Counts::default();
        counts.record(true);
        counts.record(false);
        counts.record(false);
        assert_eq!(
            counts,
            Counts {
                inserted: 1,
                existing: 2
            }
        );
    }

    #[test]
    fn report_serializes_per_category() {
        let report = SeedReport {
            passwords_reset: 1,
            ..Default::default()
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["roles"]["inserted"], 0);
        assert_eq!(json["passwords_reset"], 1);
    }
}
