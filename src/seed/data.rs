use crate::auth::extractors::{ADMIN, INVESTOR, OFFTAKER, SUPER_ADMIN};
use crate::settings::{
    handlers::SITE_NAME,
    mail::{SMTP_FROM, SMTP_HOST, SMTP_PASSWORD, SMTP_PORT, SMTP_SECURITY, SMTP_USER},
};

pub const ROLES: &[(&str, &str)] = &[
    (SUPER_ADMIN, "Full access, including migrations and seeding"),
    (ADMIN, "Manages users, projects and billing"),
    (OFFTAKER, "Consumes the output of a solar project"),
    (INVESTOR, "Funds solar projects and receives a profit share"),
];

pub struct DemoUser {
    pub role: &'static str,
    pub email: &'static str,
    pub first_name: &'static str,
    pub last_name: &'static str,
}

pub const DEMO_PASSWORD: &str = "Demo@12345";

pub const DEMO_USERS: &[DemoUser] = &[
    DemoUser {
        role: ADMIN,
        email: "admin.demo@sunshare.local",
        first_name: "Asha",
        last_name: "Admin",
    },
    DemoUser {
        role: OFFTAKER,
        email: "offtaker.demo@sunshare.local",
        first_name: "Omar",
        last_name: "Offtaker",
    },
    DemoUser {
        role: INVESTOR,
        email: "investor.demo@sunshare.local",
        first_name: "Ines",
        last_name: "Investor",
    },
];

pub struct CountrySeed {
    pub name: &'static str,
    pub code: &'static str,
    pub states: &'static [(&'static str, &'static [&'static str])],
}

pub const LOCATIONS: &[CountrySeed] = &[
    CountrySeed {
        name: "India",
        code: "IN",
        states: &[
            ("Maharashtra", &["Mumbai", "Pune", "Nagpur"]),
            ("Karnataka", &["Bengaluru", "Mysuru"]),
            ("Gujarat", &["Ahmedabad", "Surat"]),
            ("Rajasthan", &["Jaipur", "Jodhpur"]),
        ],
    },
    CountrySeed {
        name: "United States",
        code: "US",
        states: &[
            ("California", &["Los Angeles", "San Diego"]),
            ("Texas", &["Austin", "Houston"]),
        ],
    },
];

pub const DEFAULT_SETTINGS: &[(&str, &str)] = &[
    (SITE_NAME, "Sunshare"),
    (SMTP_HOST, ""),
    (SMTP_PORT, "587"),
    (SMTP_USER, ""),
    (SMTP_PASSWORD, ""),
    (SMTP_SECURITY, "tls"),
    (SMTP_FROM, ""),
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn demo_users_reference_seeded_roles() {
        let roles: HashSet<_> = ROLES.iter().map(|(name, _)| *name).collect();
        assert_eq!(roles.len(), ROLES.len());
        for user in DEMO_USERS {
            assert!(roles.contains(user.role), "{} has unknown role", user.email);
            assert_ne!(user.role, SUPER_ADMIN);
        }
    }

    #[test]
    fn natural_keys_are_unique() {
        let codes: HashSet<_> = LOCATIONS.iter().map(|c| c.code).collect();
        assert_eq!(codes.len(), LOCATIONS.len());
        for country in LOCATIONS {
            let states: HashSet<_> = country.states.iter().map(|(s, _)| *s).collect();
            assert_eq!(states.len(), country.states.len());
        }
        let keys: HashSet<_> = DEFAULT_SETTINGS.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys.len(), DEFAULT_SETTINGS.len());
    }

    #[test]
    fn demo_password_passes_policy() {
        assert!(crate::validation::check_password(DEMO_PASSWORD).is_ok());
    }
}
