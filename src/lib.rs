pub mod admin;
pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod inverter_types;
pub mod inverters;
pub mod invoices;
pub mod locations;
pub mod migrate;
pub mod pagination;
pub mod payments;
pub mod projects;
pub mod response;
pub mod roles;
pub mod seed;
pub mod settings;
pub mod state;
pub mod users;
pub mod validation;
